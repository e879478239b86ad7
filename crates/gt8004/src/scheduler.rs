// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Background flush loop.
//!
//! A single task owns all periodic and triggered flushing:
//!
//! ```text
//!   interval tick ──┐
//!   threshold  ─────┼──> Flusher::flush ──> BatchSender
//!   FlushNow cmd ───┘
//!   cancel ──> break, then one final flush
//! ```
//!
//! Threshold triggers go through a [`Notify`], which keeps at most one
//! pending permit. Any number of triggers raised while a flush is running
//! collapse into a single follow-up flush.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::clock::FAR_FUTURE;
use crate::delivery::DeliveryOutcome;
use crate::errors::TransportError;
use crate::flusher::Flusher;

#[derive(Debug)]
pub enum SchedulerCommand {
    FlushNow(oneshot::Sender<DeliveryOutcome>),
}

#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Asks the scheduler for an immediate flush and waits for its outcome.
    ///
    /// # Errors
    /// Returns [`TransportError::Closed`] if the scheduler has already stopped.
    pub async fn flush(&self) -> Result<DeliveryOutcome, TransportError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(SchedulerCommand::FlushNow(response_tx))
            .map_err(|_| TransportError::Closed)?;

        response_rx.await.map_err(|_| TransportError::Closed)
    }
}

pub struct FlushScheduler {
    flusher: Arc<Flusher>,
    interval: Duration,
    trigger: Arc<Notify>,
    cancel: CancellationToken,
    rx: mpsc::UnboundedReceiver<SchedulerCommand>,
}

impl FlushScheduler {
    pub fn new(
        flusher: Arc<Flusher>,
        interval: Duration,
        trigger: Arc<Notify>,
        cancel: CancellationToken,
    ) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            flusher,
            interval,
            trigger,
            cancel,
            rx,
        };
        (scheduler, SchedulerHandle { tx })
    }

    pub async fn run(mut self) {
        debug!(
            interval_ms = self.interval.as_millis() as u64,
            "Flush scheduler started"
        );

        // `Interval::reset` adds the period to the current instant.
        let mut interval = tokio::time::interval(self.interval.min(FAR_FUTURE));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the first periodic
        // flush happens one interval after start.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!("Flush scheduler cancelled");
                    break;
                }
                () = self.trigger.notified() => {
                    debug!("Batch size reached, flushing early");
                    self.flusher.flush().await;
                    interval.reset();
                }
                Some(command) = self.rx.recv() => match command {
                    SchedulerCommand::FlushNow(response_tx) => {
                        let outcome = self.flusher.flush().await;
                        if response_tx.send(outcome).is_err() {
                            error!("Failed to send flush response - receiver dropped");
                        }
                    }
                },
                _ = interval.tick() => {
                    self.flusher.flush().await;
                }
            }
        }

        // No more timer wakeups from here on. One last drain for whatever is left.
        let outcome = self.flusher.flush().await;
        debug!(?outcome, "Final flush complete");

        // Flush requests that raced with cancellation are answered with the final flush.
        self.rx.close();
        while let Ok(SchedulerCommand::FlushNow(response_tx)) = self.rx.try_recv() {
            let _ = response_tx.send(outcome);
        }

        debug!("Flush scheduler stopped");
    }
}
