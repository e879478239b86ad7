// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Public entry point of the SDK.
//!
//! A [`Transport`] is created once per agent identity and shared (usually
//! behind an `Arc`) by every request handler that records telemetry.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), gt8004::errors::TransportError> {
//! use gt8004::{Config, Entry, Protocol, Transport};
//! use std::time::Duration;
//!
//! let transport = Transport::new(Config::new("agent-1", "gt8004_sk_..."))?;
//! transport.verify_connection().await?;
//! transport.start()?;
//!
//! transport.record(
//!     Entry::builder("POST", "/mcp")
//!         .tool_name("search")
//!         .protocol(Protocol::Mcp)
//!         .latency(Duration::from_millis(42))
//!         .build(),
//! )?;
//!
//! transport.close().await;
//! # Ok(())
//! # }
//! ```

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::breaker::CircuitState;
use crate::buffer::Buffer;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::delivery::{BatchSender, DeliveryClient, DeliveryOutcome};
use crate::entry::{Entry, Protocol};
use crate::errors::TransportError;
use crate::flusher::{Flusher, FlusherConfig};
use crate::scheduler::{FlushScheduler, SchedulerHandle};
use crate::stats::{DeliveryStats, DeliveryStatsSnapshot};

/// Lifecycle of the background scheduler.
#[derive(Debug)]
enum Lifecycle {
    Idle,
    Running {
        handle: SchedulerHandle,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    },
    Closed,
}

#[derive(Debug)]
pub struct Transport {
    protocol: Option<Protocol>,
    flush_interval: std::time::Duration,
    buffer: Arc<Buffer>,
    sender: Arc<dyn BatchSender>,
    flusher: Arc<Flusher>,
    stats: Arc<DeliveryStats>,
    trigger: Arc<Notify>,
    lifecycle: Mutex<Lifecycle>,
}

impl Transport {
    /// Creates a transport that posts to the configured GT8004 collector.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: Config) -> Result<Self, TransportError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`Transport::new`], with the circuit breaker driven by `clock`.
    ///
    /// # Errors
    /// See [`Transport::new`].
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self, TransportError> {
        config.validate()?;
        let client = DeliveryClient::new(&config, clock)?;
        Self::with_sender(config, Arc::new(client))
    }

    /// Creates a transport that hands batches to a custom sender.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_sender(
        config: Config,
        sender: Arc<dyn BatchSender>,
    ) -> Result<Self, TransportError> {
        config.validate()?;

        let buffer = Arc::new(Buffer::new(config.batch_size));
        let stats = Arc::new(DeliveryStats::default());
        let flusher = Arc::new(Flusher::new(FlusherConfig {
            buffer: Arc::clone(&buffer),
            sender: Arc::clone(&sender),
            stats: Arc::clone(&stats),
        }));

        debug!(
            agent_id = %config.agent_id,
            url = %config.ingest_url(),
            batch_size = config.batch_size,
            "Created transport"
        );

        Ok(Self {
            protocol: config.protocol,
            flush_interval: config.flush_interval,
            buffer,
            sender,
            flusher,
            stats,
            trigger: Arc::new(Notify::new()),
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }

    /// Buffers an entry for delivery. Never performs I/O.
    ///
    /// Reaching the batch size wakes the scheduler for an early flush. When
    /// the scheduler is not running yet, the wakeup is kept until it starts.
    ///
    /// # Errors
    /// Returns [`TransportError::Closed`] after [`Transport::close`].
    pub fn record(&self, entry: Entry) -> Result<(), TransportError> {
        let entry = entry.with_default_protocol(self.protocol);
        if self.buffer.append(entry)? {
            self.trigger.notify_one();
        }
        Ok(())
    }

    /// Starts the background flush loop on the current Tokio runtime.
    /// Calling it again while running is a no-op.
    ///
    /// # Errors
    /// Returns [`TransportError::NoRuntime`] outside a Tokio runtime and
    /// [`TransportError::Closed`] after [`Transport::close`].
    pub fn start(&self) -> Result<(), TransportError> {
        let mut lifecycle = self.lock();
        match *lifecycle {
            Lifecycle::Running { .. } => return Ok(()),
            Lifecycle::Closed => return Err(TransportError::Closed),
            Lifecycle::Idle => {}
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let cancel = CancellationToken::new();
        let (scheduler, handle) = FlushScheduler::new(
            Arc::clone(&self.flusher),
            self.flush_interval,
            Arc::clone(&self.trigger),
            cancel.clone(),
        );
        let task = runtime.spawn(scheduler.run());

        *lifecycle = Lifecycle::Running {
            handle,
            cancel,
            task,
        };
        info!(
            flush_interval_ms = self.flush_interval.as_millis() as u64,
            "Transport started"
        );
        Ok(())
    }

    /// Flushes everything buffered now and waits for the delivery outcome.
    ///
    /// # Errors
    /// Returns [`TransportError::Closed`] after [`Transport::close`].
    pub async fn flush(&self) -> Result<DeliveryOutcome, TransportError> {
        let handle = match &*self.lock() {
            Lifecycle::Running { handle, .. } => Some(handle.clone()),
            Lifecycle::Idle => None,
            Lifecycle::Closed => return Err(TransportError::Closed),
        };

        match handle {
            Some(handle) => handle.flush().await,
            None => Ok(self.flusher.flush().await),
        }
    }

    /// Sends a single ping entry straight to the collector.
    ///
    /// Bypasses the buffer and the circuit breaker; meant to be called once
    /// at startup to catch a wrong URL or API key early.
    ///
    /// # Errors
    /// Returns [`TransportError::Probe`] if the collector is unreachable or
    /// rejects the request.
    pub async fn verify_connection(&self) -> Result<(), TransportError> {
        match self.sender.probe().await {
            Ok(()) => {
                info!("Connection to GT8004 ingest verified");
                Ok(())
            }
            Err(e) => {
                warn!("Connection check to GT8004 ingest failed: {e}");
                Err(TransportError::Probe(e))
            }
        }
    }

    /// Stops the scheduler, delivers whatever is still buffered and waits for
    /// it to finish. Later calls return immediately.
    pub async fn close(&self) {
        let previous = mem::replace(&mut *self.lock(), Lifecycle::Closed);
        if matches!(previous, Lifecycle::Closed) {
            return;
        }
        self.buffer.seal();

        match previous {
            Lifecycle::Running { cancel, task, .. } => {
                cancel.cancel();
                if let Err(e) = task.await {
                    error!("Flush scheduler task failed, flushing remaining entries inline: {e}");
                    let outcome = self.flusher.flush().await;
                    debug!(?outcome, "Final flush complete");
                }
            }
            Lifecycle::Idle | Lifecycle::Closed => {
                let outcome = self.flusher.flush().await;
                debug!(?outcome, "Final flush complete");
            }
        }

        let stats = self.stats.snapshot();
        info!(
            delivered = stats.entries_delivered,
            dropped = stats.entries_dropped,
            "Transport closed"
        );
    }

    #[must_use]
    pub fn stats(&self) -> DeliveryStatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.sender.circuit_state()
    }

    /// Entries buffered and not yet handed to a batch.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        let lifecycle = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(lifecycle, Lifecycle::Closed) {
            return;
        }
        if let Lifecycle::Running { cancel, .. } = lifecycle {
            cancel.cancel();
        }
        let pending = self.buffer.len();
        if pending > 0 {
            warn!(
                pending,
                "Transport dropped without close(), buffered entries may be lost"
            );
        }
    }
}
