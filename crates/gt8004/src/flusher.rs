// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::buffer::Buffer;
use crate::delivery::{BatchSender, DeliveryOutcome};
use crate::stats::DeliveryStats;

/// Drains the buffer and hands the batch to the sender, one flush at a time.
///
/// Both the scheduler task and inline `flush()`/`close()` calls go through
/// [`Flusher::flush`], so at most one delivery is ever in flight and batches
/// reach the collector in the order they were drained.
#[derive(Debug)]
pub struct Flusher {
    buffer: Arc<Buffer>,
    sender: Arc<dyn BatchSender>,
    stats: Arc<DeliveryStats>,
    in_flight: Mutex<()>,
}

pub struct FlusherConfig {
    pub buffer: Arc<Buffer>,
    pub sender: Arc<dyn BatchSender>,
    pub stats: Arc<DeliveryStats>,
}

impl Flusher {
    pub fn new(config: FlusherConfig) -> Self {
        Flusher {
            buffer: config.buffer,
            sender: config.sender,
            stats: config.stats,
            in_flight: Mutex::new(()),
        }
    }

    /// Flush everything currently buffered
    pub async fn flush(&self) -> DeliveryOutcome {
        let _in_flight = self.in_flight.lock().await;

        // Drain under the in-flight guard so two flushes cannot reorder batches.
        let batch = self.buffer.drain();
        let entries = batch.len();
        if entries == 0 {
            return DeliveryOutcome::Empty;
        }

        debug!("Flushing {entries} entries");
        let outcome = self.sender.send(batch).await;
        self.stats.record(&outcome, entries);
        outcome
    }
}
