// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Delivery counters.
//!
//! Batch failures never reach `record()` callers; this is where they show up.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::delivery::{DeliveryOutcome, DropReason};

#[derive(Debug, Default)]
pub struct DeliveryStats {
    batches_delivered: AtomicU64,
    entries_delivered: AtomicU64,
    batches_dropped: AtomicU64,
    entries_dropped: AtomicU64,
    circuit_rejections: AtomicU64,
    retries: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStatsSnapshot {
    pub batches_delivered: u64,
    pub entries_delivered: u64,
    pub batches_dropped: u64,
    pub entries_dropped: u64,
    /// Batches dropped without a network call because the circuit was open.
    pub circuit_rejections: u64,
    /// Attempts beyond the first, across all batches.
    pub retries: u64,
}

impl DeliveryStats {
    /// Accounts for one finished batch of `entries` entries.
    pub fn record(&self, outcome: &DeliveryOutcome, entries: usize) {
        let entries = entries as u64;
        match outcome {
            DeliveryOutcome::Empty => return,
            DeliveryOutcome::Delivered { .. } => {
                self.batches_delivered.fetch_add(1, Ordering::Relaxed);
                self.entries_delivered.fetch_add(entries, Ordering::Relaxed);
            }
            DeliveryOutcome::Dropped(reason) => {
                if *reason == DropReason::CircuitOpen {
                    self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
                }
                self.batches_dropped.fetch_add(1, Ordering::Relaxed);
                self.entries_dropped.fetch_add(entries, Ordering::Relaxed);
            }
        }
        let retries = outcome.attempts().saturating_sub(1);
        self.retries.fetch_add(u64::from(retries), Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            entries_delivered: self.entries_delivered.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            entries_dropped: self.entries_dropped.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}
