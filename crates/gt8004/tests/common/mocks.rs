// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! In-memory batch sender for exercising the transport without a network

use async_trait::async_trait;
use gt8004::errors::DeliveryError;
use gt8004::{BatchSender, DeliveryOutcome, Entry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Records every batch it receives and tracks how many sends overlap.
#[derive(Debug, Default)]
pub struct RecordingSender {
    batches: Mutex<Vec<Vec<String>>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    delay: Duration,
}

#[allow(dead_code)]
impl RecordingSender {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Request ids of every batch, in delivery order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.batches().into_iter().flatten().collect()
    }

    pub fn max_concurrent_sends(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchSender for RecordingSender {
    async fn send(&self, batch: Vec<Entry>) -> DeliveryOutcome {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.batches
            .lock()
            .unwrap()
            .push(batch.iter().map(|e| e.request_id().to_string()).collect());
        self.active.fetch_sub(1, Ordering::SeqCst);
        DeliveryOutcome::Delivered { attempts: 1 }
    }

    async fn probe(&self) -> Result<(), DeliveryError> {
        Ok(())
    }
}
