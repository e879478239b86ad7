// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Client-side telemetry transport for GT8004 agent analytics.
//!
//! Instrumentation points hand [`entry::Entry`] records to a [`transport::Transport`],
//! which buffers them in memory and ships them to the GT8004 ingest API from a single
//! background task. Delivery is best-effort: transient failures are retried with
//! jittered exponential backoff, permanent failures are dropped, and a circuit breaker
//! stops the SDK from hammering a collector that is down.
//!
//! ```text
//!   record() ──> Buffer ──(threshold | interval)──> FlushScheduler
//!                                                        │
//!                                                        v
//!                                CircuitBreaker <── DeliveryClient ──> ingest API
//! ```
//!
//! Nothing on the delivery path is ever surfaced to the caller of `record()`.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod backoff;
pub mod breaker;
pub mod buffer;
pub mod classify;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod entry;
pub mod errors;
pub mod flusher;
pub mod http;
pub mod logger;
pub mod scheduler;
pub mod stats;
pub mod transport;

pub use config::{Config, Network};
pub use delivery::{BatchSender, DeliveryOutcome, DropReason};
pub use entry::{Entry, EntryBuilder, Payment, Protocol};
pub use errors::TransportError;
pub use transport::Transport;

/// SDK version reported to the collector with every batch.
pub const SDK_VERSION: &str = concat!("rust-", env!("CARGO_PKG_VERSION"));

/// Value of the `User-Agent` header on every outbound request.
pub(crate) const USER_AGENT: &str = concat!("gt8004-sdk-rust/", env!("CARGO_PKG_VERSION"));
