// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Ships batches to the GT8004 ingest API.
//!
//! ```text
//!   send(batch)
//!     │
//!     ├── circuit open? ──yes──> Dropped(CircuitOpen), no network call
//!     │
//!     v
//!   POST ──2xx──> Delivered
//!     │
//!     ├── retryable (timeout, connect, 408, 429, 5xx) ──> sleep(backoff) ──> POST
//!     │                                                  until max_attempts
//!     └── permanent (other 4xx, 3xx) ──> Dropped(Rejected)
//! ```
//!
//! Every failure that ends a batch is reported to the circuit breaker.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::backoff::RetryPolicy;
use crate::breaker::{CircuitBreaker, CircuitState};
use crate::classify::{DefaultClassifier, RetryClassifier, Verdict};
use crate::clock::Clock;
use crate::config::Config;
use crate::entry::Entry;
use crate::errors::{ConfigError, DeliveryError, TransportError};
use crate::http::{build_client, error_chain, redact_headers};
use crate::SDK_VERSION;

/// Why a batch was given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The circuit was open; nothing was sent.
    CircuitOpen,
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32 },
    /// The collector refused the batch in a way retrying will not fix.
    Rejected { attempts: u32, status: Option<u16> },
}

/// Result of handing one batch to a [`BatchSender`]. Never an error: delivery
/// is best-effort and failures are only counted and logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Nothing was pending.
    Empty,
    Delivered { attempts: u32 },
    Dropped(DropReason),
}

impl DeliveryOutcome {
    /// Network attempts made for the batch.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Empty | DeliveryOutcome::Dropped(DropReason::CircuitOpen) => 0,
            DeliveryOutcome::Delivered { attempts }
            | DeliveryOutcome::Dropped(
                DropReason::Exhausted { attempts } | DropReason::Rejected { attempts, .. },
            ) => *attempts,
        }
    }

    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Destination for drained batches.
#[async_trait]
pub trait BatchSender: Debug + Send + Sync {
    /// Delivers one batch, retrying as the implementation sees fit.
    async fn send(&self, batch: Vec<Entry>) -> DeliveryOutcome;

    /// One-shot reachability check that bypasses batching and the breaker.
    async fn probe(&self) -> Result<(), DeliveryError>;

    fn circuit_state(&self) -> CircuitState {
        CircuitState::Closed
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogBatch<'a> {
    agent_id: &'a str,
    sdk_version: &'static str,
    entries: &'a [Entry],
}

/// HTTP sender for the ingest API.
#[derive(Debug)]
pub struct DeliveryClient {
    client: reqwest::Client,
    url: String,
    agent_id: String,
    headers: HeaderMap,
    retry: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
    classifier: Arc<dyn RetryClassifier>,
}

impl DeliveryClient {
    /// Builds a client for the configured collector. The configuration is
    /// expected to have been validated.
    ///
    /// # Errors
    /// Fails if the API key cannot be sent as a header or no HTTP client can be built.
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, TransportError> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| {
                ConfigError::Invalid(
                    "api_key contains characters not allowed in an HTTP header".to_string(),
                )
            })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = build_client(config.request_timeout, config.https_proxy.as_deref())
            .map_err(|e| TransportError::HttpClient(error_chain(&e)))?;

        Ok(Self {
            client,
            url: config.ingest_url().to_string(),
            agent_id: config.agent_id.clone(),
            headers,
            retry: config.retry,
            breaker: Arc::new(CircuitBreaker::new(config.breaker, clock)),
            classifier: Arc::new(DefaultClassifier),
        })
    }

    /// Replaces the default retry classification.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    fn encode(&self, entries: &[Entry]) -> Result<Vec<u8>, DeliveryError> {
        let batch = LogBatch {
            agent_id: &self.agent_id,
            sdk_version: SDK_VERSION,
            entries,
        };
        Ok(serde_json::to_vec(&batch)?)
    }

    /// A single POST, no retries.
    async fn attempt(&self, body: Vec<u8>) -> Result<(), DeliveryError> {
        debug!(
            url = %self.url,
            headers = ?redact_headers(&self.headers),
            bytes = body.len(),
            "Posting batch"
        );
        let start = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(
                status = %status,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Collector accepted batch"
            );
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        debug!(status = %status, body = %text, "Collector returned an error");
        Err(DeliveryError::Status(status))
    }
}

#[async_trait]
impl BatchSender for DeliveryClient {
    async fn send(&self, batch: Vec<Entry>) -> DeliveryOutcome {
        if batch.is_empty() {
            return DeliveryOutcome::Empty;
        }
        let entries = batch.len();

        // Encode before taking a breaker slot so an unsendable batch never
        // holds the half-open probe.
        let body = match self.encode(&batch) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to prepare payload, dropping {entries} entries: {e}");
                return DeliveryOutcome::Dropped(DropReason::Rejected {
                    attempts: 0,
                    status: None,
                });
            }
        };
        drop(batch);

        let Some(permit) = self.breaker.acquire() else {
            warn!(entries, "Circuit open, dropping batch without sending");
            return DeliveryOutcome::Dropped(DropReason::CircuitOpen);
        };

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let error = match self.attempt(body.clone()).await {
                Ok(()) => {
                    permit.succeed();
                    debug!(entries, attempts, "Delivered batch");
                    return DeliveryOutcome::Delivered { attempts };
                }
                Err(error) => error,
            };

            if self.classifier.classify(&error) == Verdict::Abandon {
                error!(
                    entries,
                    attempts, "Collector rejected batch, dropping it: {error}"
                );
                permit.fail();
                let status = match &error {
                    DeliveryError::Status(status) => Some(status.as_u16()),
                    DeliveryError::Transport(e) => e.status().map(|s| s.as_u16()),
                    DeliveryError::Payload(_) => None,
                };
                return DeliveryOutcome::Dropped(DropReason::Rejected { attempts, status });
            }

            if attempts >= max_attempts {
                warn!(
                    entries,
                    attempts, "Giving up on batch after retries: {}",
                    describe(&error)
                );
                permit.fail();
                return DeliveryOutcome::Dropped(DropReason::Exhausted { attempts });
            }

            let delay = self.retry.delay(attempts - 1);
            debug!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying batch delivery: {}",
                describe(&error)
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn probe(&self) -> Result<(), DeliveryError> {
        let ping = [Entry::ping()];
        let body = self.encode(&ping)?;
        self.attempt(body).await
    }

    fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }
}

fn describe(error: &DeliveryError) -> String {
    match error {
        DeliveryError::Transport(e) => error_chain(e),
        other => other.to_string(),
    }
}
