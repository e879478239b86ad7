// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Decides whether a failed delivery attempt is worth retrying.

use reqwest::StatusCode;
use std::fmt::Debug;

use crate::errors::DeliveryError;

/// How the delivery loop should react to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Transient failure; back off and try again while attempts remain.
    Retry,
    /// The collector will not accept this batch. Give up now.
    Abandon,
}

/// Retry policy hook. Swap in a custom implementation to change which
/// failures are considered transient.
pub trait RetryClassifier: Debug + Send + Sync {
    fn classify(&self, error: &DeliveryError) -> Verdict;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl RetryClassifier for DefaultClassifier {
    fn classify(&self, error: &DeliveryError) -> Verdict {
        match error {
            DeliveryError::Status(status) => classify_status(*status),
            DeliveryError::Transport(e) => {
                if e.is_builder() || e.is_body() || e.is_decode() || e.is_redirect() {
                    Verdict::Abandon
                } else {
                    // Timeouts, refused connections, resets and TLS handshakes.
                    Verdict::Retry
                }
            }
            DeliveryError::Payload(_) => Verdict::Abandon,
        }
    }
}

/// 408, 429 and 5xx are transient. Redirects and other 4xx are not.
#[must_use]
pub fn classify_status(status: StatusCode) -> Verdict {
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        Verdict::Retry
    } else {
        Verdict::Abandon
    }
}
