// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

use reqwest::StatusCode;

/// Configuration rejected at construction time.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("agent_id must not be empty")]
    EmptyAgentId,

    #[error("api_key must not be empty")]
    EmptyApiKey,

    #[error("network must be 'mainnet' or 'testnet', got '{0}'")]
    UnknownNetwork(String),

    #[error("protocol must be one of mcp, a2a, got '{0}'")]
    UnknownProtocol(String),

    #[error("invalid ingest url '{0}'")]
    InvalidIngestUrl(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors surfaced to callers of [`crate::transport::Transport`].
///
/// Only misuse and misconfiguration end up here. Backend failures on the
/// batch path are counted in [`crate::stats::DeliveryStats`] instead.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("no tokio runtime available to run the flush scheduler")]
    NoRuntime,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build http client: {0}")]
    HttpClient(String),

    #[error("connection check failed: {0}")]
    Probe(#[from] DeliveryError),
}

/// Failure of a single delivery attempt, before retry classification.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The collector answered with a non-success status.
    #[error("collector responded with status {0}")]
    Status(StatusCode),

    /// DNS, TLS, connect, timeout and other transport level failures.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The batch could not be encoded.
    #[error("failed to serialize batch: {0}")]
    Payload(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConfigError::UnknownNetwork("devnet".to_string());
        assert_eq!(
            error.to_string(),
            "network must be 'mainnet' or 'testnet', got 'devnet'"
        );

        let error = TransportError::Probe(DeliveryError::Status(StatusCode::UNAUTHORIZED));
        assert_eq!(
            error.to_string(),
            "connection check failed: collector responded with status 401 Unauthorized"
        );
    }

    #[test]
    fn test_config_error_converts() {
        let error: TransportError = ConfigError::EmptyApiKey.into();
        assert!(matches!(
            error,
            TransportError::Config(ConfigError::EmptyApiKey)
        ));
    }
}
