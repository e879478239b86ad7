// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::backoff::RetryPolicy;
use crate::breaker::BreakerPolicy;
use crate::entry::Protocol;
use crate::errors::ConfigError;

const MAINNET_INGEST_URL: &str = "https://ingest.gt8004.xyz/v1/ingest";
const TESTNET_INGEST_URL: &str = "https://testnet.ingest.gt8004.xyz/v1/ingest";

/// GT8004 deployment the transport reports to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    #[must_use]
    pub fn ingest_url(self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_INGEST_URL,
            Network::Testnet => TESTNET_INGEST_URL,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            _ => Err(ConfigError::UnknownNetwork(s.to_string())),
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Agent identity reported with every batch
    pub agent_id: String,
    /// GT8004 API key, sent as a bearer token
    pub api_key: String,
    pub network: Network,
    /// Overrides the network's ingest URL when set
    pub ingest_url: Option<String>,
    /// Protocol stamped on entries recorded without one
    pub protocol: Option<Protocol>,
    /// Pending entries that trigger an immediate flush
    pub batch_size: usize,
    /// Longest time an entry waits before a flush is attempted
    pub flush_interval: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    pub retry: RetryPolicy,
    pub breaker: BreakerPolicy,
}

impl Config {
    /// Configuration with default tuning for the given credentials.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            api_key: api_key.into(),
            network: Network::default(),
            ingest_url: None,
            protocol: None,
            batch_size: 50,
            flush_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            https_proxy: None,
            retry: RetryPolicy::default(),
            breaker: BreakerPolicy::default(),
        }
    }

    /// Endpoint batches are posted to.
    #[must_use]
    pub fn ingest_url(&self) -> &str {
        self.ingest_url
            .as_deref()
            .unwrap_or_else(|| self.network.ingest_url())
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_id.trim().is_empty() {
            return Err(ConfigError::EmptyAgentId);
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }

        let url = self.ingest_url();
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidIngestUrl(url.to_string())),
        }

        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "flush_interval must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.multiplier must be >= 1.0, got {}",
                self.retry.multiplier
            )));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "breaker.failure_threshold must be greater than 0".to_string(),
            ));
        }
        if self.breaker.cooldown_multiplier.is_nan() || self.breaker.cooldown_multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "breaker.cooldown_multiplier must be >= 1.0, got {}",
                self.breaker.cooldown_multiplier
            )));
        }

        Ok(())
    }
}
