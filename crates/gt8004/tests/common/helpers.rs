// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Helper functions for integration tests

use gt8004::backoff::RetryPolicy;
use gt8004::breaker::BreakerPolicy;
use gt8004::{Config, Entry, Protocol};
use std::future::Future;
use std::time::Duration;

pub const INGEST_PATH: &str = "/v1/ingest";

/// Config pointed at a mock collector, with retry delays short enough for tests.
#[allow(dead_code)]
pub fn test_config(server_url: &str) -> Config {
    Config {
        ingest_url: Some(format!("{server_url}{INGEST_PATH}")),
        flush_interval: Duration::from_secs(3600),
        request_timeout: Duration::from_secs(2),
        retry: RetryPolicy {
            base_delay: Duration::from_millis(10),
            multiplier: 2.0,
            jitter: Duration::from_millis(2),
            max_delay: Duration::from_millis(50),
            max_attempts: 3,
        },
        breaker: BreakerPolicy::default(),
        ..Config::new("agent-test", "gt8004_sk_test")
    }
}

#[allow(dead_code)]
pub fn entry(request_id: &str) -> Entry {
    Entry::builder("POST", "/mcp")
        .request_id(request_id)
        .tool_name("search")
        .protocol(Protocol::Mcp)
        .status_code(200)
        .latency(Duration::from_millis(7))
        .build()
}

/// Polls `condition` until it holds or `deadline` passes.
#[allow(dead_code)]
pub async fn wait_until<F, Fut>(deadline: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition().await
}
