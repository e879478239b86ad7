// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Shared `reqwest` client construction and request logging helpers.

use reqwest::header::HeaderMap;
use std::error::Error;
use std::time::Duration;
use tracing::error;

use crate::clock::FAR_FUTURE;
use crate::USER_AGENT;

const SENSITIVE_HEADERS: [&str; 2] = ["authorization", "proxy-authorization"];

/// Builds the HTTP client used for every request to the collector.
///
/// A proxy URL that cannot be parsed is logged and ignored rather than
/// failing construction; telemetry must never take the host down.
///
/// # Errors
/// Returns an error only if no client can be built at all, for example when
/// the TLS backend fails to initialize.
pub fn build_client(
    timeout: Duration,
    https_proxy: Option<&str>,
) -> Result<reqwest::Client, reqwest::Error> {
    match build_client_inner(timeout, https_proxy) {
        Ok(client) => Ok(client),
        Err(e) => {
            error!(
                "Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            build_client_inner(timeout, None)
        }
    }
}

fn build_client_inner(
    timeout: Duration,
    https_proxy: Option<&str>,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout.min(FAR_FUTURE))
        // A redirect from the collector means a misconfigured URL, not something to follow.
        .redirect(reqwest::redirect::Policy::none())
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if let Some(https_uri) = https_proxy {
        let proxy = reqwest::Proxy::https(https_uri)?;
        client = client.proxy(proxy);
    }

    client.build()
}

/// Header list safe to put in debug logs.
#[must_use]
pub fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let lower = name.as_str().to_ascii_lowercase();
            let display = if SENSITIVE_HEADERS.contains(&lower.as_str()) {
                "<redacted>".to_string()
            } else {
                value
                    .to_str()
                    .map(ToString::to_string)
                    .unwrap_or_else(|_| "<non-utf8>".to_string())
            };
            (lower, display)
        })
        .collect()
}

/// Flattens an error and its sources into one line.
pub(crate) fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
