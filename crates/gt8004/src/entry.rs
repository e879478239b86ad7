// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Telemetry records and their wire representation.
//!
//! An [`Entry`] describes one observed request: which tool or skill was
//! invoked, how it ended, how long it took and, for paid calls, the x402
//! payment details. Entries are built once through [`EntryBuilder`] and are
//! read-only afterwards; the transport takes ownership on `record()` and
//! hands them to exactly one batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;

/// Request and response bodies are truncated to this many bytes.
pub const BODY_LIMIT: usize = 16 * 1024;

const DEFAULT_SOURCE: &str = "sdk";
const PING_SOURCE: &str = "sdk_ping";

/// Agent protocol an entry was observed on. Plain HTTP has no tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Model Context Protocol tool call.
    Mcp,
    /// Agent-to-agent skill invocation.
    A2a,
}

impl Protocol {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Mcp => "mcp",
            Protocol::A2a => "a2a",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mcp" => Ok(Protocol::Mcp),
            "a2a" => Ok(Protocol::A2a),
            _ => Err(ConfigError::UnknownProtocol(s.to_string())),
        }
    }
}

/// x402 payment details attached to a paid request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Payment {
    /// Amount in token units (USDC has 6 decimals on the wire, already scaled here).
    #[serde(rename = "x402Amount", skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(rename = "x402TxHash", skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(rename = "x402Token", skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "x402Payer", skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl Payment {
    fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.tx_hash.is_none()
            && self.token.is_none()
            && self.payer.is_none()
    }
}

/// One immutable telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    request_id: String,
    method: String,
    path: String,
    status_code: u16,
    response_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_type: Option<String>,
    #[serde(flatten)]
    payment: Option<Payment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_body_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_body_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    referer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accept_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    protocol: Option<Protocol>,
    source: String,
    timestamp: DateTime<Utc>,
}

impl Entry {
    /// Starts a new entry for a request with the given method and path.
    #[must_use]
    pub fn builder(method: impl Into<String>, path: impl Into<String>) -> EntryBuilder {
        EntryBuilder::new(method, path)
    }

    /// Synthetic entry posted by the startup connectivity check.
    pub(crate) fn ping() -> Self {
        let mut builder = EntryBuilder::new("PING", "/_sdk/startup")
            .request_id("startup-ping")
            .status_code(0);
        builder.source = PING_SOURCE.to_string();
        builder.build()
    }

    /// Fills in the transport's default protocol when the instrumentation did not set one.
    pub(crate) fn with_default_protocol(mut self, protocol: Option<Protocol>) -> Self {
        if self.protocol.is_none() {
            self.protocol = protocol;
        }
        self
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Observed latency in milliseconds.
    #[must_use]
    pub fn response_ms(&self) -> f64 {
        self.response_ms
    }

    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    #[must_use]
    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    #[must_use]
    pub fn error_type(&self) -> Option<&str> {
        self.error_type.as_deref()
    }

    #[must_use]
    pub fn payment(&self) -> Option<&Payment> {
        self.payment.as_ref()
    }

    #[must_use]
    pub fn request_body(&self) -> Option<&str> {
        self.request_body.as_deref()
    }

    #[must_use]
    pub fn response_body(&self) -> Option<&str> {
        self.response_body.as_deref()
    }

    #[must_use]
    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Builder for [`Entry`]. Every field except method and path is optional.
#[derive(Debug, Clone)]
#[must_use]
pub struct EntryBuilder {
    request_id: Option<String>,
    method: String,
    path: String,
    status_code: u16,
    latency: Duration,
    customer_id: Option<String>,
    tool_name: Option<String>,
    error_type: Option<String>,
    payment: Option<Payment>,
    request_body: Option<String>,
    response_body: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    referer: Option<String>,
    content_type: Option<String>,
    accept_language: Option<String>,
    protocol: Option<Protocol>,
    source: String,
    timestamp: Option<DateTime<Utc>>,
}

impl EntryBuilder {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            request_id: None,
            method: method.into(),
            path: path.into(),
            status_code: 200,
            latency: Duration::ZERO,
            customer_id: None,
            tool_name: None,
            error_type: None,
            payment: None,
            request_body: None,
            response_body: None,
            ip_address: None,
            user_agent: None,
            referer: None,
            content_type: None,
            accept_language: None,
            protocol: None,
            source: DEFAULT_SOURCE.to_string(),
            timestamp: None,
        }
    }

    /// Defaults to a random UUID when not set.
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn status_code(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Attaches payment details. An all-empty [`Payment`] is ignored.
    pub fn payment(mut self, payment: Payment) -> Self {
        self.payment = (!payment.is_empty()).then_some(payment);
        self
    }

    pub fn request_body(mut self, body: impl Into<String>) -> Self {
        self.request_body = Some(body.into());
        self
    }

    pub fn response_body(mut self, body: impl Into<String>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn accept_language(mut self, accept_language: impl Into<String>) -> Self {
        self.accept_language = Some(accept_language.into());
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Overrides the capture time. Defaults to the moment [`EntryBuilder::build`] runs.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn build(self) -> Entry {
        let request_body_size = self.request_body.as_ref().map(String::len);
        let response_body_size = self.response_body.as_ref().map(String::len);
        Entry {
            request_id: self
                .request_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            method: self.method,
            path: self.path,
            status_code: self.status_code,
            response_ms: self.latency.as_nanos() as f64 / 1_000_000.0,
            customer_id: self.customer_id,
            tool_name: self.tool_name,
            error_type: self.error_type,
            payment: self.payment,
            request_body: self.request_body.map(truncate_body),
            response_body: self.response_body.map(truncate_body),
            request_body_size,
            response_body_size,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            referer: self.referer,
            content_type: self.content_type,
            accept_language: self.accept_language,
            protocol: self.protocol,
            source: self.source,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

/// Cuts a body down to [`BODY_LIMIT`] bytes without splitting a UTF-8 sequence.
fn truncate_body(mut body: String) -> String {
    if body.len() <= BODY_LIMIT {
        return body;
    }
    let mut end = BODY_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
    body
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_entry_serializes_camel_case_and_skips_empty_fields() {
        let timestamp = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let entry = Entry::builder("POST", "/mcp")
            .request_id("r1")
            .status_code(200)
            .latency(Duration::from_millis(12))
            .tool_name("search")
            .protocol(Protocol::Mcp)
            .timestamp(timestamp)
            .build();

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({
                "requestId": "r1",
                "method": "POST",
                "path": "/mcp",
                "statusCode": 200,
                "responseMs": 12.0,
                "toolName": "search",
                "protocol": "mcp",
                "source": "sdk",
                "timestamp": "2025-01-02T03:04:05Z",
            })
        );
    }

    #[test]
    fn test_payment_fields_are_flattened() {
        let entry = Entry::builder("POST", "/a2a/summarize")
            .payment(Payment {
                amount: Some(0.25),
                tx_hash: Some("0xabc".to_string()),
                token: Some("USDC-base".to_string()),
                payer: Some("0xpayer".to_string()),
            })
            .build();

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["x402Amount"], json!(0.25));
        assert_eq!(value["x402TxHash"], json!("0xabc"));
        assert_eq!(value["x402Token"], json!("USDC-base"));
        assert_eq!(value["x402Payer"], json!("0xpayer"));
        assert!(value.get("payment").is_none());
    }

    #[test]
    fn test_empty_payment_is_dropped() {
        let entry = Entry::builder("GET", "/").payment(Payment::default()).build();
        assert!(entry.payment().is_none());
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("x402Amount").is_none());
    }

    #[test]
    fn test_request_id_defaults_to_uuid() {
        let a = Entry::builder("GET", "/").build();
        let b = Entry::builder("GET", "/").build();
        assert_ne!(a.request_id(), b.request_id());
        assert!(uuid::Uuid::parse_str(a.request_id()).is_ok());
    }

    #[test]
    fn test_bodies_are_truncated_on_char_boundary() {
        // 'é' is two bytes, so the limit falls in the middle of a character.
        let body = format!("a{}", "é".repeat(BODY_LIMIT));
        let entry = Entry::builder("POST", "/").request_body(body.clone()).build();

        let stored = entry.request_body().unwrap();
        assert!(stored.len() <= BODY_LIMIT);
        assert_eq!(stored.len(), BODY_LIMIT - 1);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["requestBodySize"], json!(body.len()));
    }

    #[test]
    fn test_default_protocol_does_not_override() {
        let untagged = Entry::builder("GET", "/").build();
        assert_eq!(
            untagged.with_default_protocol(Some(Protocol::Mcp)).protocol(),
            Some(Protocol::Mcp)
        );

        let tagged = Entry::builder("GET", "/").protocol(Protocol::A2a).build();
        assert_eq!(
            tagged.with_default_protocol(Some(Protocol::Mcp)).protocol(),
            Some(Protocol::A2a)
        );
    }

    #[test]
    fn test_ping_entry() {
        let ping = Entry::ping();
        assert_eq!(ping.method(), "PING");
        assert_eq!(ping.path(), "/_sdk/startup");
        assert_eq!(ping.source(), "sdk_ping");
        assert_eq!(ping.status_code(), 0);
    }

    #[test]
    fn test_protocol_parse() {
        assert_eq!("mcp".parse::<Protocol>(), Ok(Protocol::Mcp));
        assert_eq!(" A2A ".parse::<Protocol>(), Ok(Protocol::A2a));
        assert_eq!(
            "grpc".parse::<Protocol>(),
            Err(ConfigError::UnknownProtocol("grpc".to_string()))
        );
    }
}
