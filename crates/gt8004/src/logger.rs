// Copyright 2025-Present GT8004 Team https://gt8004.xyz/
// SPDX-License-Identifier: MIT

//! Log line formatter for host applications.
//!
//! The SDK only emits `tracing` events and never installs a subscriber. Hosts
//! that want SDK lines to stand out can plug [`Formatter`] into their own:
//!
//! ```text
//! GT8004 | WARN | gt8004::breaker | Circuit opened, suspending deliveries cooldown_ms=30000 reopens=0
//! GT8004 | DEBUG | gt8004::delivery | Delivered batch entries=50 attempts=1
//! ```
//!
//! ```rust,no_run
//! let subscriber = tracing_subscriber::fmt()
//!     .event_format(gt8004::logger::Formatter)
//!     .with_max_level(tracing::Level::INFO)
//!     .finish();
//! tracing::subscriber::set_global_default(subscriber).ok();
//! ```

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

/// Renders `GT8004 | LEVEL | target | message fields`, one event per line.
/// Span context is not printed; SDK events carry their context as fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        write!(writer, "GT8004 | {} | {} | ", meta.level(), meta.target())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
