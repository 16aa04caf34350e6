//! Logging facilities for webact.
//!
//! webact uses the `tracing` crate for instrumentation. To see logs, install
//! a subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("webact=debug,webact_net=debug")
//!         .init();
//! }
//! ```
//!
//! The [`targets`] module lists the target names used by each subsystem so
//! they can be filtered individually, and [`PerfSpan`] times an operation.

use std::time::{Duration, Instant};

/// Span names used throughout webact for tracing.
pub mod span_names {
    /// List filter recompute span.
    pub const FILTER_UPDATE: &str = "webact::filter_update";
    /// Tag index rebuild span.
    pub const TAG_REINDEX: &str = "webact::tag_reindex";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core target.
    pub const CORE: &str = "webact_core";
    /// Broadcaster dispatch target.
    pub const BROADCAST: &str = "webact_core::broadcast";
    /// List models and filters.
    pub const MODEL: &str = "webact::model";
    /// Tag index target.
    pub const TAGS: &str = "webact::tags";
    /// Tree nodes target.
    pub const TREE: &str = "webact::tree";
    /// HTTP client target.
    pub const HTTP: &str = "webact_net::http";
    /// Connector request queue target.
    pub const CONNECTOR: &str = "webact_net::connector";
}

/// Default duration above which a [`PerfSpan`] logs a warning.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(50);

/// A guard that keeps a tracing span entered and reports its duration.
///
/// On drop the elapsed time is logged at trace level, or at warn level when
/// it exceeds the threshold.
#[derive(Debug)]
pub struct PerfSpan {
    name: &'static str,
    started: Instant,
    threshold: Duration,
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span using [`DEFAULT_SLOW_THRESHOLD`].
    pub fn new(name: &'static str) -> Self {
        Self::with_threshold(name, DEFAULT_SLOW_THRESHOLD)
    }

    /// Create a performance span with a custom slow threshold.
    pub fn with_threshold(name: &'static str, threshold: Duration) -> Self {
        let span = tracing::trace_span!(target: "webact::perf", "perf", operation = name);
        Self {
            name,
            started: Instant::now(),
            threshold,
            span: span.entered(),
        }
    }

    /// Time elapsed since the span was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for PerfSpan {
    fn drop(&mut self) {
        let elapsed = self.elapsed();
        if elapsed > self.threshold {
            tracing::warn!(
                target: "webact::perf",
                operation = self.name,
                elapsed_ms = elapsed.as_millis() as u64,
                "slow operation"
            );
        } else {
            tracing::trace!(
                target: "webact::perf",
                operation = self.name,
                elapsed_us = elapsed.as_micros() as u64,
                "operation finished"
            );
        }
    }
}

/// Macros for common tracing patterns.
///
/// These are thin wrappers around the `tracing` macros with consistent
/// target naming.
#[macro_export]
macro_rules! webact_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "webact", $($arg)*)
    };
}

#[macro_export]
macro_rules! webact_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "webact", $($arg)*)
    };
}

#[macro_export]
macro_rules! webact_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "webact", $($arg)*)
    };
}
