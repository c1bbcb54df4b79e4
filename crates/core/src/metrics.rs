//! Metrics definitions for the scan layer.
//!
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`. With no recorder
//! installed every call is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "remote_fetches_total",
        "Total number of page requests sent to the remote API"
    );
    describe_counter!(
        "remote_fetch_errors_total",
        "Total number of failed page requests, by error kind"
    );
    describe_histogram!(
        "remote_fetch_duration_seconds",
        "Time taken by a single page request in seconds"
    );
    describe_counter!(
        "rate_limiter_waits_total",
        "Total number of rate limiter acquisitions"
    );
    describe_counter!(
        "rows_emitted_total",
        "Total number of rows handed to the host engine"
    );
}

/// Record a page request.
pub fn record_remote_fetch() {
    counter!("remote_fetches_total").increment(1);
}

/// Record a failed page request.
///
/// # Arguments
/// * `kind` - Error kind label (see [`crate::error::FetchError::kind`])
pub fn record_remote_fetch_error(kind: &'static str) {
    counter!("remote_fetch_errors_total", "kind" => kind).increment(1);
}

/// Record page request duration.
pub fn record_remote_fetch_duration(duration_secs: f64) {
    histogram!("remote_fetch_duration_seconds").record(duration_secs);
}

/// Record a rate limiter acquisition.
pub fn record_rate_limiter_wait() {
    counter!("rate_limiter_waits_total").increment(1);
}

/// Record a row handed to the host.
pub fn record_row_emitted() {
    counter!("rows_emitted_total").increment(1);
}

/// A timer that records the fetch duration when dropped.
pub struct FetchTimer {
    start: Instant,
}

impl FetchTimer {
    /// Start a new fetch timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for FetchTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FetchTimer {
    fn drop(&mut self) {
        record_remote_fetch_duration(self.start.elapsed().as_secs_f64());
    }
}
