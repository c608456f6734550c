//! Prometheus metrics for the request pipeline.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `request_guard_requests_admitted_total` - Requests that passed admission control
//! - `request_guard_requests_rate_limited_total` - Requests rejected with 429
//! - `request_guard_failures_translated_total` - Failures translated at the recovery
//!   boundary (label: `category`)
//!
//! ## Gauges
//! - `request_guard_tracked_identities` - Client identities held by the limiter
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter, so
//! tests and embedders without Prometheus pay nothing.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::taxonomy::FailureCategory;

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_ADMITTED_TOTAL: &str = "request_guard_requests_admitted_total";
    pub const REQUESTS_RATE_LIMITED_TOTAL: &str = "request_guard_requests_rate_limited_total";
    pub const FAILURES_TRANSLATED_TOTAL: &str = "request_guard_failures_translated_total";
    pub const TRACKED_IDENTITIES: &str = "request_guard_tracked_identities";
}

/// Install the Prometheus exporter listening on `metrics_addr`.
///
/// # Errors
///
/// Returns `AppError::Metrics` if the exporter cannot be installed.
pub fn init_metrics(metrics_addr: SocketAddr) -> AppResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| AppError::Metrics(e.to_string()))?;

    describe_counter!(
        names::REQUESTS_ADMITTED_TOTAL,
        "Requests admitted by the sliding-window limiter"
    );
    describe_counter!(
        names::REQUESTS_RATE_LIMITED_TOTAL,
        "Requests rejected by the sliding-window limiter"
    );
    describe_counter!(
        names::FAILURES_TRANSLATED_TOTAL,
        "Handler failures translated into error envelopes, by category"
    );
    describe_gauge!(
        names::TRACKED_IDENTITIES,
        "Client identities currently tracked by the limiter"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Count one admission decision.
#[inline]
pub fn record_admission(admitted: bool) {
    if admitted {
        counter!(names::REQUESTS_ADMITTED_TOTAL).increment(1);
    } else {
        counter!(names::REQUESTS_RATE_LIMITED_TOTAL).increment(1);
    }
}

/// Count one translated failure.
#[inline]
pub fn record_failure_translated(category: FailureCategory) {
    counter!(names::FAILURES_TRANSLATED_TOTAL, "category" => category.log_label()).increment(1);
}

/// Publish the limiter table size.
#[inline]
pub fn set_tracked_identities(count: usize) {
    gauge!(names::TRACKED_IDENTITIES).set(count as f64);
}
