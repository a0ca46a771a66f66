//! Request metrics recorded through the `metrics` facade.
//!
//! The Prometheus exporter is installed in `server::start` and rendered at
//! `GET /metrics`; tests run without a recorder installed, in which case
//! these calls are no-ops.

use metrics::{counter, histogram};
use std::time::Instant;

/// Count a completed request for a route with its response status.
pub fn record_request(route: &'static str, status: u16) {
    counter!(
        "hlsrelay_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record wall-clock handling duration for a route.
pub fn record_duration(route: &'static str, start: Instant) {
    histogram!("hlsrelay_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

/// Count an upstream fetch that failed at the network level.
pub fn record_upstream_error() {
    counter!("hlsrelay_upstream_errors_total").increment(1);
}
