//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, cache outcome
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_rejections_total` (counter): early rejections by reason
//! - `gateway_cache_stores_total` (counter): responses written to the cache
//! - `gateway_log_sink_failures_total` (counter): dropped access-log events
//! - `gateway_store_errors_total` (counter): counter/cache store failures by operation
//! - `gateway_background_tasks` (gauge): detached writes still in flight
//!
//! Recording is a no-op until a recorder is installed, so tests never need one.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, cache: &'static str, start: Instant) {
    ::metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "cache" => cache
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    ::metrics::counter!("gateway_rejections_total", "reason" => reason).increment(1);
}

pub fn record_cache_store() {
    ::metrics::counter!("gateway_cache_stores_total").increment(1);
}

pub fn record_log_sink_failure() {
    ::metrics::counter!("gateway_log_sink_failures_total").increment(1);
}

pub fn record_store_error(operation: &'static str) {
    ::metrics::counter!("gateway_store_errors_total", "operation" => operation).increment(1);
}

pub fn record_background_tasks(in_flight: u64) {
    ::metrics::gauge!("gateway_background_tasks").set(in_flight as f64);
}
