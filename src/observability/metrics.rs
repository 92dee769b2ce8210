//! Metrics collection and exposition.
//!
//! # Metrics
//! - `client_requests_total` (counter): dispatched requests by method, outcome
//! - `client_request_duration_seconds` (histogram): end-to-end dispatch latency
//! - `client_cache_lookups_total` (counter): cache lookups by result
//! - `client_token_refresh_total` (counter): refresh attempts by outcome
//! - `client_retries_total` (counter): transport retries
//! - `client_cancelled_total` (counter): tasks cancelled by reason
//! - `client_inflight_tasks` (gauge): registered in-flight tasks
//! - `client_network_online` (gauge): 1=online, 0=offline
//! - `client_errors_total` (counter): handled errors by kind
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are small closed sets; never URLs or ids

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!("client_requests_total", "method" => method, "outcome" => outcome).increment(1);
    histogram!("client_request_duration_seconds", "method" => method)
        .record(elapsed.as_secs_f64());
}

pub fn record_cache(result: &'static str) {
    counter!("client_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_token_refresh(outcome: &'static str) {
    counter!("client_token_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_retry() {
    counter!("client_retries_total").increment(1);
}

pub fn record_cancelled(reason: &'static str, count: usize) {
    counter!("client_cancelled_total", "reason" => reason).increment(count as u64);
}

pub fn record_registry_size(size: usize) {
    gauge!("client_inflight_tasks").set(size as f64);
}

pub fn record_network_online(online: bool) {
    gauge!("client_network_online").set(if online { 1.0 } else { 0.0 });
}

pub fn record_error(kind: &'static str) {
    counter!("client_errors_total", "kind" => kind).increment(1);
}
