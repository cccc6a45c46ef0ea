//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, retries, failures, rejections)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_retries_total` (counter): transient failures that were retried
//! - `proxy_upstream_errors_total` (counter): terminal failures by code
//! - `proxy_auth_rejections_total` (counter): 401/403 by reason
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels stay low-cardinality: no paths, no principals

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    metrics::counter!("proxy_requests_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "method" => method, "status" => status)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry() {
    metrics::counter!("proxy_retries_total").increment(1);
}

pub fn record_upstream_error(code: &'static str) {
    metrics::counter!("proxy_upstream_errors_total", "code" => code).increment(1);
}

pub fn record_auth_rejection(reason: &'static str) {
    metrics::counter!("proxy_auth_rejections_total", "reason" => reason).increment(1);
}
