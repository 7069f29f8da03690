//! Metrics collection and exposition.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");

    tracing::info!("Metrics server listening on http://{}", addr);
}

/// Record one completed proxy request.
pub fn record_request(method: &str, status: u16, backend: &str, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("status_code", status.to_string()),
        ("backend", backend.to_string()),
    ];
    counter!("proxy_requests_total", &labels).increment(1);

    histogram!(
        "proxy_request_duration_seconds",
        "method" => method.to_string(),
        "backend" => backend.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Publish a backend's health as a 0/1 gauge.
pub fn record_backend_health(backend_url: &str, healthy: bool) {
    let value = if healthy { 1.0 } else { 0.0 };
    gauge!("proxy_backend_health", "backend_url" => backend_url.to_string()).set(value);
}

pub fn inc_active_connections() {
    gauge!("proxy_active_connections").increment(1.0);
}

pub fn dec_active_connections() {
    gauge!("proxy_active_connections").decrement(1.0);
}
