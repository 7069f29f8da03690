//! Request metrics middleware.
//!
//! Sits directly around the forwarder so cache hits never skew upstream
//! counters and the recorded status is the real upstream outcome.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

use crate::observability::metrics;
use crate::proxy::forwarder::BackendLabel;

/// Decrements the in-flight gauge on every exit path.
struct InFlightGuard;

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        metrics::dec_active_connections();
    }
}

/// Middleware function recording duration, status, and in-flight count.
pub async fn metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().as_str().to_string();

    metrics::inc_active_connections();
    let _in_flight = InFlightGuard;

    let response = next.run(request).await;

    let backend = response
        .extensions()
        .get::<BackendLabel>()
        .map(|label| label.0.to_string())
        .unwrap_or_else(|| "proxy".to_string());
    metrics::record_request(
        &method,
        response.status().as_u16(),
        &backend,
        start.elapsed(),
    );

    response
}
