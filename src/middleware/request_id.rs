//! Request ID middleware.
//!
//! Stamps every request with an `x-request-id` as early as possible so the
//! whole pipeline logs under one correlation ID. Incoming IDs from a
//! trusted front tier are preserved.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub async fn request_id(mut request: Request, next: Next) -> Response {
    if !request.headers().contains_key("x-request-id") {
        if let Ok(value) = HeaderValue::try_from(Uuid::new_v4().to_string()) {
            request.headers_mut().insert("x-request-id", value);
        }
    }

    let id = request
        .headers()
        .get("x-request-id")
        .cloned();

    let mut response = next.run(request).await;
    if let Some(id) = id {
        response.headers_mut().insert("x-request-id", id);
    }
    response
}
