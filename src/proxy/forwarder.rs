//! Request forwarding.
//!
//! # Responsibilities
//! - Ask the balancer for a backend
//! - Rewrite the request URI to the chosen origin
//! - Stream the upstream response back to the client
//! - Translate selection and transport failures into HTTP statuses
//!
//! Everything below this layer speaks errors; everything above it only
//! ever sees a `Response`.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderValue, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::balance::backend::{ActiveGuard, Backend};
use crate::balance::Balancer;

/// Names the upstream that served a request; read back by the metrics
/// middleware from the response extensions.
#[derive(Debug, Clone)]
pub struct BackendLabel(pub Arc<str>);

/// Keeps the backend's active count up while the response is alive. The
/// count drops when the client has consumed (or abandoned) the response.
#[derive(Clone)]
struct ActiveHandle(#[allow(dead_code)] Arc<ActiveGuard>);

/// Streams requests to whichever backend the balancer picks.
#[derive(Clone)]
pub struct Forwarder {
    balancer: Arc<Balancer>,
    client: Client<HttpConnector, Body>,
}

impl Forwarder {
    pub fn new(balancer: Arc<Balancer>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { balancer, client }
    }

    pub fn balancer(&self) -> &Arc<Balancer> {
        &self.balancer
    }

    /// Forward one request. Selection failures become 503, upstream
    /// transport failures become 502; neither is retried elsewhere.
    pub async fn forward(&self, mut request: Request) -> Response {
        let backend = match self.balancer.select() {
            Ok(backend) => backend,
            Err(err) => {
                tracing::warn!(error = %err, "Request rejected, no backend to serve it");
                return (StatusCode::SERVICE_UNAVAILABLE, "No healthy backends available")
                    .into_response();
            }
        };
        let guard = backend.acquire();

        if let Err(response) = point_at_backend(&mut request, &backend) {
            return response;
        }

        request
            .headers_mut()
            .insert("x-forwarded-by", HeaderValue::from_static("proxy"));
        if let Ok(value) = HeaderValue::try_from(backend.url().as_str()) {
            request.headers_mut().insert("x-backend-url", value);
        }
        // let the client stack derive Host from the rewritten authority
        request.headers_mut().remove(header::HOST);

        match self.client.request(request).await {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                let mut response = Response::from_parts(parts, Body::new(body));
                response
                    .extensions_mut()
                    .insert(BackendLabel(Arc::from(backend.url().as_str())));
                response.extensions_mut().insert(ActiveHandle(Arc::new(guard)));
                response
            }
            Err(err) => {
                tracing::error!(
                    backend = %backend.url(),
                    error = %err,
                    "Upstream request failed"
                );
                let mut response =
                    (StatusCode::BAD_GATEWAY, "Backend server error").into_response();
                response
                    .extensions_mut()
                    .insert(BackendLabel(Arc::from(backend.url().as_str())));
                response
            }
        }
    }
}

/// Rewrite the request URI's scheme and authority to the backend's origin.
fn point_at_backend(request: &mut Request, backend: &Backend) -> Result<(), Response> {
    let url = backend.url();
    let mut parts = request.uri().clone().into_parts();

    parts.scheme = Some(Scheme::try_from(url.scheme()).map_err(|_| {
        (StatusCode::BAD_GATEWAY, "Invalid backend address").into_response()
    })?);

    let host = url.host_str().unwrap_or_default();
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    parts.authority = Some(Authority::from_str(&authority).map_err(|_| {
        (StatusCode::BAD_GATEWAY, "Invalid backend address").into_response()
    })?);

    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }

    match Uri::from_parts(parts) {
        Ok(uri) => {
            *request.uri_mut() = uri;
            Ok(())
        }
        Err(_) => Err((StatusCode::INTERNAL_SERVER_ERROR, "URI rewrite failed").into_response()),
    }
}

/// Axum handler delegating to the forwarder.
pub async fn forward_handler(State(forwarder): State<Forwarder>, request: Request) -> Response {
    forwarder.forward(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::routing::any;
    use axum::Router;
    use tokio::net::TcpListener;

    use crate::balance::{Algorithm, Balancer};

    /// Real upstream that echoes the proxy-injected headers back.
    async fn spawn_echo_backend() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route(
            "/{*path}",
            any(|request: Request| async move {
                let forwarded_by = request
                    .headers()
                    .get("x-forwarded-by")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                ([("x-seen-forwarded-by", forwarded_by)], "upstream body")
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn forwarder_for(urls: &[&str]) -> Forwarder {
        let backends = urls
            .iter()
            .map(|u| Arc::new(Backend::new(u.parse().unwrap(), 1)))
            .collect();
        Forwarder::new(Arc::new(Balancer::new(Algorithm::RoundRobin, backends)))
    }

    fn request(path: &str) -> Request {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_forwards_and_injects_headers() {
        let origin = spawn_echo_backend().await;
        let forwarder = forwarder_for(&[origin.as_str()]);

        let response = forwarder.forward(request("/echo")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-seen-forwarded-by").unwrap(),
            "proxy"
        );
        assert!(response.extensions().get::<BackendLabel>().is_some());

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"upstream body");
    }

    #[tokio::test]
    async fn test_active_count_held_until_response_dropped() {
        let origin = spawn_echo_backend().await;
        let forwarder = forwarder_for(&[origin.as_str()]);
        let backend = forwarder.balancer().backends()[0].clone();

        let response = forwarder.forward(request("/echo")).await;
        assert_eq!(backend.active_connections(), 1);

        drop(response);
        assert_eq!(backend.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_no_healthy_backend_is_503() {
        let forwarder = forwarder_for(&["http://127.0.0.1:1"]);
        forwarder.balancer().backends()[0].set_healthy(false);

        let response = forwarder.forward(request("/")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"No healthy backends available");
    }

    #[tokio::test]
    async fn test_empty_pool_is_503() {
        let forwarder = forwarder_for(&[]);
        let response = forwarder.forward(request("/")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_upstream_transport_error_is_502() {
        // port 1 refuses connections
        let forwarder = forwarder_for(&["http://127.0.0.1:1"]);
        let backend = forwarder.balancer().backends()[0].clone();

        let response = forwarder.forward(request("/")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Backend server error");

        // the error path released the active count
        assert_eq!(backend.active_connections(), 0);
    }
}
