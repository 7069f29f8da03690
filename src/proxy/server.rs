//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Build the axum Router with the middleware pipeline in its fixed order
//! - Spawn the health checker alongside the accept loop
//! - Serve until shutdown, then drain within the configured grace period
//!
//! # Design Decisions
//! - Pipeline order is data in `build_router`: rate limiter outside the
//!   cache, metrics directly around the forwarder; ambient layers (trace,
//!   request ID, timeout) wrap the whole chain
//! - Disabled middleware are simply not layered in
//! - The drain is bounded: once the grace elapses, remaining connections
//!   are aborted and the server returns

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::balance::{BalanceConfigError, Balancer};
use crate::config::ProxyConfig;
use crate::health::HealthChecker;
use crate::lifecycle::Shutdown;
use crate::middleware::{self, RateLimiter, ResponseCache};
use crate::proxy::forwarder::{forward_handler, Forwarder};

/// The assembled proxy: router, pool, and lifecycle.
pub struct ProxyServer {
    router: Router,
    config: ProxyConfig,
    balancer: Arc<Balancer>,
}

impl ProxyServer {
    /// Build the balancer and pipeline from configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, BalanceConfigError> {
        let balancer = Arc::new(Balancer::from_config(&config.load_balance)?);
        let forwarder = Forwarder::new(Arc::clone(&balancer));
        let router = Self::build_router(&config, forwarder);
        Ok(Self {
            router,
            config,
            balancer,
        })
    }

    /// The balancer owning the backend pool (health updates, admin weight
    /// changes, pool inspection).
    pub fn balancer(&self) -> Arc<Balancer> {
        Arc::clone(&self.balancer)
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Assemble the middleware chain. Layer order is inside-out: the first
    /// layer added sits closest to the forwarder, the last added runs
    /// first on each request.
    fn build_router(config: &ProxyConfig, forwarder: Forwarder) -> Router {
        let mut router = Router::new()
            .route("/", any(forward_handler))
            .route("/{*path}", any(forward_handler))
            .with_state(forwarder)
            .layer(from_fn(middleware::metrics::metrics));

        if config.cache.enabled {
            let cache = Arc::new(ResponseCache::new(&config.cache));
            router = router.layer(from_fn_with_state(cache, middleware::cache::cache));
        }

        if config.rate_limit.enabled {
            let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
            router = router.layer(from_fn_with_state(
                limiter,
                middleware::rate_limit::rate_limit,
            ));
        }

        router
            .layer(TimeoutLayer::new(config.server.write_timeout))
            .layer(from_fn(middleware::request_id::request_id))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve connections until the shutdown signal fires, then drain
    /// within the configured grace period. Completing the drain early
    /// returns early; an expired grace aborts whatever is left.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            algorithm = %self.config.load_balance.algorithm,
            backends = self.balancer.backends().len(),
            "Proxy server starting"
        );

        if self.config.health.enabled {
            let checker = HealthChecker::new(Arc::clone(&self.balancer), &self.config.health);
            let health_shutdown = shutdown.subscribe();
            tokio::spawn(async move {
                checker.run(health_shutdown).await;
            });
        }

        let grace = self.config.server.shutdown_grace;
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut signal_rx = shutdown.subscribe();
        let (signaled_tx, signaled_rx) = tokio::sync::oneshot::channel::<()>();
        let graceful = async move {
            let _ = signal_rx.recv().await;
            let _ = signaled_tx.send(());
        };

        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(graceful)
                .await
        });

        tokio::select! {
            // the accept loop ended on its own (I/O failure)
            joined = &mut server => {
                return joined.map_err(std::io::Error::other)?;
            }
            _ = signaled_rx => {}
        }

        tracing::info!(grace = ?grace, "Shutdown signal received, draining in-flight requests");
        let result = match tokio::time::timeout(grace, &mut server).await {
            Ok(joined) => joined.map_err(std::io::Error::other)?,
            Err(_) => {
                tracing::warn!("Grace period elapsed with requests still in flight, aborting");
                server.abort();
                Ok(())
            }
        };

        tracing::info!("Proxy server stopped");
        result
    }
}
