//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend's health endpoint
//! - Publish results to the balancer and the health gauge
//!
//! # Design Decisions
//! - Dedicated HTTP client with its own per-probe timeout, so probes never
//!   contend with the request path
//! - Probes within a sweep run concurrently; one slow backend cannot delay
//!   the others
//! - The first sweep fires immediately, before the first tick interval
//!   elapses

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use url::Url;

use crate::balance::Balancer;
use crate::config::HealthConfig;
use crate::observability::metrics;

/// Background prober feeding backend health into the balancer.
pub struct HealthChecker {
    balancer: Arc<Balancer>,
    client: reqwest::Client,
    interval: Duration,
    path: String,
}

impl HealthChecker {
    pub fn new(balancer: Arc<Balancer>, config: &HealthConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build health check client");

        Self {
            balancer,
            client,
            interval: config.interval,
            path: config.path.clone(),
        }
    }

    /// Run sweeps until the shutdown signal fires. In-flight probes are
    /// abandoned on shutdown; whatever they report afterwards is moot.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep(),
                _ = shutdown.recv() => {
                    tracing::debug!("Health checker stopping");
                    return;
                }
            }
        }
    }

    /// Dispatch one concurrent probe per backend.
    fn sweep(&self) {
        for backend in self.balancer.backends() {
            let client = self.client.clone();
            let balancer = Arc::clone(&self.balancer);
            let url = backend.url().clone();
            let path = self.path.clone();

            tokio::spawn(async move {
                let healthy = probe(&client, &url, &path).await;
                if healthy != backend.is_healthy() {
                    tracing::info!(backend = %url, healthy, "Backend health changed");
                }
                balancer.update_health(url.as_str(), healthy);
                metrics::record_backend_health(url.as_str(), healthy);
            });
        }
    }
}

/// One GET against the backend's health endpoint. Healthy means a 2xx
/// response within the client's timeout; transport errors, timeouts, and
/// other statuses all count as unhealthy.
async fn probe(client: &reqwest::Client, url: &Url, path: &str) -> bool {
    let target = match url.join(path) {
        Ok(target) => target,
        Err(err) => {
            tracing::warn!(backend = %url, error = %err, "Invalid health check path");
            return false;
        }
    };

    match client.get(target).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}
