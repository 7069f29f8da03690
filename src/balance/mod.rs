//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarder → Balancer::select
//!     → strategy picks an index over the shared pool:
//!         - round_robin.rs (rotating cursor)
//!         - least_conn.rs (fewest active connections)
//!         - weighted.rs (smooth weighted round-robin)
//!     → Arc<Backend> handed back for dispatch
//! Health loop → Balancer::update_health (URL-addressed)
//! ```
//!
//! # Design Decisions
//! - One pool, owned by the balancer; order is fixed at construction and
//!   defines tie-breaks
//! - Strategies are enum variants behind the `Balancer` facade; their
//!   state (cursor, current weights) never crosses the public surface
//! - Unhealthy backends are invisible to selection

pub mod backend;
pub mod least_conn;
pub mod round_robin;
pub mod weighted;

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::balance::backend::Backend;
use crate::balance::least_conn::LeastConnections;
use crate::balance::round_robin::RoundRobin;
use crate::balance::weighted::SmoothWeighted;
use crate::config::LoadBalanceConfig;

/// Strategy names accepted in configuration (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    RoundRobin,
    LeastConnections,
    WeightedRoundRobin,
}

impl FromStr for Algorithm {
    type Err = BalanceConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "round-robin" => Ok(Self::RoundRobin),
            "least-connections" => Ok(Self::LeastConnections),
            "weighted-round-robin" => Ok(Self::WeightedRoundRobin),
            other => Err(BalanceConfigError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Fatal errors while building the balancer from configuration.
#[derive(Debug, Error)]
pub enum BalanceConfigError {
    #[error("unsupported load balancing algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("invalid backend url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

/// Why a selection produced no backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("no backends available")]
    NoBackends,
    #[error("no healthy backends available")]
    NoHealthyBackends,
}

#[derive(Debug)]
enum Strategy {
    RoundRobin(RoundRobin),
    LeastConnections(LeastConnections),
    WeightedRoundRobin(SmoothWeighted),
}

/// Owns the backend pool and dispatches selection to the configured
/// strategy.
#[derive(Debug)]
pub struct Balancer {
    backends: Vec<Arc<Backend>>,
    strategy: Strategy,
}

impl Balancer {
    pub fn new(algorithm: Algorithm, backends: Vec<Arc<Backend>>) -> Self {
        let strategy = match algorithm {
            Algorithm::RoundRobin => Strategy::RoundRobin(RoundRobin::new()),
            Algorithm::LeastConnections => Strategy::LeastConnections(LeastConnections::new()),
            Algorithm::WeightedRoundRobin => {
                Strategy::WeightedRoundRobin(SmoothWeighted::new(backends.len()))
            }
        };
        Self { backends, strategy }
    }

    /// Build the pool and strategy from configuration. Unknown algorithms
    /// and malformed URLs are startup-fatal.
    pub fn from_config(config: &LoadBalanceConfig) -> Result<Self, BalanceConfigError> {
        let algorithm: Algorithm = config.algorithm.parse()?;
        let backends = config
            .backends
            .iter()
            .map(|b| {
                let url = Url::parse(&b.url).map_err(|source| BalanceConfigError::InvalidUrl {
                    url: b.url.clone(),
                    source,
                })?;
                Ok(Arc::new(Backend::new(url, b.weight)))
            })
            .collect::<Result<Vec<_>, BalanceConfigError>>()?;
        Ok(Self::new(algorithm, backends))
    }

    /// Pick a backend for the next request. Never returns an unhealthy
    /// backend.
    pub fn select(&self) -> Result<Arc<Backend>, SelectError> {
        if self.backends.is_empty() {
            return Err(SelectError::NoBackends);
        }
        let idx = match &self.strategy {
            Strategy::RoundRobin(rr) => rr.select(&self.backends),
            Strategy::LeastConnections(lc) => lc.select(&self.backends),
            Strategy::WeightedRoundRobin(sw) => sw.select(&self.backends),
        }
        .ok_or(SelectError::NoHealthyBackends)?;
        Ok(Arc::clone(&self.backends[idx]))
    }

    /// Set the health flag of the backend with the given URL. Unknown URLs
    /// are ignored.
    pub fn update_health(&self, url: &str, healthy: bool) {
        if let Some(backend) = self.backends.iter().find(|b| b.url().as_str() == url) {
            backend.set_healthy(healthy);
        }
    }

    /// Admin path: adjust the weight of the backend with the given URL.
    /// Unknown URLs are ignored; non-positive weights are coerced to 1.
    pub fn update_weight(&self, url: &str, weight: i64) {
        if let Some(backend) = self.backends.iter().find(|b| b.url().as_str() == url) {
            backend.set_weight(weight);
        }
    }

    /// Snapshot of the pool, in order. The copy keeps callers from
    /// touching the internal sequence.
    pub fn backends(&self) -> Vec<Arc<Backend>> {
        self.backends.to_vec()
    }
}
