//! Configuration schema definitions.
//!
//! One struct per section, all deserializable from the YAML config file.
//! Every field carries a default so a partial file (or no file at all)
//! yields a runnable configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Listener settings (port, timeouts, optional TLS material).
    pub server: ServerConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Per-client rate limiting settings.
    pub rate_limit: RateLimitConfig,

    /// Backend pool and balancing algorithm.
    pub load_balance: LoadBalanceConfig,

    /// Background health probing settings.
    pub health: HealthConfig,

    /// Logging and metrics exposition settings.
    pub observability: ObservabilityConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub port: u16,

    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// How long to drain in-flight requests after a shutdown signal.
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,

    /// PEM certificate path; TLS is off while empty.
    pub tls_cert_file: String,

    /// PEM private key path; TLS is off while empty.
    pub tls_key_file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(30),
            tls_cert_file: String::new(),
            tls_key_file: String::new(),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub enabled: bool,

    /// Maximum number of cached responses before LRU eviction.
    pub max_size: usize,

    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 1000,
            ttl: Duration::from_secs(5 * 60),
        }
    }
}

/// Token-bucket rate limiting settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub enabled: bool,

    /// Bucket capacity (burst size) per client.
    pub capacity: u64,

    /// Tokens added per second.
    pub refill_rate: u64,

    /// Buckets idle longer than this are dropped when the map is pruned.
    #[serde(with = "humantime_serde")]
    pub idle_ttl: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 100,
            refill_rate: 10,
            idle_ttl: Duration::from_secs(10 * 60),
        }
    }
}

/// Backend pool definition.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadBalanceConfig {
    /// One of `round-robin`, `least-connections`, `weighted-round-robin`.
    pub algorithm: String,

    pub backends: Vec<BackendConfig>,
}

/// A single upstream entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Absolute origin, e.g. `http://10.0.0.5:3000`.
    pub url: String,

    /// Relative share for weighted balancing; non-positive values count
    /// as 1.
    #[serde(default = "default_weight")]
    pub weight: i64,
}

fn default_weight() -> i64 {
    1
}

/// Health probing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthConfig {
    pub enabled: bool,

    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Per-probe deadline, independent of the request-path timeouts.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Path probed on every backend.
    pub path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            path: "/health".to_string(),
        }
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObservabilityConfig {
    /// Default log level when `RUST_LOG` is not set.
    pub log_level: String,

    /// Expose Prometheus metrics over HTTP.
    pub metrics_enabled: bool,

    /// Bind address for the metrics endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
