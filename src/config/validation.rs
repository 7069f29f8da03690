//! Configuration validation logic.

use url::Url;

use crate::balance::Algorithm;
use crate::config::schema::ProxyConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a ProxyConfig for semantic correctness. All problems are
/// collected so the operator sees the full list at once.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // 1. Balancing algorithm must be one of the known strategies
    if config.load_balance.algorithm.parse::<Algorithm>().is_err() {
        errors.push(ValidationError(format!(
            "unsupported load balancing algorithm '{}'",
            config.load_balance.algorithm
        )));
    }

    // 2. Backend URLs must be absolute http(s) origins
    for backend in &config.load_balance.backends {
        match Url::parse(&backend.url) {
            Ok(url) => {
                if !matches!(url.scheme(), "http" | "https") {
                    errors.push(ValidationError(format!(
                        "backend '{}' has unsupported scheme '{}'",
                        backend.url,
                        url.scheme()
                    )));
                } else if url.host_str().is_none() {
                    errors.push(ValidationError(format!(
                        "backend '{}' is missing a host",
                        backend.url
                    )));
                }
            }
            Err(err) => {
                errors.push(ValidationError(format!(
                    "backend '{}' is not a valid URL: {}",
                    backend.url, err
                )));
            }
        }
    }

    // 3. Enabled subsystems need workable parameters
    if config.cache.enabled && config.cache.max_size == 0 {
        errors.push(ValidationError("cache.maxSize must be > 0".to_string()));
    }
    if config.rate_limit.enabled {
        if config.rate_limit.capacity == 0 {
            errors.push(ValidationError(
                "rateLimit.capacity must be > 0".to_string(),
            ));
        }
        if config.rate_limit.refill_rate == 0 {
            errors.push(ValidationError(
                "rateLimit.refillRate must be > 0".to_string(),
            ));
        }
    }
    if config.health.enabled && config.health.interval.is_zero() {
        errors.push(ValidationError("health.interval must be > 0".to_string()));
    }

    // 4. TLS material comes as a pair
    if config.server.tls_cert_file.is_empty() != config.server.tls_key_file.is_empty() {
        errors.push(ValidationError(
            "server.tlsCertFile and server.tlsKeyFile must be set together".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
