//! Configuration subsystem.
//!
//! # Responsibilities
//! - Define the typed configuration schema (YAML, camelCase keys)
//! - Load and parse the config file
//! - Validate semantic correctness before anything is constructed
//!
//! # Design Decisions
//! - No global config singleton: one `ProxyConfig` value is built at
//!   startup and passed by reference into the component factories
//! - Every field has a default, so partial files work
//! - Validation reports every problem at once, not just the first

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackendConfig, CacheConfig, HealthConfig, LoadBalanceConfig, ObservabilityConfig,
    ProxyConfig, RateLimitConfig, ServerConfig,
};
