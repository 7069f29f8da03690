//! Request-path middleware.
//!
//! # Pipeline
//! ```text
//! client → rate_limit → cache → metrics → forwarder → upstream
//! ```
//! The order is fixed and load-bearing:
//! - rate limiting runs before the cache, so a throttled client cannot
//!   populate (or pollute) cached entries
//! - metrics wrap the forwarder, inside the cache, so upstream counters
//!   reflect only requests that actually reached a backend
//!
//! Each middleware is a plain async function over (request, next); the
//! server assembles the chain by folding the enabled layers over the
//! forwarding handler.

pub mod cache;
pub mod metrics;
pub mod rate_limit;
pub mod request_id;

pub use cache::ResponseCache;
pub use rate_limit::RateLimiter;
