//! Per-client rate limiting middleware.
//!
//! # Responsibilities
//! - Identify the client behind each request
//! - Track one token bucket per client key
//! - Reject over-budget requests with 429 before they reach the cache

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::config::RateLimitConfig;

/// Inserts trigger a prune of idle buckets once the map reaches this size.
const PRUNE_WATERMARK: usize = 1024;

/// A token bucket for a single client.
#[derive(Debug)]
struct TokenBucket {
    tokens: u64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Refill, then try to take one token.
    ///
    /// Only whole elapsed seconds convert to tokens, and `last_refill`
    /// moves only when at least one token was added, so sub-second
    /// remainders keep accumulating across calls.
    fn try_acquire(&mut self, capacity: u64, refill_rate: u64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs();
        let tokens_to_add = elapsed * refill_rate;
        if tokens_to_add > 0 {
            self.tokens = (self.tokens + tokens_to_add).min(capacity);
            self.last_refill = now;
        }

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }
}

/// Shared state for the rate limiting middleware: one bucket per client
/// key, lazily created.
pub struct RateLimiter {
    buckets: RwLock<HashMap<String, Arc<Mutex<TokenBucket>>>>,
    capacity: u64,
    refill_rate: u64,
    idle_ttl: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            capacity: config.capacity,
            refill_rate: config.refill_rate,
            idle_ttl: config.idle_ttl,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Consume one token for `key`, creating the bucket on first sight.
    pub fn try_acquire(&self, key: &str) -> bool {
        let bucket = self.bucket(key);
        let mut bucket = bucket.lock().expect("token bucket mutex poisoned");
        bucket.try_acquire(self.capacity, self.refill_rate)
    }

    /// Read-locked lookup with a write-locked double-checked insert, so
    /// the hot path never takes the write lock.
    fn bucket(&self, key: &str) -> Arc<Mutex<TokenBucket>> {
        if let Some(bucket) = self
            .buckets
            .read()
            .expect("rate limiter lock poisoned")
            .get(key)
        {
            return Arc::clone(bucket);
        }

        let mut buckets = self.buckets.write().expect("rate limiter lock poisoned");
        if let Some(bucket) = buckets.get(key) {
            return Arc::clone(bucket);
        }

        if buckets.len() >= PRUNE_WATERMARK {
            prune_idle(&mut buckets, self.idle_ttl);
        }

        let bucket = Arc::new(Mutex::new(TokenBucket::new(self.capacity)));
        buckets.insert(key.to_string(), Arc::clone(&bucket));
        bucket
    }
}

/// Drop buckets that have not refilled within `idle_ttl`. Keeps the map
/// bounded under churning client populations; active clients always have a
/// recent `last_refill` and survive.
fn prune_idle(buckets: &mut HashMap<String, Arc<Mutex<TokenBucket>>>, idle_ttl: Duration) {
    let before = buckets.len();
    buckets.retain(|_, bucket| {
        bucket
            .lock()
            .expect("token bucket mutex poisoned")
            .last_refill
            .elapsed()
            < idle_ttl
    });
    let dropped = before - buckets.len();
    if dropped > 0 {
        tracing::debug!(dropped, remaining = buckets.len(), "Pruned idle rate limit buckets");
    }
}

/// Client identity for bucketing: leftmost `X-Forwarded-For` entry, then
/// `X-Real-IP`, then the peer address.
fn client_key(request: &Request) -> String {
    let headers = request.headers();

    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware function enforcing the per-client budget.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let limit = HeaderValue::from(limiter.capacity());

    if limiter.try_acquire(&key) {
        let mut response = next.run(request).await;
        response.headers_mut().insert("x-ratelimit-limit", limit);
        response
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        let mut response = Response::new(Body::from("Rate limit exceeded"));
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        response.headers_mut().insert("x-ratelimit-limit", limit);
        response
            .headers_mut()
            .insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn limiter(capacity: u64, refill_rate: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            capacity,
            refill_rate,
            idle_ttl: Duration::from_secs(600),
        })
    }

    /// Rewind a bucket's refill clock as if `secs` had passed.
    fn rewind(limiter: &RateLimiter, key: &str, duration: Duration) {
        let bucket = limiter.bucket(key);
        bucket.lock().unwrap().last_refill -= duration;
    }

    #[test]
    fn test_burst_up_to_capacity_then_deny() {
        let rl = limiter(2, 1);
        assert!(rl.try_acquire("c"));
        assert!(rl.try_acquire("c"));
        assert!(!rl.try_acquire("c"));
    }

    #[test]
    fn test_refill_is_floor_of_elapsed_seconds() {
        let rl = limiter(10, 2);
        for _ in 0..10 {
            assert!(rl.try_acquire("c"));
        }
        assert!(!rl.try_acquire("c"));

        // 900ms is not a whole second, nothing refills
        rewind(&rl, "c", Duration::from_millis(900));
        assert!(!rl.try_acquire("c"));

        // one more rewind crosses 1s: floor(1.x) * 2 = 2 tokens
        rewind(&rl, "c", Duration::from_millis(200));
        assert!(rl.try_acquire("c"));
        assert!(rl.try_acquire("c"));
        assert!(!rl.try_acquire("c"));
    }

    #[test]
    fn test_refill_saturates_at_capacity() {
        let rl = limiter(3, 10);
        assert!(rl.try_acquire("c"));
        rewind(&rl, "c", Duration::from_secs(60));

        // a minute at 10/s would be 600 tokens; the bucket holds 3
        assert!(rl.try_acquire("c"));
        assert!(rl.try_acquire("c"));
        assert!(rl.try_acquire("c"));
        assert!(!rl.try_acquire("c"));
    }

    #[test]
    fn test_admitted_rate_converges_to_refill_rate() {
        let rl = limiter(2, 1);

        // exhaust the initial burst
        while rl.try_acquire("c") {}

        // an over-budget client hammering once per simulated second is
        // admitted exactly refill_rate times per second
        let mut admitted = 0;
        for _ in 0..50 {
            rewind(&rl, "c", Duration::from_secs(1));
            if rl.try_acquire("c") {
                admitted += 1;
            }
            // a second immediate attempt in the same second must fail
            assert!(!rl.try_acquire("c"));
        }
        assert_eq!(admitted, 50);
    }

    #[test]
    fn test_buckets_are_per_client() {
        let rl = limiter(1, 1);
        assert!(rl.try_acquire("a"));
        assert!(rl.try_acquire("b"));
        assert!(!rl.try_acquire("a"));
    }

    #[test]
    fn test_prune_drops_only_idle_buckets() {
        let rl = limiter(5, 1);
        rl.try_acquire("idle");
        rl.try_acquire("active");
        rewind(&rl, "idle", Duration::from_secs(3600));

        let mut buckets = rl.buckets.write().unwrap();
        prune_idle(&mut buckets, rl.idle_ttl);
        assert!(!buckets.contains_key("idle"));
        assert!(buckets.contains_key("active"));
    }

    #[test]
    fn test_client_key_precedence() {
        let request = Request::builder()
            .header("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.7");

        let request = Request::builder()
            .header("x-real-ip", " 198.51.100.2 ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "198.51.100.2");

        let mut request = Request::builder().body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("192.0.2.9:51000".parse().unwrap()));
        assert_eq!(client_key(&request), "192.0.2.9");
    }

    #[tokio::test]
    async fn test_middleware_throttles_third_request() {
        let state = Arc::new(limiter(2, 1));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(state, rate_limit));

        for expected in [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/")
                        .header("x-forwarded-for", "10.1.2.3")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), expected);
            assert_eq!(
                response.headers().get("x-ratelimit-limit").unwrap(),
                &HeaderValue::from_static("2")
            );
            if expected == StatusCode::TOO_MANY_REQUESTS {
                assert_eq!(
                    response.headers().get("x-ratelimit-remaining").unwrap(),
                    &HeaderValue::from_static("0")
                );
            }
        }
    }
}
