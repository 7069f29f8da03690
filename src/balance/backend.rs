//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream origin
//! - Track health, weight, and active connections (for Least Connections LB)
//! - Hand out RAII guards so the active count survives every exit path

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use url::Url;

/// A single upstream server participating in the pool.
///
/// All mutable fields are atomics: `healthy` is written by the health loop,
/// `weight` by the admin update path, and `active` by in-flight requests,
/// while the balancer reads all three concurrently.
#[derive(Debug)]
pub struct Backend {
    url: Url,
    healthy: AtomicBool,
    weight: AtomicU32,
    active: AtomicUsize,
}

impl Backend {
    /// Create a new backend, healthy by default. Non-positive weights are
    /// coerced to 1.
    pub fn new(url: Url, weight: i64) -> Self {
        Self {
            url,
            healthy: AtomicBool::new(true),
            weight: AtomicU32::new(weight.max(1) as u32),
            active: AtomicUsize::new(0),
        }
    }

    /// The origin this backend serves (scheme + authority).
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn weight(&self) -> u32 {
        self.weight.load(Ordering::Relaxed)
    }

    /// Update the weight. Non-positive values are coerced to 1.
    pub fn set_weight(&self, weight: i64) {
        self.weight.store(weight.max(1) as u32, Ordering::Relaxed);
    }

    /// Number of requests currently dispatched to this backend.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Register an in-flight request. The count drops when the returned
    /// guard does.
    pub fn acquire(self: &Arc<Self>) -> ActiveGuard {
        self.active.fetch_add(1, Ordering::Relaxed);
        ActiveGuard {
            backend: Arc::clone(self),
        }
    }
}

/// RAII guard over a backend's active-connection count.
#[derive(Debug)]
pub struct ActiveGuard {
    backend: Arc<Backend>,
}

impl Deref for ActiveGuard {
    type Target = Backend;

    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.backend.active.fetch_sub(1, Ordering::Relaxed);
    }
}
