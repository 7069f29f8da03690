//! Round-robin selection.
//!
//! # Algorithm
//! Rotate through the pool in order, skipping unhealthy backends.
//!
//! # Design Decisions
//! - The cursor advances on every probe, not only on success, so a
//!   transiently unhealthy backend does not starve the ones after it
//! - A full sweep without a healthy backend yields no selection

use std::sync::{Arc, Mutex};

use crate::balance::backend::Backend;

/// Rotating cursor over the pool.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: Mutex<usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next healthy backend, or `None` after a full sweep.
    pub fn select(&self, backends: &[Arc<Backend>]) -> Option<usize> {
        let mut cursor = self.cursor.lock().expect("round robin mutex poisoned");
        for _ in 0..backends.len() {
            let idx = *cursor % backends.len();
            *cursor = (idx + 1) % backends.len();
            if backends[idx].is_healthy() {
                return Some(idx);
            }
        }
        None
    }
}
