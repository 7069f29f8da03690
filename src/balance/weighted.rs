//! Smooth weighted round-robin selection.
//!
//! # Algorithm
//! The Nginx smoothing scheme: every healthy backend gains its configured
//! weight each round, the largest accumulated weight wins, and the winner
//! pays back the total healthy weight. Long-run selection frequencies match
//! the weight ratios without clustering consecutive picks on one backend.

use std::sync::{Arc, Mutex};

use crate::balance::backend::Backend;

/// Per-backend accumulated weights, parallel to the pool.
#[derive(Debug)]
pub struct SmoothWeighted {
    current: Mutex<Vec<i64>>,
}

impl SmoothWeighted {
    pub fn new(pool_size: usize) -> Self {
        Self {
            current: Mutex::new(vec![0; pool_size]),
        }
    }

    /// Index of the next backend per the smoothing scheme, or `None` when
    /// no backend is healthy. Unhealthy backends neither accumulate nor
    /// compete.
    pub fn select(&self, backends: &[Arc<Backend>]) -> Option<usize> {
        let mut current = self.current.lock().expect("weighted mutex poisoned");

        let mut best: Option<usize> = None;
        let mut total: i64 = 0;
        for (idx, backend) in backends.iter().enumerate() {
            if !backend.is_healthy() {
                continue;
            }
            let weight = i64::from(backend.weight());
            current[idx] += weight;
            total += weight;
            match best {
                // ties break toward the earliest index
                Some(k) if current[idx] <= current[k] => {}
                _ => best = Some(idx),
            }
        }

        let winner = best?;
        current[winner] -= total;
        Some(winner)
    }
}
