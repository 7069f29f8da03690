//! Least Connections selection.

use std::sync::Arc;

use crate::balance::backend::Backend;

/// Selects the healthy backend with the fewest active connections.
/// In case of a tie the earliest backend in pool order wins.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the least-loaded healthy backend.
    ///
    /// The scan reads the counters without coordination with in-flight
    /// increments; the snapshot is eventually consistent, which is
    /// sufficient for balancing.
    pub fn select(&self, backends: &[Arc<Backend>]) -> Option<usize> {
        backends
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_healthy())
            .min_by_key(|(_, b)| b.active_connections())
            .map(|(idx, _)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> Vec<Arc<Backend>> {
        (0..n)
            .map(|i| {
                let url = format!("http://127.0.0.1:{}", 3000 + i);
                Arc::new(Backend::new(url.parse().unwrap(), 1))
            })
            .collect()
    }

    #[test]
    fn test_picks_minimum_active() {
        let backends = pool(2);
        let lc = LeastConnections::new();

        // artificially load the first backend
        let _g = backends[0].acquire();

        assert_eq!(lc.select(&backends), Some(1));

        // now load the second one past the first
        let _g1 = backends[1].acquire();
        let _g2 = backends[1].acquire();
        assert_eq!(lc.select(&backends), Some(0));
    }

    #[test]
    fn test_tie_breaks_by_pool_order() {
        let backends = pool(3);
        let lc = LeastConnections::new();
        assert_eq!(lc.select(&backends), Some(0));
    }

    #[test]
    fn test_skips_unhealthy_even_when_idle() {
        let backends = pool(2);
        backends[0].set_healthy(false);
        let lc = LeastConnections::new();

        // backend 1 is busier but backend 0 is out of rotation
        let _g = backends[1].acquire();
        assert_eq!(lc.select(&backends), Some(1));
    }

    #[test]
    fn test_no_healthy_is_none() {
        let backends = pool(1);
        backends[0].set_healthy(false);
        assert!(LeastConnections::new().select(&backends).is_none());
    }
}
