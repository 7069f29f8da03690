//! Backend health monitoring.
//!
//! The checker probes every backend on a steady ticker and publishes
//! results to the balancer, which is the single authority the selection
//! strategies consult.

pub mod checker;

pub use checker::HealthChecker;
