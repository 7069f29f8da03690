//! relayd — a reverse HTTP proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌───────────────────────────────────────────────────┐
//!                  │                      RELAYD                       │
//!                  │                                                   │
//!  Client Request  │  ┌────────────┐  ┌───────┐  ┌─────────┐           │
//!  ────────────────┼─▶│ rate limit │─▶│ cache │─▶│ metrics │──┐        │
//!                  │  └────────────┘  └───────┘  └─────────┘  │        │
//!                  │                                          ▼        │
//!                  │                                   ┌───────────┐   │
//!                  │                                   │ forwarder │   │
//!                  │                                   └─────┬─────┘   │
//!                  │                                         │         │
//!                  │                   ┌──────────┐    ┌─────▼─────┐   │     Backend
//!  Client Response │                   │  health  │───▶│ balancer  │◀──┼──── Pool
//!  ◀───────────────┼───────────────────│  checker │    │  + pool   │   │
//!                  │                   └──────────┘    └───────────┘   │
//!                  │                                                   │
//!                  │  ┌─────────────────────────────────────────────┐  │
//!                  │  │   config · lifecycle · observability        │  │
//!                  │  └─────────────────────────────────────────────┘  │
//!                  └───────────────────────────────────────────────────┘
//! ```
//!
//! Requests pass through the middleware pipeline in a fixed order, the
//! balancer picks a backend using the configured strategy, and the
//! forwarder streams the exchange. A background checker keeps backend
//! health current; shutdown drains in-flight work within a bounded grace.

// Core subsystems
pub mod balance;
pub mod config;
pub mod proxy;

// Traffic management
pub mod health;
pub mod middleware;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use lifecycle::Shutdown;
pub use proxy::ProxyServer;
