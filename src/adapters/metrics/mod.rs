//! Metrics and Monitoring Adapters
//!
//! Prometheus counters for ladder placement, swaps, and manager events,
//! plus /live, /ready and /metrics endpoints via axum 0.7.

pub mod health;
pub mod prometheus;

pub use health::{HealthServer, HealthState};
pub use prometheus::MetricsRegistry;
