//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies. Each sub-module groups adapters by
//! infrastructure concern.
//!
//! Adapter categories:
//! - `gateway`: Ledger gateway REST + SSE client and request signing
//! - `metrics`: Prometheus metrics export and health checks

pub mod gateway;
pub mod metrics;
