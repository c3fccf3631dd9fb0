//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `LedgerClient`: ledger reads, simulation, submission, and the
//!   account operation stream

pub mod ledger;
