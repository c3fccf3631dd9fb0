//! Ledger Gateway Adapter
//!
//! Implements the `LedgerClient` port against the ledger gateway, the
//! external service that builds, signs, and submits transactions and
//! relays account operation streams.
//!
//! Sub-modules:
//! - `auth`: HMAC-SHA256 request signing
//! - `client`: HTTP client with rate limiting and retries
//! - `ledger`: the port implementation
//! - `sse`: server-sent-event decoding for the operation stream
//! - `types`: request/response envelopes

pub mod auth;
pub mod client;
pub mod ledger;
pub mod sse;
pub mod types;

pub use auth::GatewayAuth;
pub use client::{GatewayClient, GatewayClientConfig};
pub use ledger::GatewayLedger;
