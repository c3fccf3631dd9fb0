//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with the ledger port to implement the
//! bot's reactive loop. Each use case owns one concern; the order
//! manager wires them together.
//!
//! Use cases:
//! - `PriceMonitor`: Ledger-driven pool spot price polling
//! - `LadderBook`: Cancel and place ladder offers
//! - `SwapExecutor`: Slippage-protected swaps
//! - `FillMonitor`: Operation stream fill detection
//! - `OrderManager`: The ladder state machine
//! - `WalletManager`: Pair balance reports

pub mod fill_monitor;
pub mod ladder_book;
pub mod order_manager;
pub mod price_monitor;
pub mod swap_executor;
pub mod wallet_manager;
