//! Domain layer - Core business logic and models.
//!
//! Pure pricing and ladder logic for the AMM ladder bot: fixed-point
//! amounts, pool spot pricing, ladder generation, and order tracking.
//! No I/O here (hexagonal architecture inner ring).

pub mod amount;
pub mod asset;
pub mod ladder;
pub mod order;
pub mod pool;

// Re-export core types for convenience
pub use amount::Amount;
pub use asset::{Asset, TradingPair};
pub use ladder::{LadderParams, OrderBucket, PriceFraction, generate_ladder};
pub use order::{CooldownWindow, LadderState, OrderStatus, PlacedOrder};
pub use pool::{PoolParams, PriceSample};
