//! Configuration Module - TOML-based Bot Configuration
//!
//! Loads and validates configuration from `config.toml`. Pool and
//! token contract ids, pool weights and fee, and ladder/swap
//! parameters are all deployment configuration - nothing is hardcoded
//! in the domain layer. The signing credential is the only secret and
//! comes from the environment (see `adapters::gateway::auth`).

pub mod loader;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::domain::asset::{Asset, TradingPair};
use crate::domain::ladder::LadderParams;
use crate::domain::pool::PoolParams;
use crate::error::BotResult;

/// Top-level bot configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the bot begins operation.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Bot identity and metadata.
  pub bot: BotConfig,
  /// Trading account.
  pub account: AccountConfig,
  /// AMM pool contract and pricing constants.
  pub pool: PoolConfig,
  /// Classic assets the ladder trades.
  pub pair: PairConfig,
  /// Ladder shape.
  pub ladder: LadderConfig,
  /// Fill-triggered swap parameters.
  pub swap: SwapConfig,
  /// Order manager timing.
  #[serde(default)]
  pub manager: ManagerConfig,
  /// Price poll and fill stream timing.
  #[serde(default)]
  pub monitor: MonitorConfig,
  /// Ledger gateway endpoint.
  pub gateway: GatewayConfig,
  /// Metrics and health endpoints.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
  /// Human-readable bot name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Trading account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
  /// Public key of the account that owns the ladder.
  pub public_key: String,
}

/// Pool contract configuration.
///
/// Token A is the asset the ladder pays with (quote), token B the
/// asset it buys (base); spot price is A per B.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
  /// Pool contract id.
  pub contract: String,
  /// Token A contract id.
  pub token_a: String,
  /// Token B contract id.
  pub token_b: String,
  /// Pool weight of token A.
  #[serde(default = "default_weight")]
  pub weight_a: Decimal,
  /// Pool weight of token B.
  #[serde(default = "default_weight")]
  pub weight_b: Decimal,
  /// Swap fee in percent (0.3 = 0.3%).
  #[serde(default = "default_swap_fee_percent")]
  pub swap_fee_percent: Decimal,
}

impl PoolConfig {
  pub fn params(&self) -> BotResult<PoolParams> {
    PoolParams::new(self.weight_a, self.weight_b, self.swap_fee_percent)
  }
}

/// Classic asset reference. A code without issuer is the native asset.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
  pub code: String,
  pub issuer: Option<String>,
}

impl AssetConfig {
  pub fn asset(&self) -> Asset {
    match &self.issuer {
      Some(issuer) => Asset::credit(&self.code, issuer),
      None => Asset::Native,
    }
  }
}

/// Trading pair configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PairConfig {
  /// Asset the ladder buys (pool token B).
  pub base: AssetConfig,
  /// Asset the ladder pays with (pool token A).
  pub quote: AssetConfig,
}

impl PairConfig {
  pub fn trading_pair(&self) -> TradingPair {
    TradingPair::new(self.base.asset(), self.quote.asset())
  }
}

/// Ladder configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LadderConfig {
  /// Base-asset size per bucket.
  pub unit_size: Decimal,
  /// Discount step per bucket (0.005 = 0.5%).
  pub bucket_increment: Decimal,
  /// Number of buckets.
  pub bucket_count: u32,
  /// Validity window of ladder transactions (seconds).
  #[serde(default = "default_tx_timeout")]
  pub tx_timeout_secs: u64,
}

impl LadderConfig {
  pub fn params(&self) -> LadderParams {
    LadderParams {
      unit_size: self.unit_size,
      bucket_increment: self.bucket_increment,
      bucket_count: self.bucket_count,
    }
  }
}

/// Swap configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
  /// Slippage tolerance in percent.
  #[serde(default = "default_slippage")]
  pub slippage_percent: Decimal,
  /// Pool index of the input token (the asset the ladder buys).
  #[serde(default = "default_in_index")]
  pub in_index: u32,
  /// Pool index of the output token.
  #[serde(default)]
  pub out_index: u32,
}

/// Order manager timing.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
  /// Cooldown after a fill-triggered swap (milliseconds).
  #[serde(default = "default_cooldown_ms")]
  pub cooldown_ms: u64,
  /// Delay between a swap and the ladder re-placement (milliseconds).
  #[serde(default = "default_settle_delay_ms")]
  pub settle_delay_ms: u64,
  /// Upper bound on shutdown cancellation (milliseconds).
  #[serde(default = "default_shutdown_timeout_ms")]
  pub shutdown_timeout_ms: u64,
}

impl Default for ManagerConfig {
  fn default() -> Self {
    Self {
      cooldown_ms: default_cooldown_ms(),
      settle_delay_ms: default_settle_delay_ms(),
      shutdown_timeout_ms: default_shutdown_timeout_ms(),
    }
  }
}

/// Monitor timing.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
  /// Ledger poll interval (milliseconds).
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,
  /// Delay before resubscribing a dropped operation stream (milliseconds).
  #[serde(default = "default_stream_backoff_ms")]
  pub stream_backoff_ms: u64,
}

impl Default for MonitorConfig {
  fn default() -> Self {
    Self {
      poll_interval_ms: default_poll_interval_ms(),
      stream_backoff_ms: default_stream_backoff_ms(),
    }
  }
}

/// Ledger gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
  /// Gateway base URL.
  pub url: String,
  /// Request timeout (milliseconds).
  #[serde(default = "default_gateway_timeout_ms")]
  pub timeout_ms: u64,
  /// Retries for idempotent requests.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Base retry delay, doubled per attempt (milliseconds).
  #[serde(default = "default_retry_base_delay_ms")]
  pub retry_base_delay_ms: u64,
  /// Outgoing request budget.
  #[serde(default = "default_max_requests_per_second")]
  pub max_requests_per_second: u32,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Serve /metrics, /live and /ready.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Bind address of the metrics server.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_weight() -> Decimal {
  dec!(0.5)
}

fn default_swap_fee_percent() -> Decimal {
  dec!(0.3)
}

fn default_tx_timeout() -> u64 {
  30
}

fn default_slippage() -> Decimal {
  Decimal::ONE
}

fn default_in_index() -> u32 {
  1
}

fn default_cooldown_ms() -> u64 {
  10_000
}

fn default_settle_delay_ms() -> u64 {
  2_000
}

fn default_shutdown_timeout_ms() -> u64 {
  15_000
}

fn default_poll_interval_ms() -> u64 {
  5_000
}

fn default_stream_backoff_ms() -> u64 {
  5_000
}

fn default_gateway_timeout_ms() -> u64 {
  30_000
}

fn default_max_retries() -> u32 {
  3
}

fn default_retry_base_delay_ms() -> u64 {
  200
}

fn default_max_requests_per_second() -> u32 {
  10
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}
