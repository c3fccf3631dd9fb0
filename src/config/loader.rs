//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    pool = %config.pool.contract,
    pair = %config.pair.trading_pair(),
    buckets = config.ladder.bucket_count,
    increment = %config.ladder.bucket_increment,
    unit_size = %config.ladder.unit_size,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty contract ids and account key
/// - Valid pool weights and fee
/// - A ladder that yields positive prices
/// - Slippage in [0, 100) and distinct pool indices
/// - Non-zero timing values
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.account.public_key.is_empty(),
    "account.public_key must not be empty"
  );

  // Pool validation
  anyhow::ensure!(!config.pool.contract.is_empty(), "pool.contract must not be empty");
  anyhow::ensure!(!config.pool.token_a.is_empty(), "pool.token_a must not be empty");
  anyhow::ensure!(!config.pool.token_b.is_empty(), "pool.token_b must not be empty");
  config.pool.params()?;

  // Pair validation
  let pair = config.pair.trading_pair();
  anyhow::ensure!(
    pair.base != pair.quote,
    "pair.base and pair.quote must differ, both are {}",
    pair.base
  );

  // Ladder validation
  config.ladder.params().validate()?;
  anyhow::ensure!(
    config.ladder.tx_timeout_secs > 0,
    "ladder.tx_timeout_secs must be positive"
  );

  // Swap validation
  anyhow::ensure!(
    config.swap.slippage_percent >= Decimal::ZERO
      && config.swap.slippage_percent < Decimal::ONE_HUNDRED,
    "swap.slippage_percent must be in [0, 100), got {}",
    config.swap.slippage_percent
  );
  anyhow::ensure!(
    config.swap.in_index != config.swap.out_index,
    "swap.in_index and swap.out_index must differ"
  );

  // Timing validation
  anyhow::ensure!(
    config.monitor.poll_interval_ms > 0,
    "monitor.poll_interval_ms must be positive"
  );
  anyhow::ensure!(
    config.monitor.stream_backoff_ms > 0,
    "monitor.stream_backoff_ms must be positive"
  );
  anyhow::ensure!(
    config.manager.shutdown_timeout_ms > 0,
    "manager.shutdown_timeout_ms must be positive"
  );

  // Gateway validation
  anyhow::ensure!(!config.gateway.url.is_empty(), "gateway.url must not be empty");
  anyhow::ensure!(
    config.gateway.max_requests_per_second > 0,
    "gateway.max_requests_per_second must be positive"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  const SAMPLE: &str = r#"
[bot]
name = "ladder-test"

[account]
public_key = "GACCOUNT"

[pool]
contract = "CPOOL"
token_a = "CTOKENA"
token_b = "CTOKENB"

[pair.base]
code = "BLND"
issuer = "GBLNDISSUER"

[pair.quote]
code = "AQUA"
issuer = "GAQUAISSUER"

[ladder]
unit_size = "0.05"
bucket_increment = "0.005"
bucket_count = 10

[swap]
slippage_percent = "1"

[gateway]
url = "http://127.0.0.1:8700"
"#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_sample_config_with_defaults() {
    let config = parse_config(SAMPLE).unwrap();
    assert_eq!(config.pool.weight_a, dec!(0.5));
    assert_eq!(config.pool.params().unwrap().swap_fee, dec!(0.003));
    assert_eq!(config.ladder.tx_timeout_secs, 30);
    assert_eq!(config.swap.in_index, 1);
    assert_eq!(config.swap.out_index, 0);
    assert_eq!(config.manager.cooldown_ms, 10_000);
    assert_eq!(config.manager.settle_delay_ms, 2_000);
    assert_eq!(config.monitor.poll_interval_ms, 5_000);
    assert_eq!(config.monitor.stream_backoff_ms, 5_000);
    assert!(config.metrics.enabled);
  }

  #[test]
  fn test_example_config_is_valid() {
    let config = parse_config(include_str!("../../config.example.toml")).unwrap();
    assert_eq!(config.ladder.bucket_count, 10);
    assert_eq!(config.swap.slippage_percent, dec!(1));
    assert_eq!(config.pair.trading_pair().base.code(), "BLND");
  }

  #[test]
  fn test_rejects_invalid_ladder() {
    let broken = SAMPLE.replace("bucket_count = 10", "bucket_count = 0");
    assert!(parse_config(&broken).is_err());

    let broken = SAMPLE.replace("bucket_increment = \"0.005\"", "bucket_increment = \"-0.005\"");
    assert!(parse_config(&broken).is_err());
  }

  #[test]
  fn test_rejects_slippage_out_of_range() {
    let broken = SAMPLE.replace("slippage_percent = \"1\"", "slippage_percent = \"100\"");
    assert!(parse_config(&broken).is_err());
  }
}
