//! Spot Price Monitor - Ledger-driven Pool Price Polling
//!
//! Polls the latest ledger sequence on a fixed interval. When the
//! sequence advances, reads both pool reserves through simulated
//! `balance(pool)` calls, prices them with the pool's weighted
//! constant-product formula, and broadcasts the sample.
//!
//! A failed poll is logged and retried on the next tick; the monitor
//! only stops on the shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::AppConfig;
use crate::domain::amount::Amount;
use crate::domain::pool::{PoolParams, PriceSample};
use crate::error::{BotError, BotResult};
use crate::ports::ledger::{ContractValue, LedgerClient, LedgerOperation, SimulationOutcome};

/// Broadcast buffer for price samples.
pub const PRICE_CHANNEL_CAPACITY: usize = 64;

/// Watches the pool and emits a `PriceSample` per ledger advance.
pub struct PriceMonitor<L: LedgerClient> {
  ledger: Arc<L>,
  pool_contract: String,
  token_a: String,
  token_b: String,
  params: PoolParams,
  poll_interval: Duration,
  price_tx: broadcast::Sender<PriceSample>,
  /// Last successful sample; its sequence gates the next read.
  last: Option<PriceSample>,
  metrics: Option<Arc<MetricsRegistry>>,
}

impl<L: LedgerClient> PriceMonitor<L> {
  /// Create a monitor for the configured pool.
  pub fn new(
    ledger: Arc<L>,
    config: &AppConfig,
    price_tx: broadcast::Sender<PriceSample>,
  ) -> BotResult<Self> {
    Ok(Self {
      ledger,
      pool_contract: config.pool.contract.clone(),
      token_a: config.pool.token_a.clone(),
      token_b: config.pool.token_b.clone(),
      params: config.pool.params()?,
      poll_interval: Duration::from_millis(config.monitor.poll_interval_ms),
      price_tx,
      last: None,
      metrics: None,
    })
  }

  /// Attach the metrics registry.
  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Most recent successful sample.
  pub fn last_sample(&self) -> Option<&PriceSample> {
    self.last.as_ref()
  }

  /// Take one sample if the ledger advanced since the last one.
  ///
  /// Returns `Ok(None)` when the sequence is unchanged. The stored
  /// sample only moves forward on success, so a failed read is
  /// retried at the same sequence on the next call.
  pub async fn sample(&mut self) -> BotResult<Option<PriceSample>> {
    let sequence = self
      .ledger
      .latest_ledger()
      .await
      .map_err(|e| BotError::from_read(e, "latest ledger"))?;

    if self.last.as_ref().is_some_and(|s| s.ledger_sequence == sequence) {
      debug!(sequence, "Ledger unchanged, skipping poll");
      return Ok(None);
    }

    let reserve_a = self.read_reserve(&self.token_a).await?;
    let reserve_b = self.read_reserve(&self.token_b).await?;

    let sample = PriceSample::from_reserves(
      &self.params,
      sequence,
      reserve_a,
      reserve_b,
      self.last.as_ref(),
    )?;

    self.last = Some(sample.clone());
    Ok(Some(sample))
  }

  /// Pool's balance of `token`, via a read-only `balance(pool)` simulation.
  async fn read_reserve(&self, token: &str) -> BotResult<Amount> {
    let op = LedgerOperation::invoke(
      token,
      "balance",
      vec![ContractValue::Address(self.pool_contract.clone())],
    );

    let outcome = self
      .ledger
      .simulate(std::slice::from_ref(&op))
      .await
      .map_err(|e| BotError::from_read(e, "pool balance"))?;

    match outcome {
      SimulationOutcome::Success { return_value } => return_value.as_amount().ok_or_else(|| {
        BotError::Simulation(format!("balance of {token} returned {return_value:?}"))
      }),
      SimulationOutcome::Failed { error } => Err(BotError::Simulation(format!(
        "balance of {token}: {error}"
      ))),
    }
  }

  /// Poll until shutdown, broadcasting each new sample.
  #[instrument(skip(self, shutdown_rx), name = "price_monitor")]
  pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
    info!(
      pool = %self.pool_contract,
      interval_ms = self.poll_interval.as_millis(),
      "Starting spot price monitor"
    );

    let mut ticker = tokio::time::interval(self.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        _ = shutdown_rx.recv() => {
          info!("Shutdown signal received, stopping price monitor");
          return;
        }
        _ = ticker.tick() => {
          match self.sample().await {
            Ok(Some(sample)) => self.publish(sample),
            Ok(None) => {}
            Err(e) => {
              warn!(error = %e, kind = e.kind(), "Price poll failed, retrying next tick");
            }
          }
        }
      }
    }
  }

  fn publish(&self, sample: PriceSample) {
    info!(
      sequence = sample.ledger_sequence,
      reserve_a = %sample.reserve_a,
      reserve_b = %sample.reserve_b,
      spot_price = %sample.display_price(),
      change = ?sample.price_change.map(|c| c.round_dp(7)),
      "Spot price updated"
    );

    if let Some(metrics) = &self.metrics {
      MetricsRegistry::set_decimal(&metrics.spot_price, sample.spot_price);
      metrics.ledger_sequence.set(i64::from(sample.ledger_sequence));
    }

    // No receivers just means the manager has not subscribed yet.
    let _ = self.price_tx.send(sample);
  }
}
