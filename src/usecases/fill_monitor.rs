//! Fill Stream Monitor - Ladder Fill Detection
//!
//! Subscribes to the account's operation stream and forwards every
//! ladder fill to the order manager. A fill shows up as a
//! `manage_buy_offer` operation on the ladder pair whose remaining
//! amount is zero.
//!
//! The stream is resubscribed after a fixed backoff whenever it fails
//! or ends, resuming after the last seen record.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::config::AppConfig;
use crate::domain::amount::Amount;
use crate::domain::asset::TradingPair;
use crate::error::{BotError, BotResult};
use crate::ports::ledger::{LedgerClient, OperationRecord};

/// Buffer of the fill channel.
pub const FILL_CHANNEL_CAPACITY: usize = 64;

/// Operation type of a ladder order update.
const MANAGE_BUY_OFFER: &str = "manage_buy_offer";

/// A detected ladder fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillEvent {
  pub operation: OperationRecord,
  pub detected_at: DateTime<Utc>,
}

/// Does `op` report a ladder offer that was fully taken?
pub fn is_ladder_fill(pair: &TradingPair, op: &OperationRecord) -> bool {
  if op.kind != MANAGE_BUY_OFFER {
    return false;
  }
  let (Some(buying), Some(selling)) = (&op.buying, &op.selling) else {
    return false;
  };
  if !pair.is_ladder_side(buying, selling) {
    return false;
  }
  op.amount
    .as_deref()
    .and_then(|a| a.parse::<Amount>().ok())
    .is_some_and(Amount::is_zero)
}

/// How a stream session ended without error.
enum SessionEnd {
  Shutdown,
  ManagerGone,
}

/// Watches the operation stream and forwards ladder fills.
pub struct FillMonitor<L: LedgerClient> {
  ledger: Arc<L>,
  account_id: String,
  pair: TradingPair,
  backoff: Duration,
  fill_tx: mpsc::Sender<FillEvent>,
  /// Resume point; `now` until the first record arrives.
  cursor: String,
  metrics: Option<Arc<MetricsRegistry>>,
  health: Option<Arc<HealthState>>,
}

impl<L: LedgerClient> FillMonitor<L> {
  pub fn new(ledger: Arc<L>, config: &AppConfig, fill_tx: mpsc::Sender<FillEvent>) -> Self {
    Self {
      ledger,
      account_id: config.account.public_key.clone(),
      pair: config.pair.trading_pair(),
      backoff: Duration::from_millis(config.monitor.stream_backoff_ms),
      fill_tx,
      cursor: "now".to_string(),
      metrics: None,
      health: None,
    }
  }

  /// Attach metrics and the readiness flag.
  pub fn with_observability(
    mut self,
    metrics: Arc<MetricsRegistry>,
    health: Arc<HealthState>,
  ) -> Self {
    self.metrics = Some(metrics);
    self.health = Some(health);
    self
  }

  /// Current resume cursor.
  pub fn cursor(&self) -> &str {
    &self.cursor
  }

  /// Stream until shutdown, resubscribing after every failure.
  #[instrument(skip(self, shutdown_rx), name = "fill_monitor")]
  pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
    info!(account = %self.account_id, pair = %self.pair, "Starting fill stream monitor");

    loop {
      match self.stream_session(&mut shutdown_rx).await {
        Ok(SessionEnd::Shutdown) => {
          info!("Shutdown signal received, stopping fill monitor");
          break;
        }
        Ok(SessionEnd::ManagerGone) => {
          info!("Fill channel closed, stopping fill monitor");
          break;
        }
        Err(e) => {
          self.set_connected(false);
          warn!(
            error = %e,
            cursor = %self.cursor,
            backoff_ms = self.backoff.as_millis(),
            "Operation stream dropped, resubscribing"
          );
          tokio::select! {
            _ = shutdown_rx.recv() => {
              info!("Shutdown signal received during backoff");
              break;
            }
            () = tokio::time::sleep(self.backoff) => {
              if let Some(metrics) = &self.metrics {
                metrics.stream_reconnects.inc();
              }
            }
          }
        }
      }
    }

    self.set_connected(false);
  }

  /// One subscription: open, forward fills, return on error or shutdown.
  async fn stream_session(
    &mut self,
    shutdown_rx: &mut broadcast::Receiver<()>,
  ) -> BotResult<SessionEnd> {
    let mut stream = self
      .ledger
      .stream_operations(&self.account_id, &self.cursor)
      .await
      .map_err(|e| BotError::Stream(format!("subscribe: {e}")))?;

    self.set_connected(true);
    debug!(cursor = %self.cursor, "Operation stream subscribed");

    loop {
      tokio::select! {
        _ = shutdown_rx.recv() => return Ok(SessionEnd::Shutdown),
        next = stream.next() => match next {
          Some(Ok(record)) => {
            self.cursor.clone_from(&record.paging_token);
            if !is_ladder_fill(&self.pair, &record) {
              continue;
            }
            info!(
              op = %record.id,
              tx = %record.transaction_hash,
              offer = ?record.offer_id,
              "Ladder fill detected"
            );
            let event = FillEvent { operation: record, detected_at: Utc::now() };
            if self.fill_tx.send(event).await.is_err() {
              return Ok(SessionEnd::ManagerGone);
            }
          }
          Some(Err(e)) => return Err(BotError::Stream(e.to_string())),
          None => return Err(BotError::Stream("stream ended".to_string())),
        }
      }
    }
  }

  fn set_connected(&self, connected: bool) {
    if let Some(health) = &self.health {
      health.stream_healthy.store(connected, Ordering::Relaxed);
    }
    if let Some(metrics) = &self.metrics {
      metrics.stream_connected.set(i64::from(connected));
    }
  }
}
