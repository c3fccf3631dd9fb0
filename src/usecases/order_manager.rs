//! Order Manager - Ladder State Machine
//!
//! Single actor that owns the ladder, the cooldown window, and the
//! latest spot price. Runs the cycle:
//! - Price change -> cancel the live ladder -> place a fresh one
//! - Fill -> protected swap -> cooldown -> scheduled re-placement
//! - Shutdown -> bounded best-effort cancellation
//!
//! Events are handled one at a time. Price events that queue up while
//! a replace or swap is in flight are coalesced: they still update the
//! spot price but never start a second cycle.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{Semaphore, broadcast, mpsc};
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::config::AppConfig;
use crate::domain::amount::Amount;
use crate::domain::ladder::{LadderParams, generate_ladder};
use crate::domain::order::{CooldownWindow, LadderState};
use crate::domain::pool::PriceSample;
use crate::error::{BotError, BotResult};
use crate::ports::ledger::{LedgerClient, OfferRecord};

use super::fill_monitor::FillEvent;
use super::ladder_book::{LadderBook, PlacementReport};
use super::swap_executor::SwapExecutor;

/// Cancellation transaction ids remembered for self-cancellation filtering.
const OWN_CANCELLATION_MEMORY: usize = 32;

/// Offer ids remembered from submitted cancellations, landed or not.
const CANCELLED_OFFER_MEMORY: usize = 256;

/// Manager lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
  Idle,
  Replacing,
  AwaitingFill,
  Swapping,
  Cooldown,
  ShuttingDown,
}

impl ManagerState {
  /// Numeric value for the state gauge.
  pub const fn as_gauge(self) -> i64 {
    match self {
      Self::Idle => 0,
      Self::Replacing => 1,
      Self::AwaitingFill => 2,
      Self::Swapping => 3,
      Self::Cooldown => 4,
      Self::ShuttingDown => 5,
    }
  }

  /// A replace or swap is in flight.
  pub const fn is_busy(self) -> bool {
    matches!(self, Self::Replacing | Self::Swapping)
  }
}

/// Inputs to the state machine.
#[derive(Debug, Clone)]
pub enum ManagerEvent {
  PriceChanged(PriceSample),
  FillDetected(FillEvent),
  /// Re-placement scheduled after a successful swap.
  SettleElapsed,
  CooldownExpired,
  Shutdown,
}

impl ManagerEvent {
  pub const fn label(&self) -> &'static str {
    match self {
      Self::PriceChanged(_) => "price_changed",
      Self::FillDetected(_) => "fill_detected",
      Self::SettleElapsed => "settle_elapsed",
      Self::CooldownExpired => "cooldown_expired",
      Self::Shutdown => "shutdown",
    }
  }
}

/// What the manager did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
  Processed,
  Coalesced,
  DroppedCooldown,
  DroppedNoPrice,
  DroppedSelfCancellation,
  DroppedShuttingDown,
  Failed,
}

impl EventOutcome {
  pub const fn label(self) -> &'static str {
    match self {
      Self::Processed => "processed",
      Self::Coalesced => "coalesced",
      Self::DroppedCooldown => "dropped_cooldown",
      Self::DroppedNoPrice => "dropped_no_price",
      Self::DroppedSelfCancellation => "dropped_self_cancellation",
      Self::DroppedShuttingDown => "dropped_shutting_down",
      Self::Failed => "failed",
    }
  }
}

/// Timing and sizing the manager needs from configuration.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
  pub ladder: LadderParams,
  /// Fallback swap size when a fill references no tracked order.
  pub unit_amount: Amount,
  pub slippage_percent: Decimal,
  pub cooldown: Duration,
  pub settle_delay: Duration,
  pub shutdown_timeout: Duration,
}

impl ManagerSettings {
  pub fn from_config(config: &AppConfig) -> BotResult<Self> {
    let ladder = config.ladder.params();
    ladder.validate()?;
    Ok(Self {
      unit_amount: ladder.unit_amount()?,
      ladder,
      slippage_percent: config.swap.slippage_percent,
      cooldown: Duration::from_millis(config.manager.cooldown_ms),
      settle_delay: Duration::from_millis(config.manager.settle_delay_ms),
      shutdown_timeout: Duration::from_millis(config.manager.shutdown_timeout_ms),
    })
  }
}

/// The ladder state machine.
pub struct OrderManager<L: LedgerClient> {
  book: LadderBook<L>,
  swaps: SwapExecutor<L>,
  settings: ManagerSettings,
  state: ManagerState,
  /// Latest known spot price.
  spot: Option<PriceSample>,
  ladder: LadderState,
  cooldown: Option<CooldownWindow>,
  /// Single-slot guard around the replace cycle.
  replace_guard: Arc<Semaphore>,
  /// Recent cancellation transactions; their zero-amount operations are not fills.
  own_cancellations: VecDeque<String>,
  /// Offer ids we asked the venue to delete. Outlives a lost submit response.
  cancelled_offers: VecDeque<String>,
  /// Set when the current event entered `Replacing` or `Swapping`.
  cycle_started: bool,
  price_rx: broadcast::Receiver<PriceSample>,
  prices_open: bool,
  fill_rx: mpsc::Receiver<FillEvent>,
  fills_open: bool,
  timer_tx: mpsc::UnboundedSender<ManagerEvent>,
  timer_rx: mpsc::UnboundedReceiver<ManagerEvent>,
  metrics: Option<Arc<MetricsRegistry>>,
  health: Option<Arc<HealthState>>,
}

impl<L: LedgerClient> OrderManager<L> {
  /// Create a manager wired to the price broadcast and the fill channel.
  pub fn new(
    ledger: Arc<L>,
    config: &AppConfig,
    price_rx: broadcast::Receiver<PriceSample>,
    fill_rx: mpsc::Receiver<FillEvent>,
  ) -> BotResult<Self> {
    let (timer_tx, timer_rx) = mpsc::unbounded_channel();

    Ok(Self {
      book: LadderBook::new(Arc::clone(&ledger), config),
      swaps: SwapExecutor::new(ledger, config),
      settings: ManagerSettings::from_config(config)?,
      state: ManagerState::Idle,
      spot: None,
      ladder: LadderState::default(),
      cooldown: None,
      replace_guard: Arc::new(Semaphore::new(1)),
      own_cancellations: VecDeque::with_capacity(OWN_CANCELLATION_MEMORY),
      cancelled_offers: VecDeque::with_capacity(CANCELLED_OFFER_MEMORY),
      cycle_started: false,
      price_rx,
      prices_open: true,
      fill_rx,
      fills_open: true,
      timer_tx,
      timer_rx,
      metrics: None,
      health: None,
    })
  }

  /// Attach metrics and the readiness flag (also to the book and the executor).
  pub fn with_observability(
    mut self,
    metrics: Arc<MetricsRegistry>,
    health: Arc<HealthState>,
  ) -> Self {
    self.book = self.book.with_metrics(Arc::clone(&metrics));
    self.swaps = self.swaps.with_metrics(Arc::clone(&metrics));
    self.metrics = Some(metrics);
    self.health = Some(health);
    self
  }

  pub const fn state(&self) -> ManagerState {
    self.state
  }

  pub const fn spot(&self) -> Option<&PriceSample> {
    self.spot.as_ref()
  }

  pub const fn ladder(&self) -> &LadderState {
    &self.ladder
  }

  pub fn cooldown_active(&self) -> bool {
    self.cooldown.as_ref().is_some_and(CooldownWindow::is_active)
  }

  /// Event loop. Returns after the shutdown sequence has run.
  #[instrument(skip(self, shutdown_rx), name = "order_manager")]
  pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
    info!(
      buckets = self.settings.ladder.bucket_count,
      increment = %self.settings.ladder.bucket_increment,
      unit_size = %self.settings.ladder.unit_size,
      cooldown_ms = self.settings.cooldown.as_millis(),
      "Starting order manager"
    );

    loop {
      let event = tokio::select! {
        biased;
        _ = shutdown_rx.recv() => ManagerEvent::Shutdown,
        Some(event) = self.timer_rx.recv() => event,
        fill = self.fill_rx.recv(), if self.fills_open => match fill {
          Some(fill) => ManagerEvent::FillDetected(fill),
          None => {
            warn!("Fill channel closed");
            self.fills_open = false;
            continue;
          }
        },
        price = self.price_rx.recv(), if self.prices_open => match price {
          Ok(sample) => ManagerEvent::PriceChanged(sample),
          Err(RecvError::Lagged(skipped)) => {
            warn!(skipped, "Price events lagged");
            continue;
          }
          Err(RecvError::Closed) => {
            warn!("Price channel closed");
            self.prices_open = false;
            continue;
          }
        },
      };

      self.dispatch(event).await;

      if self.state == ManagerState::ShuttingDown {
        break;
      }
    }

    info!("Order manager stopped");
  }

  /// Handle one event and record its outcome.
  ///
  /// Price events that queued while a replace or swap ran are absorbed
  /// afterwards. An event that returned without starting one leaves the
  /// queue alone so the next price still triggers a replace.
  pub async fn dispatch(&mut self, event: ManagerEvent) -> EventOutcome {
    let label = event.label();
    self.cycle_started = false;

    let outcome = self.handle_event(event).await;
    self.record(label, outcome);

    if self.cycle_started && self.state != ManagerState::ShuttingDown {
      self.coalesce_pending_prices();
    }
    outcome
  }

  /// Apply one event to the state machine.
  pub async fn handle_event(&mut self, event: ManagerEvent) -> EventOutcome {
    if self.state == ManagerState::ShuttingDown {
      return EventOutcome::DroppedShuttingDown;
    }

    match event {
      ManagerEvent::PriceChanged(sample) => {
        self.spot = Some(sample);
        if self.state.is_busy() {
          return EventOutcome::Coalesced;
        }
        self.replace_ladder().await
      }
      ManagerEvent::FillDetected(fill) => self.on_fill(fill).await,
      ManagerEvent::SettleElapsed => {
        if self.state.is_busy() {
          return EventOutcome::Coalesced;
        }
        self.replace_ladder().await
      }
      ManagerEvent::CooldownExpired => {
        if self.state == ManagerState::Cooldown && !self.cooldown_active() {
          self.set_state(ManagerState::Idle);
        }
        EventOutcome::Processed
      }
      ManagerEvent::Shutdown => {
        self.shutdown().await;
        EventOutcome::Processed
      }
    }
  }

  /// Cancel the live ladder and place a new one at the latest spot.
  async fn replace_ladder(&mut self) -> EventOutcome {
    let Some(spot) = self.spot.as_ref().map(|s| s.spot_price) else {
      debug!("No spot price known yet, skipping ladder placement");
      return EventOutcome::DroppedNoPrice;
    };

    let Ok(_permit) = Arc::clone(&self.replace_guard).try_acquire_owned() else {
      return EventOutcome::Coalesced;
    };

    self.set_state(ManagerState::Replacing);
    let cycle = Uuid::new_v4();
    let started = Instant::now();

    let result = self
      .replace_cycle(spot)
      .instrument(info_span!("replace_cycle", %cycle, %spot))
      .await;

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let resting = if self.cooldown_active() {
      ManagerState::Cooldown
    } else {
      ManagerState::AwaitingFill
    };

    match result {
      Ok(report) => {
        self.set_state(resting);
        if let Some(metrics) = &self.metrics {
          metrics.replace_cycles.with_label_values(&["ok"]).inc();
          metrics.replace_latency_ms.observe(elapsed_ms);
        }
        info!(
          %cycle,
          placed = report.placed,
          rejected = report.rejected,
          elapsed_ms,
          "Ladder replaced"
        );
        EventOutcome::Processed
      }
      Err(e) => {
        self.set_state(if resting == ManagerState::Cooldown {
          ManagerState::Cooldown
        } else {
          ManagerState::Idle
        });
        self.record_error(&e);
        warn!(%cycle, error = %e, kind = e.kind(), "Ladder replace cycle failed");
        EventOutcome::Failed
      }
    }
  }

  async fn replace_cycle(&mut self, spot: Decimal) -> BotResult<PlacementReport> {
    let buckets = generate_ladder(spot, &self.settings.ladder)?;

    let offers = self.book.active_offers().await?;
    self.remember_cancelled_offers(&offers);
    let cancelled = self.book.cancel_offers(&offers).await?;
    if let Some(tx) = cancelled.transaction_id {
      self.remember_cancellation(tx);
    }
    self.ladder.cancel_all();

    let report = self.book.place_ladder(&buckets, &mut self.ladder).await?;

    if report.placed > 0 {
      if let Err(e) = self.book.reconcile_offer_ids(&mut self.ladder).await {
        debug!(error = %e, "Offer id reconciliation failed; fills match by transaction");
      }
    }
    Ok(report)
  }

  /// Swap the filled inventory, then cool down.
  async fn on_fill(&mut self, fill: FillEvent) -> EventOutcome {
    let op = &fill.operation;

    let cancelled_offer = op
      .offer_id
      .as_deref()
      .is_some_and(|id| self.cancelled_offers.iter().any(|o| o == id));
    if cancelled_offer || self.own_cancellations.iter().any(|tx| *tx == op.transaction_hash) {
      debug!(tx = %op.transaction_hash, offer = ?op.offer_id, "Ignoring own cancellation");
      return EventOutcome::DroppedSelfCancellation;
    }

    if let Some(window) = &self.cooldown {
      if window.is_active() {
        info!(
          tx = %op.transaction_hash,
          remaining_ms = window.remaining().as_millis(),
          "Fill dropped during cooldown"
        );
        return EventOutcome::DroppedCooldown;
      }
    }

    if self.state.is_busy() {
      return EventOutcome::Coalesced;
    }

    self.set_state(ManagerState::Swapping);
    let window = CooldownWindow::start(self.settings.cooldown);
    self.cooldown = Some(window);

    let filled = self
      .ladder
      .mark_filled(op.offer_id.as_deref(), Some(op.transaction_hash.as_str()));
    let amount = match &filled {
      Some(order) => Amount::from_decimal_floor(order.size).unwrap_or(self.settings.unit_amount),
      None => self.settings.unit_amount,
    };

    info!(
      tx = %op.transaction_hash,
      offer = ?op.offer_id,
      bucket = ?filled.as_ref().map(|o| o.bucket_index),
      amount = %amount,
      "Processing ladder fill"
    );

    let result = self.swaps.execute(amount, self.settings.slippage_percent).await;

    self.set_state(ManagerState::Cooldown);
    self.schedule(ManagerEvent::CooldownExpired, window.remaining());

    match result {
      Ok(receipt) => {
        info!(
          tx = %receipt.transaction_id,
          amount_out = %receipt.amount_out,
          minimum_out = %receipt.minimum_out,
          settle_ms = self.settings.settle_delay.as_millis(),
          "Fill swapped, ladder re-placement scheduled"
        );
        self.schedule(ManagerEvent::SettleElapsed, self.settings.settle_delay);
        EventOutcome::Processed
      }
      Err(e) => {
        self.record_error(&e);
        warn!(error = %e, kind = e.kind(), amount = %amount, "Fill swap failed");
        EventOutcome::Failed
      }
    }
  }

  /// Best-effort cancellation bounded by the shutdown timeout.
  #[instrument(skip(self))]
  pub async fn shutdown(&mut self) {
    self.set_state(ManagerState::ShuttingDown);
    if let Some(health) = &self.health {
      health.manager_running.store(false, Ordering::Relaxed);
    }

    info!(
      open_orders = self.ladder.open_count(),
      timeout_ms = self.settings.shutdown_timeout.as_millis(),
      "Shutting down, cancelling ladder"
    );

    let book = &self.book;
    let cancel = async {
      let report = book.cancel_all().await?;
      let remaining = book.active_offers().await?;
      Ok::<_, BotError>((report, remaining.len()))
    };

    match tokio::time::timeout(self.settings.shutdown_timeout, cancel).await {
      Ok(Ok((report, remaining))) => {
        self.ladder.cancel_all();
        info!(cancelled = report.cancelled, remaining, "Ladder cancelled on shutdown");
      }
      Ok(Err(e)) => warn!(error = %e, "Shutdown cancellation failed"),
      Err(_) => warn!(
        timeout_ms = self.settings.shutdown_timeout.as_millis(),
        "Shutdown cancellation timed out"
      ),
    }

    self.prices_open = false;
    self.fill_rx.close();
    self.fills_open = false;
  }

  /// Absorb price events that queued while a handler was running.
  fn coalesce_pending_prices(&mut self) {
    if !self.prices_open {
      return;
    }
    loop {
      match self.price_rx.try_recv() {
        Ok(sample) => {
          debug!(
            sequence = sample.ledger_sequence,
            spot_price = %sample.display_price(),
            "Coalesced price event"
          );
          self.spot = Some(sample);
          self.record("price_changed", EventOutcome::Coalesced);
        }
        Err(TryRecvError::Lagged(skipped)) => {
          warn!(skipped, "Price events lagged while busy");
        }
        Err(TryRecvError::Empty | TryRecvError::Closed) => break,
      }
    }
  }

  fn schedule(&self, event: ManagerEvent, delay: Duration) {
    let tx = self.timer_tx.clone();
    tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let _ = tx.send(event);
    });
  }

  fn remember_cancellation(&mut self, tx: String) {
    if self.own_cancellations.len() == OWN_CANCELLATION_MEMORY {
      self.own_cancellations.pop_front();
    }
    self.own_cancellations.push_back(tx);
  }

  fn remember_cancelled_offers(&mut self, offers: &[OfferRecord]) {
    for offer in offers {
      if self.cancelled_offers.len() == CANCELLED_OFFER_MEMORY {
        self.cancelled_offers.pop_front();
      }
      self.cancelled_offers.push_back(offer.id.clone());
    }
  }

  fn set_state(&mut self, next: ManagerState) {
    if next.is_busy() {
      self.cycle_started = true;
    }
    if self.state != next {
      debug!(from = ?self.state, to = ?next, "Manager state change");
      self.state = next;
    }
    if let Some(metrics) = &self.metrics {
      metrics.manager_state.set(next.as_gauge());
    }
  }

  fn record(&self, event: &str, outcome: EventOutcome) {
    debug!(event, outcome = outcome.label(), state = ?self.state, "Manager event handled");
    if let Some(metrics) = &self.metrics {
      metrics.record_event(event, outcome.label());
    }
  }

  fn record_error(&self, err: &BotError) {
    if let Some(metrics) = &self.metrics {
      metrics.errors.with_label_values(&[err.kind()]).inc();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_busy_states() {
    assert!(ManagerState::Replacing.is_busy());
    assert!(ManagerState::Swapping.is_busy());
    assert!(!ManagerState::Cooldown.is_busy());
    assert!(!ManagerState::AwaitingFill.is_busy());
  }

  #[test]
  fn test_outcome_labels_are_distinct() {
    let outcomes = [
      EventOutcome::Processed,
      EventOutcome::Coalesced,
      EventOutcome::DroppedCooldown,
      EventOutcome::DroppedNoPrice,
      EventOutcome::DroppedSelfCancellation,
      EventOutcome::DroppedShuttingDown,
      EventOutcome::Failed,
    ];
    let mut labels: Vec<_> = outcomes.iter().map(|o| o.label()).collect();
    labels.sort_unstable();
    labels.dedup();
    assert_eq!(labels.len(), outcomes.len());
  }
}
