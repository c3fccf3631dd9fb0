//! Ladder Book - Resting Offer Cancellation and Placement
//!
//! Talks to the venue on behalf of the order manager:
//! - Lists the account's resting offers on the ladder pair
//! - Cancels all of them in a single transaction
//! - Submits a generated ladder, one order per transaction
//! - Learns venue offer ids for placed orders
//!
//! Every ladder transaction carries a bounded validity window.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::AppConfig;
use crate::domain::amount::Amount;
use crate::domain::asset::TradingPair;
use crate::domain::ladder::OrderBucket;
use crate::domain::order::{LadderState, PlacedOrder};
use crate::error::{BotError, BotResult};
use crate::ports::ledger::{LedgerClient, LedgerOperation, OfferRecord, TxTimeout};

/// Result of a cancellation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelReport {
  /// Offers removed from the book.
  pub cancelled: usize,
  /// Id of the cancellation transaction, if one was submitted.
  pub transaction_id: Option<String>,
}

/// Result of a placement pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementReport {
  pub placed: usize,
  pub rejected: usize,
}

/// Venue-facing side of the ladder.
pub struct LadderBook<L: LedgerClient> {
  ledger: Arc<L>,
  account_id: String,
  pair: TradingPair,
  tx_timeout: TxTimeout,
  metrics: Option<Arc<MetricsRegistry>>,
}

impl<L: LedgerClient> LadderBook<L> {
  /// Create a ladder book for the configured account and pair.
  pub fn new(ledger: Arc<L>, config: &AppConfig) -> Self {
    Self {
      ledger,
      account_id: config.account.public_key.clone(),
      pair: config.pair.trading_pair(),
      tx_timeout: TxTimeout::Seconds(config.ladder.tx_timeout_secs),
      metrics: None,
    }
  }

  /// Attach the metrics registry.
  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  pub fn pair(&self) -> &TradingPair {
    &self.pair
  }

  /// Resting offers on the ladder side of the pair.
  pub async fn active_offers(&self) -> BotResult<Vec<OfferRecord>> {
    let offers = self
      .ledger
      .offers_for_account(&self.account_id)
      .await
      .map_err(|e| BotError::from_read(e, "list offers"))?;

    Ok(
      offers
        .into_iter()
        .filter(|o| self.pair.is_ladder_side(&o.buying, &o.selling))
        .collect(),
    )
  }

  /// Cancel every resting ladder offer in one transaction.
  ///
  /// Nothing is submitted when the book is already empty. A rejected
  /// cancellation is an error: the caller must not place a new ladder
  /// on top of the old one.
  #[instrument(skip(self))]
  pub async fn cancel_all(&self) -> BotResult<CancelReport> {
    let offers = self.active_offers().await?;
    self.cancel_offers(&offers).await
  }

  /// Cancel `offers` in one transaction.
  pub async fn cancel_offers(&self, offers: &[OfferRecord]) -> BotResult<CancelReport> {
    if offers.is_empty() {
      debug!("No resting ladder offers to cancel");
      return Ok(CancelReport::default());
    }

    let operations = offers
      .iter()
      .map(|offer| {
        let offer_id = offer.id.parse::<u64>().map_err(|e| {
          BotError::submission(format!("cancel offer {}: id is not numeric: {e}", offer.id))
        })?;
        Ok(LedgerOperation::delete_buy_offer(
          self.pair.quote.clone(),
          self.pair.base.clone(),
          offer_id,
        ))
      })
      .collect::<BotResult<Vec<_>>>()?;

    let account = self
      .ledger
      .load_account(&self.account_id)
      .await
      .map_err(|e| BotError::from_read(e, "load account for cancellation"))?;
    let fee = self
      .ledger
      .fetch_base_fee()
      .await
      .map_err(|e| BotError::from_read(e, "base fee for cancellation"))?;

    let outcome = self
      .ledger
      .build_and_submit(&account, &operations, fee, self.tx_timeout)
      .await
      .map_err(|e| BotError::from_submit(e, "cancel ladder"))?;

    if !outcome.successful {
      return Err(BotError::Submission {
        context: format!("cancel {} ladder offers", operations.len()),
        result_codes: outcome.result_codes,
      });
    }

    if let Some(metrics) = &self.metrics {
      metrics.orders_cancelled.inc_by(operations.len() as u64);
    }

    info!(
      cancelled = operations.len(),
      tx = %outcome.id,
      "Ladder offers cancelled"
    );

    Ok(CancelReport {
      cancelled: operations.len(),
      transaction_id: Some(outcome.id),
    })
  }

  /// Submit `buckets` one order per transaction, tracking each accepted order in `state`.
  ///
  /// The base fee is refreshed before every order. A venue rejection
  /// is logged and skipped; a transport failure aborts the pass with
  /// the orders placed so far already tracked.
  #[instrument(skip(self, buckets, state), fields(buckets = buckets.len()))]
  pub async fn place_ladder(
    &self,
    buckets: &[OrderBucket],
    state: &mut LadderState,
  ) -> BotResult<PlacementReport> {
    let mut account = self
      .ledger
      .load_account(&self.account_id)
      .await
      .map_err(|e| BotError::from_read(e, "load account for placement"))?;

    let mut report = PlacementReport::default();

    for bucket in buckets {
      let buy_amount = Amount::from_decimal_floor(bucket.size)
        .map_err(|e| BotError::Configuration(format!("bucket {} size: {e}", bucket.bucket_index)))?;

      let fee = self
        .ledger
        .fetch_base_fee()
        .await
        .map_err(|e| BotError::from_read(e, "base fee"))?;

      let operation = LedgerOperation::ManageBuyOffer {
        selling: self.pair.quote.clone(),
        buying: self.pair.base.clone(),
        buy_amount,
        price: bucket.price_fraction,
        offer_id: 0,
      };

      let context = format!("ladder bucket {}", bucket.bucket_index);
      let outcome = self
        .ledger
        .build_and_submit(&account, std::slice::from_ref(&operation), fee, self.tx_timeout)
        .await
        .map_err(|e| BotError::from_submit(e, &context))?;

      if outcome.successful {
        account.bump_sequence();
        report.placed += 1;
        state.track(PlacedOrder::open(
          outcome.id.clone(),
          bucket.bucket_index,
          bucket.price_fraction.to_decimal(),
          bucket.size,
        ));
        if let Some(metrics) = &self.metrics {
          metrics.orders_placed.inc();
        }
        info!(
          bucket = bucket.bucket_index,
          price = %bucket.price_fraction.to_decimal(),
          size = %bucket.size,
          tx = %outcome.id,
          "Ladder order placed"
        );
      } else {
        report.rejected += 1;
        let codes = outcome
          .result_codes
          .as_ref()
          .map_or_else(|| "none".to_string(), ToString::to_string);
        if let Some(metrics) = &self.metrics {
          let code = outcome
            .result_codes
            .as_ref()
            .map_or("unknown", |c| c.transaction.as_str());
          metrics.orders_rejected.with_label_values(&[code]).inc();
        }
        warn!(
          bucket = bucket.bucket_index,
          price = %bucket.price_fraction.to_decimal(),
          size = %bucket.size,
          result_codes = %codes,
          "Ladder order rejected"
        );
        // The venue may or may not have consumed the sequence; resync.
        account = self
          .ledger
          .load_account(&self.account_id)
          .await
          .map_err(|e| BotError::from_read(e, "reload account after rejection"))?;
      }
    }

    Ok(report)
  }

  /// Attach venue offer ids to tracked orders by matching prices.
  ///
  /// Returns how many orders were matched. Orders without a matching
  /// offer keep `offer_id = None` and are still recognized by their
  /// transaction id.
  pub async fn reconcile_offer_ids(&self, state: &mut LadderState) -> BotResult<usize> {
    let mut offers = self.active_offers().await?;

    let pending: Vec<(String, Decimal)> = state
      .unmatched_orders()
      .map(|o| (o.order_id.clone(), o.price))
      .collect();

    let mut matched = 0;
    for (order_id, price) in pending {
      let position = offers
        .iter()
        .position(|offer| Decimal::from_str(&offer.price).is_ok_and(|p| p == price));
      if let Some(index) = position {
        let offer = offers.swap_remove(index);
        state.attach_offer_id(&order_id, offer.id);
        matched += 1;
      }
    }

    debug!(matched, "Reconciled ladder offer ids");
    Ok(matched)
  }
}
