//! Swap Executor - Slippage-protected Pool Swaps
//!
//! Converts filled ladder inventory back into the paired asset:
//! 1. Simulates `estimate_swap` for the expected output
//! 2. Applies the slippage tolerance to get a guaranteed minimum
//! 3. Submits `swap` with that minimum and no validity deadline
//! 4. Reads back the realized output and checks it against the minimum

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::AppConfig;
use crate::domain::amount::Amount;
use crate::error::{BotError, BotResult};
use crate::ports::ledger::{
  ContractValue, LedgerClient, LedgerOperation, SimulationOutcome, TxTimeout,
};

/// Outcome of a completed swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReceipt {
  pub transaction_id: String,
  pub amount_in: Amount,
  pub estimated_out: Amount,
  pub minimum_out: Amount,
  pub amount_out: Amount,
}

/// Executes protected swaps against the pool contract.
pub struct SwapExecutor<L: LedgerClient> {
  ledger: Arc<L>,
  account_id: String,
  pool_contract: String,
  in_index: u32,
  out_index: u32,
  metrics: Option<Arc<MetricsRegistry>>,
}

impl<L: LedgerClient> SwapExecutor<L> {
  pub fn new(ledger: Arc<L>, config: &AppConfig) -> Self {
    Self {
      ledger,
      account_id: config.account.public_key.clone(),
      pool_contract: config.pool.contract.clone(),
      in_index: config.swap.in_index,
      out_index: config.swap.out_index,
      metrics: None,
    }
  }

  /// Attach the metrics registry.
  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Expected output for `amount_in`, from a read-only simulation.
  pub async fn estimate(&self, amount_in: Amount) -> BotResult<Amount> {
    let op = LedgerOperation::invoke(
      self.pool_contract.as_str(),
      "estimate_swap",
      vec![
        ContractValue::U32(self.in_index),
        ContractValue::U32(self.out_index),
        ContractValue::U128(amount_in.units()),
      ],
    );

    let outcome = self
      .ledger
      .simulate(std::slice::from_ref(&op))
      .await
      .map_err(|e| BotError::from_read(e, "estimate_swap"))?;

    match outcome {
      SimulationOutcome::Success { return_value } => return_value
        .as_amount()
        .ok_or_else(|| BotError::Simulation(format!("estimate_swap returned {return_value:?}"))),
      SimulationOutcome::Failed { error } => {
        Err(BotError::Simulation(format!("estimate_swap: {error}")))
      }
    }
  }

  /// Swap `amount_in` with at most `slippage_percent` below the estimate.
  ///
  /// The realized output is never below the returned `minimum_out`;
  /// a venue rejection or a short fill is a `Submission` error.
  #[instrument(skip(self), fields(amount_in = %amount_in, slippage = %slippage_percent))]
  pub async fn execute(&self, amount_in: Amount, slippage_percent: Decimal) -> BotResult<SwapReceipt> {
    if amount_in.is_zero() {
      return Err(BotError::Configuration("swap amount must be positive".to_string()));
    }
    validate_slippage(slippage_percent)?;

    let result = self.submit(amount_in, slippage_percent).await;

    if let Some(metrics) = &self.metrics {
      match &result {
        Ok(receipt) => {
          metrics.swaps.with_label_values(&["ok"]).inc();
          if let Ok(out) = receipt.amount_out.to_decimal() {
            MetricsRegistry::set_decimal(&metrics.last_swap_output, out);
          }
        }
        Err(e) => metrics.swaps.with_label_values(&[e.kind()]).inc(),
      }
    }

    result
  }

  async fn submit(&self, amount_in: Amount, slippage_percent: Decimal) -> BotResult<SwapReceipt> {
    let estimated_out = self.estimate(amount_in).await?;
    let minimum_out = minimum_out(estimated_out, slippage_percent)?;

    let account = self
      .ledger
      .load_account(&self.account_id)
      .await
      .map_err(|e| BotError::from_read(e, "load account for swap"))?;
    let fee = self
      .ledger
      .fetch_base_fee()
      .await
      .map_err(|e| BotError::from_read(e, "base fee for swap"))?;

    let op = LedgerOperation::invoke(
      self.pool_contract.as_str(),
      "swap",
      vec![
        ContractValue::Address(self.account_id.clone()),
        ContractValue::U32(self.in_index),
        ContractValue::U32(self.out_index),
        ContractValue::U128(amount_in.units()),
        ContractValue::U128(minimum_out.units()),
      ],
    );

    let outcome = self
      .ledger
      .build_and_submit(&account, std::slice::from_ref(&op), fee, TxTimeout::Infinite)
      .await
      .map_err(|e| BotError::from_submit(e, "swap"))?;

    if !outcome.successful {
      warn!(
        estimated_out = %estimated_out,
        minimum_out = %minimum_out,
        codes = ?outcome.result_codes,
        "Swap rejected"
      );
      return Err(BotError::Submission {
        context: "swap".to_string(),
        result_codes: outcome.result_codes,
      });
    }

    let returned = self
      .ledger
      .get_transaction_result(&outcome.id)
      .await
      .map_err(|e| BotError::from_submit(e, "swap result"))?;
    let amount_out = returned
      .as_amount()
      .ok_or_else(|| BotError::submission(format!("swap {} returned {returned:?}", outcome.id)))?;

    if amount_out < minimum_out {
      return Err(BotError::submission(format!(
        "swap {} realized {amount_out}, below minimum {minimum_out}",
        outcome.id
      )));
    }

    info!(
      tx = %outcome.id,
      amount_in = %amount_in,
      estimated_out = %estimated_out,
      minimum_out = %minimum_out,
      amount_out = %amount_out,
      "Swap executed"
    );

    Ok(SwapReceipt {
      transaction_id: outcome.id,
      amount_in,
      estimated_out,
      minimum_out,
      amount_out,
    })
  }
}

/// `floor(estimated * (100 - slippage) / 100)`.
pub fn minimum_out(estimated: Amount, slippage_percent: Decimal) -> BotResult<Amount> {
  validate_slippage(slippage_percent)?;
  let estimated = estimated
    .to_decimal()
    .map_err(|e| BotError::Simulation(format!("estimate out of range: {e}")))?;
  let floor = estimated * (Decimal::ONE_HUNDRED - slippage_percent) / Decimal::ONE_HUNDRED;
  Amount::from_decimal_floor(floor)
    .map_err(|e| BotError::Simulation(format!("minimum output: {e}")))
}

fn validate_slippage(slippage_percent: Decimal) -> BotResult<()> {
  if slippage_percent < Decimal::ZERO || slippage_percent >= Decimal::ONE_HUNDRED {
    return Err(BotError::Configuration(format!(
      "slippage must be in [0, 100), got {slippage_percent}"
    )));
  }
  Ok(())
}
