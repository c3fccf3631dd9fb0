//! Wallet Manager Use Case - Pair Balance Inspection
//!
//! Reads the trading account's balances for the ladder pair so the
//! bot can report what it starts and stops with. Balances are read
//! straight from the ledger; nothing is cached between reports.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::amount::Amount;
use crate::domain::asset::{Asset, TradingPair};
use crate::error::{BotError, BotResult};
use crate::ports::ledger::LedgerClient;

/// Snapshot of the account at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSnapshot {
  pub account_id: String,
  pub sequence: i64,
  /// Balance of the asset the ladder buys; `None` without a trustline.
  pub base_balance: Option<Amount>,
  /// Balance of the asset the ladder pays with; `None` without a trustline.
  pub quote_balance: Option<Amount>,
  /// Native balance (fees).
  pub native_balance: Option<Amount>,
  pub timestamp: DateTime<Utc>,
}

impl WalletSnapshot {
  /// Whether the account can hold both sides of the pair.
  pub const fn has_trustlines(&self) -> bool {
    self.base_balance.is_some() && self.quote_balance.is_some()
  }
}

/// Reads pair balances for the trading account.
pub struct WalletManager<L: LedgerClient> {
  ledger: Arc<L>,
  account_id: String,
  pair: TradingPair,
}

impl<L: LedgerClient> WalletManager<L> {
  pub fn new(ledger: Arc<L>, account_id: impl Into<String>, pair: TradingPair) -> Self {
    Self {
      ledger,
      account_id: account_id.into(),
      pair,
    }
  }

  /// Load the account and pick out the pair balances.
  pub async fn snapshot(&self) -> BotResult<WalletSnapshot> {
    let account = self
      .ledger
      .load_account(&self.account_id)
      .await
      .map_err(|e| BotError::from_read(e, "load account balances"))?;

    Ok(WalletSnapshot {
      account_id: account.account_id.clone(),
      sequence: account.sequence,
      base_balance: account.balance_of(&self.pair.base),
      quote_balance: account.balance_of(&self.pair.quote),
      native_balance: account.balance_of(&Asset::Native),
      timestamp: Utc::now(),
    })
  }

  /// Log a balance report and return the snapshot.
  pub async fn report(&self, label: &str) -> BotResult<WalletSnapshot> {
    let snapshot = self.snapshot().await?;

    if !snapshot.has_trustlines() {
      warn!(
        account = %snapshot.account_id,
        pair = %self.pair,
        "Account is missing a trustline for the ladder pair"
      );
    }

    info!(
      report = label,
      account = %snapshot.account_id,
      base = %self.pair.base.code(),
      base_balance = %fmt_balance(snapshot.base_balance),
      quote = %self.pair.quote.code(),
      quote_balance = %fmt_balance(snapshot.quote_balance),
      native_balance = %fmt_balance(snapshot.native_balance),
      "Wallet balances"
    );

    Ok(snapshot)
  }
}

fn fmt_balance(balance: Option<Amount>) -> String {
  balance.map_or_else(|| "-".to_string(), |b| b.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_snapshot_trustline_check() {
    let snapshot = WalletSnapshot {
      account_id: "GACCOUNT".into(),
      sequence: 1,
      base_balance: Some(Amount::from_units(5)),
      quote_balance: None,
      native_balance: Some(Amount::from_units(100)),
      timestamp: Utc::now(),
    };
    assert!(!snapshot.has_trustlines());
    assert_eq!(fmt_balance(snapshot.quote_balance), "-");
    assert_eq!(fmt_balance(snapshot.base_balance), "0.0000005");
  }
}
