//! Ledger Client Port - Distributed Ledger Interface
//!
//! Defines the trait the core uses to read ledger state, simulate
//! contract calls, submit transactions, and stream account operations.
//! Transaction building, signing, and network transport live behind
//! this boundary; the core passes fully-formed operations and reads
//! back structured results only.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::domain::amount::Amount;
use crate::domain::asset::Asset;
use crate::domain::ladder::PriceFraction;

/// Transport-level failures from the ledger client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
  #[error("ledger transport error: {0}")]
  Transport(String),
  #[error("ledger request timed out: {0}")]
  Timeout(String),
  #[error("failed to decode ledger response: {0}")]
  Decode(String),
}

/// Account state needed to build transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAccount {
  /// Public key of the account.
  pub account_id: String,
  /// Current sequence number.
  pub sequence: i64,
  /// Trustline and native balances.
  #[serde(default)]
  pub balances: Vec<AccountBalance>,
}

impl LedgerAccount {
  /// Advance the local sequence after a transaction was built from it.
  pub fn bump_sequence(&mut self) {
    self.sequence += 1;
  }

  /// Balance held in `asset`, if a trustline exists.
  pub fn balance_of(&self, asset: &Asset) -> Option<Amount> {
    self.balances
      .iter()
      .find(|b| &b.asset == asset)
      .map(|b| b.balance)
  }
}

/// One balance line of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
  pub asset: Asset,
  pub balance: Amount,
}

/// A resting offer owned by the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRecord {
  /// Venue offer id.
  pub id: String,
  pub selling: Asset,
  pub buying: Asset,
  /// Remaining amount as reported by the venue.
  pub amount: Amount,
  /// Price of one unit of `buying` in units of `selling`, as a decimal string.
  pub price: String,
}

/// Typed contract argument / return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContractValue {
  U32(u32),
  I128(#[serde(with = "int_string")] i128),
  U128(#[serde(with = "int_string")] u128),
  Address(String),
  Void,
}

impl ContractValue {
  /// Interpret an integer return value as a ledger amount.
  pub fn as_amount(&self) -> Option<Amount> {
    match self {
      Self::U128(v) => Some(Amount::from_units(*v)),
      Self::I128(v) => Amount::from_signed_units(*v).ok(),
      Self::U32(v) => Some(Amount::from_units(u128::from(*v))),
      Self::Address(_) | Self::Void => None,
    }
  }
}

/// 128-bit integers travel as decimal strings in JSON.
mod int_string {
  use std::fmt::Display;
  use std::str::FromStr;

  use serde::{Deserialize, Deserializer, Serializer, de::Error};

  pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
  }

  pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
  where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
  {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(D::Error::custom)
  }
}

/// Operations the core asks the ledger client to include in a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerOperation {
  /// Create, update, or delete (`buy_amount` = 0) a resting buy offer.
  ManageBuyOffer {
    selling: Asset,
    buying: Asset,
    buy_amount: Amount,
    price: PriceFraction,
    /// 0 creates a new offer.
    offer_id: u64,
  },
  /// Call a contract function.
  InvokeContract {
    contract_id: String,
    function: String,
    args: Vec<ContractValue>,
  },
}

impl LedgerOperation {
  /// Operation that deletes a resting buy offer.
  pub fn delete_buy_offer(selling: Asset, buying: Asset, offer_id: u64) -> Self {
    Self::ManageBuyOffer {
      selling,
      buying,
      buy_amount: Amount::ZERO,
      price: PriceFraction::ONE,
      offer_id,
    }
  }

  pub fn invoke(
    contract_id: impl Into<String>,
    function: impl Into<String>,
    args: Vec<ContractValue>,
  ) -> Self {
    Self::InvokeContract {
      contract_id: contract_id.into(),
      function: function.into(),
      args,
    }
  }
}

/// Validity window of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxTimeout {
  /// Venue must reject the transaction after this many seconds.
  Seconds(u64),
  /// No upper time bound.
  Infinite,
}

/// Venue result codes, reported verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCodes {
  pub transaction: String,
  #[serde(default)]
  pub operations: Vec<String>,
}

impl fmt::Display for ResultCodes {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} [{}]", self.transaction, self.operations.join(", "))
  }
}

/// Structured outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
  pub successful: bool,
  /// Transaction id (hash).
  pub id: String,
  #[serde(default)]
  pub result_codes: Option<ResultCodes>,
}

/// Outcome of a read-only simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SimulationOutcome {
  Success { return_value: ContractValue },
  Failed { error: String },
}

/// One operation record from the account's operation stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
  pub id: String,
  /// Cursor value that resumes the stream after this record.
  pub paging_token: String,
  /// Operation type, e.g. `manage_buy_offer`.
  #[serde(rename = "type")]
  pub kind: String,
  pub transaction_hash: String,
  #[serde(default)]
  pub amount: Option<String>,
  #[serde(default)]
  pub offer_id: Option<String>,
  #[serde(default)]
  pub buying: Option<Asset>,
  #[serde(default)]
  pub selling: Option<Asset>,
}

/// Live operation stream. Ends or yields an error when the subscription drops.
pub type OperationStream =
  Pin<Box<dyn Stream<Item = Result<OperationRecord, LedgerError>> + Send>>;

/// Trait for distributed-ledger access.
///
/// Implementors own transport, signing, and encoding. All methods are
/// suspension points for the calling actor.
#[async_trait]
pub trait LedgerClient: Send + Sync + 'static {
  /// Latest closed ledger sequence.
  async fn latest_ledger(&self) -> Result<u32, LedgerError>;

  /// Load account state (sequence + balances).
  async fn load_account(&self, public_key: &str) -> Result<LedgerAccount, LedgerError>;

  /// Current base fee per operation, in ledger units.
  async fn fetch_base_fee(&self) -> Result<u32, LedgerError>;

  /// Resting offers owned by the account.
  async fn offers_for_account(&self, public_key: &str) -> Result<Vec<OfferRecord>, LedgerError>;

  /// Build, sign, and submit one transaction from `account`.
  ///
  /// A venue rejection is a successful call with `successful == false`.
  async fn build_and_submit(
    &self,
    account: &LedgerAccount,
    operations: &[LedgerOperation],
    fee: u32,
    timeout: TxTimeout,
  ) -> Result<SubmitOutcome, LedgerError>;

  /// Read-only simulation; never mutates ledger state.
  async fn simulate(&self, operations: &[LedgerOperation]) -> Result<SimulationOutcome, LedgerError>;

  /// Subscribe to the account's operations starting after `cursor` (`"now"` = live only).
  async fn stream_operations(
    &self,
    account: &str,
    cursor: &str,
  ) -> Result<OperationStream, LedgerError>;

  /// Decoded return value of a contract-invoking transaction.
  async fn get_transaction_result(&self, id: &str) -> Result<ContractValue, LedgerError>;
}
