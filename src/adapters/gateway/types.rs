//! Gateway Request/Response Types
//!
//! JSON bodies exchanged with the ledger gateway. Domain records
//! (`LedgerAccount`, `OfferRecord`, `OperationRecord`, ...) are sent
//! as-is; these types only cover the envelopes around them.

use serde::{Deserialize, Serialize};

use crate::ports::ledger::{ContractValue, LedgerOperation, OfferRecord, TxTimeout};

/// `GET /ledger/latest`
#[derive(Debug, Clone, Deserialize)]
pub struct LatestLedgerResponse {
  pub sequence: u32,
}

/// `GET /fee/base`
#[derive(Debug, Clone, Deserialize)]
pub struct BaseFeeResponse {
  pub base_fee: u32,
}

/// `GET /accounts/{id}/offers`
#[derive(Debug, Clone, Deserialize)]
pub struct OffersResponse {
  #[serde(default)]
  pub records: Vec<OfferRecord>,
}

/// `POST /transactions`
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest<'a> {
  /// Source account id.
  pub source_account: &'a str,
  /// Sequence number the transaction is built from.
  pub sequence: i64,
  /// Fee per operation.
  pub fee: u32,
  pub timeout: TxTimeout,
  pub operations: &'a [LedgerOperation],
}

/// `POST /simulate`
#[derive(Debug, Clone, Serialize)]
pub struct SimulateRequest<'a> {
  pub operations: &'a [LedgerOperation],
}

/// `GET /transactions/{id}/result`
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResultResponse {
  pub return_value: ContractValue,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayErrorBody {
  pub error: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::amount::Amount;
  use crate::domain::asset::Asset;
  use crate::domain::ladder::PriceFraction;

  #[test]
  fn test_submit_request_shape() {
    let ops = vec![LedgerOperation::ManageBuyOffer {
      selling: Asset::credit("AQUA", "GAQUA"),
      buying: Asset::credit("BLND", "GBLND"),
      buy_amount: "0.05".parse::<Amount>().unwrap(),
      price: PriceFraction {
        numerator: 14_925_000,
        denominator: 10_000_000,
      },
      offer_id: 0,
    }];
    let request = SubmitRequest {
      source_account: "GACCOUNT",
      sequence: 42,
      fee: 100,
      timeout: TxTimeout::Seconds(30),
      operations: &ops,
    };

    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["timeout"]["seconds"], 30);
    assert_eq!(json["operations"][0]["type"], "manage_buy_offer");
    assert_eq!(json["operations"][0]["buy_amount"], "0.0500000");
    assert_eq!(json["operations"][0]["price"]["n"], 14_925_000);
  }

  #[test]
  fn test_transaction_result_decodes_u128_string() {
    let body = r#"{"return_value":{"type":"u128","value":"4950000"}}"#;
    let parsed: TransactionResultResponse = serde_json::from_str(body).unwrap();
    assert_eq!(parsed.return_value, ContractValue::U128(4_950_000));
  }
}
