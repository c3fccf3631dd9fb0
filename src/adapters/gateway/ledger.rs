//! `LedgerClient` implementation backed by the gateway.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::client::{GatewayClient, Retry, classify};
use super::sse::operation_events;
use super::types::{
  BaseFeeResponse, LatestLedgerResponse, OffersResponse, SimulateRequest, SubmitRequest,
  TransactionResultResponse,
};
use crate::ports::ledger::{
  ContractValue, LedgerAccount, LedgerClient, LedgerError, LedgerOperation, OfferRecord,
  OperationStream, SimulationOutcome, SubmitOutcome, TxTimeout,
};

/// Ledger access through the signing gateway.
pub struct GatewayLedger {
  client: Arc<GatewayClient>,
}

impl GatewayLedger {
  pub fn new(client: Arc<GatewayClient>) -> Self {
    Self { client }
  }
}

#[async_trait]
impl LedgerClient for GatewayLedger {
  async fn latest_ledger(&self) -> Result<u32, LedgerError> {
    let response: LatestLedgerResponse = self.client.get_json("/ledger/latest").await?;
    Ok(response.sequence)
  }

  async fn load_account(&self, public_key: &str) -> Result<LedgerAccount, LedgerError> {
    self.client.get_json(&format!("/accounts/{public_key}")).await
  }

  async fn fetch_base_fee(&self) -> Result<u32, LedgerError> {
    let response: BaseFeeResponse = self.client.get_json("/fee/base").await?;
    Ok(response.base_fee)
  }

  async fn offers_for_account(&self, public_key: &str) -> Result<Vec<OfferRecord>, LedgerError> {
    let response: OffersResponse = self
      .client
      .get_json(&format!("/accounts/{public_key}/offers"))
      .await?;
    Ok(response.records)
  }

  #[instrument(skip(self, account, operations), fields(ops = operations.len(), sequence = account.sequence))]
  async fn build_and_submit(
    &self,
    account: &LedgerAccount,
    operations: &[LedgerOperation],
    fee: u32,
    timeout: TxTimeout,
  ) -> Result<SubmitOutcome, LedgerError> {
    let request = SubmitRequest {
      source_account: &account.account_id,
      sequence: account.sequence,
      fee,
      timeout,
      operations,
    };
    let outcome: SubmitOutcome = self
      .client
      .post_json("/transactions", &request, Retry::Never)
      .await?;
    debug!(id = %outcome.id, successful = outcome.successful, "Transaction submitted");
    Ok(outcome)
  }

  async fn simulate(&self, operations: &[LedgerOperation]) -> Result<SimulationOutcome, LedgerError> {
    self
      .client
      .post_json("/simulate", &SimulateRequest { operations }, Retry::Idempotent)
      .await
  }

  #[instrument(skip(self))]
  async fn stream_operations(
    &self,
    account: &str,
    cursor: &str,
  ) -> Result<OperationStream, LedgerError> {
    let path = format!("/accounts/{account}/operations?cursor={cursor}");
    let response = self.client.open_stream(&path).await?;
    let body = futures_util::TryStreamExt::map_err(response.bytes_stream(), |e| classify(&e));
    Ok(operation_events(body))
  }

  async fn get_transaction_result(&self, id: &str) -> Result<ContractValue, LedgerError> {
    let response: TransactionResultResponse = self
      .client
      .get_json(&format!("/transactions/{id}/result"))
      .await?;
    Ok(response.return_value)
  }
}
