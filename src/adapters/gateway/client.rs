//! Gateway HTTP Client - Rate-limited, Signed REST Client
//!
//! Wraps reqwest with a governor rate limiter, HMAC request signing,
//! and retries with exponential backoff for idempotent calls.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::auth::GatewayAuth;
use super::types::GatewayErrorBody;
use crate::config::GatewayConfig;
use crate::ports::ledger::LedgerError;

/// Configuration for the gateway HTTP client.
#[derive(Debug, Clone)]
pub struct GatewayClientConfig {
  /// Base URL of the gateway.
  pub base_url: String,
  /// Request timeout.
  pub timeout: Duration,
  /// Maximum retries on transient errors (idempotent calls only).
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
  /// Outgoing request budget.
  pub requests_per_second: NonZeroU32,
}

impl From<&GatewayConfig> for GatewayClientConfig {
  fn from(config: &GatewayConfig) -> Self {
    Self {
      base_url: config.url.trim_end_matches('/').to_string(),
      timeout: Duration::from_millis(config.timeout_ms),
      max_retries: config.max_retries,
      retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
      requests_per_second: NonZeroU32::new(config.max_requests_per_second)
        .unwrap_or(NonZeroU32::MIN),
    }
  }
}

/// Whether a failed call may be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
  /// Reads and simulations.
  Idempotent,
  /// Transaction submission: a lost response may still have been applied.
  Never,
}

/// Signed HTTP client for the ledger gateway.
pub struct GatewayClient {
  /// Underlying HTTP client (request timeout applied).
  http: Client,
  /// Client for long-lived streams (no total timeout).
  stream_http: Client,
  auth: Arc<GatewayAuth>,
  config: GatewayClientConfig,
  limiter: DefaultDirectRateLimiter,
}

impl GatewayClient {
  /// Create a new gateway client.
  pub fn new(auth: Arc<GatewayAuth>, config: GatewayClientConfig) -> anyhow::Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()?;

    let stream_http = Client::builder()
      .connect_timeout(config.timeout)
      .build()?;

    let limiter = RateLimiter::direct(Quota::per_second(config.requests_per_second));

    Ok(Self {
      http,
      stream_http,
      auth,
      config,
      limiter,
    })
  }

  /// Signed GET, decoded as JSON.
  pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, LedgerError> {
    let url = format!("{}{}", self.config.base_url, path);
    let request = self.http.get(&url);
    let response = self
      .execute(request, "GET", path, String::new(), Retry::Idempotent)
      .await?;
    decode(response).await
  }

  /// Signed POST with a JSON body, decoded as JSON.
  pub async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
    &self,
    path: &str,
    body: &B,
    retry: Retry,
  ) -> Result<T, LedgerError> {
    let body = serde_json::to_string(body).map_err(|e| LedgerError::Decode(e.to_string()))?;
    let url = format!("{}{}", self.config.base_url, path);
    let request = self
      .http
      .post(&url)
      .header("Content-Type", "application/json")
      .body(body.clone());
    let response = self.execute(request, "POST", path, body, retry).await?;
    decode(response).await
  }

  /// Signed GET for a server-sent-event stream. Not retried; the caller resubscribes.
  pub async fn open_stream(&self, path: &str) -> Result<Response, LedgerError> {
    let url = format!("{}{}", self.config.base_url, path);
    let request = self
      .stream_http
      .get(&url)
      .header("Accept", "text/event-stream");
    self
      .execute(request, "GET", path, String::new(), Retry::Never)
      .await
  }

  /// Execute request with signing, rate limiting, and retries.
  async fn execute(
    &self,
    request: RequestBuilder,
    method: &str,
    path: &str,
    body: String,
    retry: Retry,
  ) -> Result<Response, LedgerError> {
    let attempts = match retry {
      Retry::Idempotent => self.config.max_retries,
      Retry::Never => 0,
    };

    let mut last_error = None;

    for attempt in 0..=attempts {
      if attempt > 0 {
        let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis(), path, "Retrying gateway request");
        sleep(delay).await;
      }

      self.limiter.until_ready().await;

      let timestamp = GatewayAuth::timestamp();
      let signature = self.auth.sign(&timestamp, method, path, &body);

      let req = request
        .try_clone()
        .ok_or_else(|| LedgerError::Transport("request body is not cloneable".to_string()))?
        .header("X-Gateway-Account", self.auth.account_id())
        .header("X-Gateway-Timestamp", &timestamp)
        .header("X-Gateway-Signature", signature);

      match req.send().await {
        Ok(response) => match response.status() {
          status if status.is_success() => return Ok(response),
          StatusCode::TOO_MANY_REQUESTS => {
            warn!(path, "Rate limited by gateway, backing off");
            last_error = Some(LedgerError::Transport("rate limited".to_string()));
          }
          status if status.is_server_error() => {
            warn!(status = %status, path, "Gateway server error");
            last_error = Some(LedgerError::Transport(format!("server error: {status}")));
          }
          status => {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GatewayErrorBody>(&text)
              .map_or(text, |b| b.error);
            return Err(LedgerError::Transport(format!("gateway error {status}: {message}")));
          }
        },
        Err(e) => {
          warn!(error = %e, attempt, path, "Gateway request failed");
          last_error = Some(classify(&e));
        }
      }
    }

    Err(last_error.unwrap_or_else(|| LedgerError::Transport("max retries exceeded".to_string())))
  }
}

/// Decode a successful response body.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, LedgerError> {
  let bytes = response.bytes().await.map_err(|e| classify(&e))?;
  serde_json::from_slice(&bytes).map_err(|e| LedgerError::Decode(e.to_string()))
}

/// Map a reqwest failure onto the port's error taxonomy.
pub fn classify(err: &reqwest::Error) -> LedgerError {
  if err.is_timeout() {
    LedgerError::Timeout(err.to_string())
  } else if err.is_decode() {
    LedgerError::Decode(err.to_string())
  } else {
    LedgerError::Transport(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_client_config_from_gateway_section() {
    let section = GatewayConfig {
      url: "http://127.0.0.1:8700/".to_string(),
      timeout_ms: 30_000,
      max_retries: 3,
      retry_base_delay_ms: 200,
      max_requests_per_second: 0,
    };
    let config = GatewayClientConfig::from(&section);
    assert_eq!(config.base_url, "http://127.0.0.1:8700");
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.requests_per_second.get(), 1);
  }
}
