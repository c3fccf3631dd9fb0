//! Gateway Authentication - HMAC-SHA256 Request Signing
//!
//! Every gateway request carries the account id, a timestamp, and an
//! HMAC-SHA256 signature keyed by the account's signing credential.
//! The credential comes from the `STELLAR_SECRET_KEY` environment
//! variable and never leaves the process.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use base64::Engine;

/// Environment variable holding the signing credential.
pub const SECRET_ENV_VAR: &str = "STELLAR_SECRET_KEY";

/// Length of an encoded secret seed.
const SECRET_LEN: usize = 56;

/// Signing credential for gateway requests.
pub struct GatewayAuth {
    /// Public key of the account the gateway signs for.
    account_id: String,
    /// Secret seed from STELLAR_SECRET_KEY (never sent in headers).
    secret: String,
}

impl std::fmt::Debug for GatewayAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayAuth")
            .field("account_id", &self.account_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl GatewayAuth {
    /// Load the credential from the environment.
    ///
    /// Fails when the variable is unset or does not look like a secret
    /// seed; the process must not start without a usable credential.
    pub fn from_env(account_id: &str) -> Result<Self> {
        let secret = std::env::var(SECRET_ENV_VAR)
            .with_context(|| format!("{SECRET_ENV_VAR} not set"))?;
        Self::new(account_id, secret)
    }

    /// Build from an explicit secret.
    pub fn new(account_id: &str, secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        anyhow::ensure!(
            secret.len() == SECRET_LEN && secret.starts_with('S'),
            "{SECRET_ENV_VAR} is not a valid secret seed"
        );
        anyhow::ensure!(!account_id.is_empty(), "account id must not be empty");

        Ok(Self {
            account_id: account_id.to_string(),
            secret,
        })
    }

    /// Account id sent in the `X-Gateway-Account` header.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Current Unix timestamp in seconds.
    pub fn timestamp() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .to_string()
    }

    /// Sign a request.
    ///
    /// Signature format: base64(HMAC-SHA256(secret, timestamp + method + path + body)).
    pub fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> String {
        let message = format!("{timestamp}{method}{path}{body}");
        let mac = hmac_sha256::HMAC::mac(message.as_bytes(), self.secret.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "SBXXTESTSECRETSEEDXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX";

    #[test]
    fn test_rejects_malformed_secret() {
        assert_eq!(SECRET.len(), SECRET_LEN);
        assert!(GatewayAuth::new("GACCOUNT", "not-a-seed").is_err());
        assert!(GatewayAuth::new("GACCOUNT", SECRET.replacen('S', "X", 1)).is_err());
        assert!(GatewayAuth::new("", SECRET).is_err());
    }

    #[test]
    fn test_signature_is_deterministic_and_body_bound() {
        let auth = GatewayAuth::new("GACCOUNT", SECRET).unwrap();
        let a = auth.sign("1700000000", "POST", "/transactions", "{}");
        let b = auth.sign("1700000000", "POST", "/transactions", "{}");
        let c = auth.sign("1700000000", "POST", "/transactions", "{\"fee\":100}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.contains(SECRET));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let auth = GatewayAuth::new("GACCOUNT", SECRET).unwrap();
        let text = format!("{auth:?}");
        assert!(text.contains("GACCOUNT"));
        assert!(!text.contains(SECRET));
    }
}
