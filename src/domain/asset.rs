//! Classic ledger assets traded by the ladder.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A ledger asset: the native coin or an issued credit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Asset {
    Native,
    Credit { code: String, issuer: String },
}

impl Asset {
    pub fn credit(code: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self::Credit {
            code: code.into(),
            issuer: issuer.into(),
        }
    }

    /// Asset code for log output ("XLM" for native).
    pub fn code(&self) -> &str {
        match self {
            Self::Native => "XLM",
            Self::Credit { code, .. } => code,
        }
    }

    /// Match against a code/issuer pair as reported in account balances.
    pub fn matches(&self, code: &str, issuer: Option<&str>) -> bool {
        match self {
            Self::Native => code == "XLM" && issuer.is_none(),
            Self::Credit {
                code: c,
                issuer: i,
            } => c == code && issuer == Some(i.as_str()),
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Credit { code, issuer } => write!(f, "{code}:{issuer}"),
        }
    }
}

/// The ladder's trading pair: buy `base`, pay with `quote`.
///
/// Prices are quoted as units of `quote` per unit of `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingPair {
    pub base: Asset,
    pub quote: Asset,
}

impl TradingPair {
    pub const fn new(base: Asset, quote: Asset) -> Self {
        Self { base, quote }
    }

    /// True when an offer buys `base` and sells `quote`.
    pub fn is_ladder_side(&self, buying: &Asset, selling: &Asset) -> bool {
        *buying == self.base && *selling == self.quote
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base.code(), self.quote.code())
    }
}
