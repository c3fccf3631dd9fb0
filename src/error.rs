//! Bot error taxonomy.
//!
//! `Configuration` is fatal at startup. Every other variant is
//! recoverable at the cycle level: the current replace/swap attempt is
//! abandoned, the error is logged, and the manager waits for the next
//! trigger.

use thiserror::Error;

use crate::ports::ledger::{LedgerError, ResultCodes};

#[derive(Debug, Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("simulation failed: {0}")]
    Simulation(String),

    #[error("transaction failed ({context}): {}", display_codes(.result_codes))]
    Submission {
        context: String,
        result_codes: Option<ResultCodes>,
    },

    #[error("operation stream error: {0}")]
    Stream(String),

    #[error("network timeout during {origin}")]
    Timeout { origin: String },

    #[error("invalid pool state: {0}")]
    InvalidPool(String),
}

pub type BotResult<T> = Result<T, BotError>;

fn display_codes(codes: &Option<ResultCodes>) -> String {
    codes
        .as_ref()
        .map_or_else(|| "no result codes".to_string(), ToString::to_string)
}

impl BotError {
    /// Submission failure without venue result codes.
    pub fn submission(context: impl Into<String>) -> Self {
        Self::Submission {
            context: context.into(),
            result_codes: None,
        }
    }

    /// Map a ledger transport error raised while submitting a transaction.
    pub fn from_submit(err: LedgerError, context: &str) -> Self {
        match err {
            LedgerError::Timeout(_) => Self::Timeout {
                origin: format!("submission: {context}"),
            },
            other => Self::submission(format!("{context}: {other}")),
        }
    }

    /// Map a ledger transport error raised on a read-only call.
    pub fn from_read(err: LedgerError, context: &str) -> Self {
        match err {
            LedgerError::Timeout(_) => Self::Timeout {
                origin: format!("read: {context}"),
            },
            other => Self::Simulation(format!("{context}: {other}")),
        }
    }

    /// Only configuration errors abort the process.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Short label for metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Simulation(_) => "simulation",
            Self::Submission { .. } => "submission",
            Self::Stream(_) => "stream",
            Self::Timeout { .. } => "timeout",
            Self::InvalidPool(_) => "invalid_pool",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_error_carries_codes_verbatim() {
        let err = BotError::Submission {
            context: "swap".to_string(),
            result_codes: Some(ResultCodes {
                transaction: "tx_failed".to_string(),
                operations: vec!["op_underfunded".to_string()],
            }),
        };
        let text = err.to_string();
        assert!(text.contains("tx_failed"));
        assert!(text.contains("op_underfunded"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn timeouts_keep_their_origin() {
        let err = BotError::from_submit(LedgerError::Timeout("30s".into()), "ladder bucket 3");
        assert_eq!(err.kind(), "timeout");
        assert!(err.to_string().contains("submission: ladder bucket 3"));

        let err = BotError::from_read(LedgerError::Transport("reset".into()), "estimate");
        assert_eq!(err.kind(), "simulation");
    }
}
