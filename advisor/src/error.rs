use thiserror::Error;

use crate::backend::BackendError;

/// A failed attempt that the validator may retry.
#[derive(Error, Debug)]
pub enum ResponseFailure {
    #[error("model backend failed: {0}")]
    Transport(#[from] BackendError),

    #[error("model call timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("response is not a valid setup document: {0}")]
    Malformed(String),

    #[error("response contained no valid setups ({rejected} rejected)")]
    NoValidSetups { rejected: usize },
}

impl ResponseFailure {
    /// Short label for logs and the unavailable status.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Malformed(_) => "malformed",
            Self::NoValidSetups { .. } => "no_valid_setups",
        }
    }
}

/// One setup broke its own invariants. The setup is dropped; the batch survives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("setup #{index} does not match the setup shape: {reason}")]
    Shape { index: usize, reason: String },

    #[error("setup #{index}: asset {asset} has no usable market data")]
    UnknownAsset { index: usize, asset: String },

    #[error("setup #{index}: playbook {playbook:?} is not on the menu")]
    UnknownPlaybook { index: usize, playbook: String },

    #[error("setup #{index}: {field} must be a positive finite price, got {value}")]
    BadPrice {
        index: usize,
        field: &'static str,
        value: f64,
    },

    #[error("setup #{index}: stop {stop} is not on the loss side of entry {entry}")]
    StopOnProfitSide { index: usize, entry: f64, stop: f64 },

    #[error("setup #{index}: expected 1 to 3 take-profits, got {count}")]
    TakeProfitCount { index: usize, count: usize },

    #[error("setup #{index}: no take-profit on the profit side of entry")]
    NoProfitTarget { index: usize },

    #[error("setup #{index}: confidence {value} outside 0..=100")]
    Confidence { index: usize, value: i64 },

    #[error("setup #{index}: expected {expected} confidence criteria, got {count}")]
    BreakdownCount {
        index: usize,
        expected: usize,
        count: usize,
    },

    #[error("setup #{index}: criterion {criterion:?} scored {score}, outside 0..=10")]
    BreakdownScore {
        index: usize,
        criterion: String,
        score: i64,
    },

    #[error("setup #{index}: confidence {stated} disagrees with weighted breakdown {weighted}")]
    ConfidenceMismatch { index: usize, stated: i64, weighted: i64 },
}
