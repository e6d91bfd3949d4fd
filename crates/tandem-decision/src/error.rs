//! Error types for the decision core.
//!
//! Only configuration errors are meant to reach an operator. Everything
//! else is absorbed at the component boundary and degraded into a usable
//! snapshot or plan, so a request is never failed by the decision core.

use std::time::Duration;

use thiserror::Error;

/// Top-level decision core error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecisionError {
    /// A probe failed or timed out. The aggregator substitutes cached or
    /// default values.
    #[error("probe '{probe}' unavailable: {reason}")]
    ProbeUnavailable { probe: &'static str, reason: String },

    /// A configuration value is out of range. Fatal at construction time.
    #[error("invalid configuration '{field}': {reason}")]
    ConfigInvalid { field: &'static str, reason: String },

    #[error("failed to load configuration: {0}")]
    ConfigLoad(#[from] ConfigError),

    /// The history window no longer satisfies its capacity bound.
    #[error("history window corrupted: {0}")]
    HistoryCorruption(String),

    /// The scorer could not rank any strategy.
    #[error("scoring failed: {0}")]
    ScoringFailed(String),
}

impl DecisionError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for decision core operations
pub type DecisionResult<T> = Result<T, DecisionError>;

/// Errors raised while reading configuration sources.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by hardware and network probes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("command '{command}' failed: {reason}")]
    Command { command: &'static str, reason: String },

    #[error("HTTP probe failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not parse probe output: {0}")]
    Parse(String),

    #[error("probe unavailable: {0}")]
    Unavailable(String),
}

impl ProbeError {
    /// Wrap this failure as the decision-level error for `probe`.
    pub fn into_decision_error(self, probe: &'static str) -> DecisionError {
        DecisionError::ProbeUnavailable {
            probe,
            reason: self.to_string(),
        }
    }
}
