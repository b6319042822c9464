use thiserror::Error;

use crate::domain::safety::SafetyState;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors reported by a broker adapter for a single exchange call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The exchange refused the request sequence number.
    #[error("invalid sequence: {0}")]
    SequenceRejected(String),

    #[error("transient network error: {0}")]
    Transient(String),

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("{0}")]
    Other(String),
}

impl BrokerError {
    /// Whether the failed call may be retried after a backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout { .. })
    }

    /// Whether the exchange rejected the sequence number.
    #[must_use]
    pub const fn is_sequence_rejection(&self) -> bool {
        matches!(self, Self::SequenceRejected(_))
    }
}

/// Persistence errors from a [`StateStore`](crate::port::outbound::store::StateStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt record '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid store key '{0}'")]
    InvalidKey(String),
}

/// Sequence allocation and sequenced-call errors.
#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("invalid account id '{0}': no characters left after sanitizing")]
    InvalidAccountId(String),

    #[error("sequence still rejected after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Capital-safety state machine errors.
#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: SafetyState, to: SafetyState },

    #[error("failed to persist safety record: {0}")]
    Persistence(#[source] StoreError),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("strategy error: {0}")]
    Strategy(String),

    #[error("worker error: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, Error>;
