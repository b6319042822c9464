//! Execution fault records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::AccountKey;
use crate::error::BrokerError;

/// Kind of execution fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Network,
    Timeout,
    Authentication,
    OrderRejected,
    Replication,
    Persistence,
    Other,
}

impl FailureCategory {
    /// Category for a broker error. Sequence rejections map to `Other` but
    /// are never recorded by the sequenced client.
    #[must_use]
    pub const fn from_broker_error(err: &BrokerError) -> Self {
        match err {
            BrokerError::Transient(_) => Self::Network,
            BrokerError::Timeout { .. } => Self::Timeout,
            BrokerError::Authentication(_) => Self::Authentication,
            BrokerError::OrderRejected(_) => Self::OrderRejected,
            BrokerError::SequenceRejected(_) | BrokerError::Other(_) => Self::Other,
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Authentication => "authentication",
            Self::OrderRejected => "order_rejected",
            Self::Replication => "replication",
            Self::Persistence => "persistence",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// One recorded fault, tagged with the account it happened on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub timestamp: DateTime<Utc>,
    /// `None` for faults not tied to one account.
    pub account: Option<AccountKey>,
    pub category: FailureCategory,
    pub detail: String,
}

impl FailureRecord {
    #[must_use]
    pub fn new(
        account: Option<AccountKey>,
        category: FailureCategory,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            account,
            category,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_error_categories() {
        assert_eq!(
            FailureCategory::from_broker_error(&BrokerError::Transient("reset".into())),
            FailureCategory::Network
        );
        assert_eq!(
            FailureCategory::from_broker_error(&BrokerError::Timeout { timeout_ms: 5 }),
            FailureCategory::Timeout
        );
        assert_eq!(
            FailureCategory::from_broker_error(&BrokerError::Authentication("key".into())),
            FailureCategory::Authentication
        );
    }
}
