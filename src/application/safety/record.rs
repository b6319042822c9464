//! The persisted global safety record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AccountKey, CapitalSnapshot, FailureRecord, SafetyLevel, SafetyScope, SafetyState,
    TransitionRecord,
};

/// Store key of the global record.
pub const RECORD_KEY: &str = "safety/global";

/// Current record format version.
pub const RECORD_VERSION: u32 = 1;

/// Safety data scoped to one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSafety {
    /// Account-scoped state. Always `Normal` for the master, whose capital
    /// drives the global state instead.
    pub state: SafetyState,
    pub snapshot: Option<CapitalSnapshot>,
    /// Failures tagged with this account since the last reset.
    pub failure_count: u64,
}

/// Everything the machine persists, replaced atomically as one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyRecord {
    pub version: u32,
    pub state: SafetyState,
    pub trading_enabled: bool,
    pub disabled_reason: Option<String>,
    pub failure_count: u64,
    /// Most recent failures, oldest first.
    pub failures: Vec<FailureRecord>,
    pub accounts: BTreeMap<AccountKey, AccountSafety>,
    /// Most recent transitions, oldest first.
    pub history: Vec<TransitionRecord>,
    pub updated_at: DateTime<Utc>,
}

impl Default for SafetyRecord {
    fn default() -> Self {
        Self {
            version: RECORD_VERSION,
            state: SafetyState::Normal,
            trading_enabled: true,
            disabled_reason: None,
            failure_count: 0,
            failures: Vec::new(),
            accounts: BTreeMap::new(),
            history: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

impl SafetyRecord {
    #[must_use]
    pub fn account(&self, key: &AccountKey) -> Option<&AccountSafety> {
        self.accounts.get(key)
    }

    /// Level from the master's latest assessment.
    #[must_use]
    pub fn global_level(&self) -> Option<SafetyLevel> {
        self.account(&AccountKey::master())
            .and_then(|a| a.snapshot.as_ref())
            .map(|s| s.level)
    }

    /// Level from one account's latest assessment.
    #[must_use]
    pub fn account_level(&self, key: &AccountKey) -> Option<SafetyLevel> {
        self.account(key)
            .and_then(|a| a.snapshot.as_ref())
            .map(|s| s.level)
    }

    /// State of one scope.
    #[must_use]
    pub fn state_of(&self, scope: &SafetyScope) -> SafetyState {
        match scope {
            SafetyScope::Global => self.state,
            SafetyScope::Account(key) => self.account(key).map_or(SafetyState::Normal, |a| a.state),
        }
    }

    pub(crate) fn set_state(&mut self, scope: &SafetyScope, state: SafetyState) {
        match scope {
            SafetyScope::Global => self.state = state,
            SafetyScope::Account(key) => self.accounts.entry(key.clone()).or_default().state = state,
        }
    }

    /// The more severe of the global and the account-scoped state.
    #[must_use]
    pub fn effective_state(&self, key: &AccountKey) -> SafetyState {
        self.state
            .max_severity(self.state_of(&SafetyScope::Account(key.clone())))
    }

    /// The worse of the master's level and the account's own level.
    #[must_use]
    pub fn effective_level(&self, key: &AccountKey) -> Option<SafetyLevel> {
        match (self.global_level(), self.account_level(key)) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Failures recorded against one account since the last reset.
    #[must_use]
    pub fn failure_count_for(&self, key: &AccountKey) -> u64 {
        self.account(key).map_or(0, |a| a.failure_count)
    }

    pub(crate) fn push_history(&mut self, record: TransitionRecord, limit: usize) {
        self.history.push(record);
        trim_front(&mut self.history, limit);
    }

    pub(crate) fn push_failure(&mut self, record: FailureRecord, limit: usize) {
        self.failures.push(record);
        trim_front(&mut self.failures, limit);
    }
}

fn trim_front<T>(items: &mut Vec<T>, limit: usize) {
    if items.len() > limit {
        let excess = items.len() - limit;
        items.drain(..excess);
    }
}

/// The scope an account's own capital drives.
#[must_use]
pub fn scope_for(key: &AccountKey) -> SafetyScope {
    if key.is_master() {
        SafetyScope::Global
    } else {
        SafetyScope::Account(key.clone())
    }
}
