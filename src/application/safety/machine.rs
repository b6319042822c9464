//! The capital-safety state machine.
//!
//! One instance is shared by every worker and is the single authoritative
//! gate for order-affecting operations. Mutations are serialized by a
//! writer lock; each one builds a new [`SafetyRecord`], persists it to the
//! store, and publishes it. Readers take an `Arc` snapshot and never wait
//! for disk I/O. No network I/O happens under either lock.
//!
//! Persistence failures never loosen safety: a change that tightens (or
//! only updates metrics) is published even if the write fails, and the
//! error is returned; a loosening change is published only after a
//! successful write.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::limits::SafetyLimits;
use super::permission::decide;
use super::record::{scope_for, SafetyRecord, RECORD_KEY};
use crate::application::sequence::FailureSink;
use crate::domain::{
    Account, AccountKey, CapitalSnapshot, FailureCategory, FailureRecord, SafetyLevel, SafetyScope,
    SafetyState, TradeDecision, TradeOperation, TransitionRecord,
};
use crate::error::SafetyError;
use crate::port::inbound::operator::{AccountStatus, ConnectionState, ControllerStatus};
use crate::port::outbound::store::{load_json, replace_json, StateStore};

/// How a mutation affects safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    /// Nothing changed; skip the write.
    None,
    /// Metrics or counters only.
    Neutral,
    Tightening,
    Loosening,
}

impl Change {
    fn of(from: SafetyState, to: SafetyState) -> Self {
        if to.severity() > from.severity() {
            Self::Tightening
        } else {
            Self::Loosening
        }
    }
}

/// Global safety gate and its durable record.
pub struct CapitalSafetyStateMachine {
    limits: SafetyLimits,
    store: Arc<dyn StateStore>,
    writer: Mutex<()>,
    current: RwLock<Arc<SafetyRecord>>,
}

impl CapitalSafetyStateMachine {
    /// Restore from the store, or start NORMAL when no record exists.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::Persistence`] when an existing record cannot
    /// be read or parsed. A corrupt record is never silently replaced.
    pub fn restore(store: Arc<dyn StateStore>, limits: SafetyLimits) -> Result<Self, SafetyError> {
        let record = load_json::<SafetyRecord>(store.as_ref(), RECORD_KEY)
            .map_err(SafetyError::Persistence)?;
        let record = match record {
            Some(record) => {
                info!(
                    state = %record.state,
                    failures = record.failure_count,
                    trading_enabled = record.trading_enabled,
                    "Restored safety state"
                );
                record
            }
            None => {
                info!("No safety record found, starting NORMAL");
                SafetyRecord::default()
            }
        };
        Ok(Self {
            limits,
            store,
            writer: Mutex::new(()),
            current: RwLock::new(Arc::new(record)),
        })
    }

    #[must_use]
    pub fn limits(&self) -> &SafetyLimits {
        &self.limits
    }

    /// Immutable view of the current record.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SafetyRecord> {
        Arc::clone(&self.current.read())
    }

    #[must_use]
    pub fn state(&self) -> SafetyState {
        self.current.read().state
    }

    /// Level from the master's latest assessment.
    #[must_use]
    pub fn safety_level(&self) -> Option<SafetyLevel> {
        self.current.read().global_level()
    }

    fn update<R>(
        &self,
        mutate: impl FnOnce(&mut SafetyRecord) -> Result<(R, Change), SafetyError>,
    ) -> Result<R, SafetyError> {
        let _writer = self.writer.lock();
        let mut draft = SafetyRecord::clone(&self.current.read());
        let (out, change) = mutate(&mut draft)?;
        if change == Change::None {
            return Ok(out);
        }
        draft.updated_at = Utc::now();
        let draft = Arc::new(draft);

        match replace_json(self.store.as_ref(), RECORD_KEY, draft.as_ref()) {
            Ok(()) => {
                *self.current.write() = draft;
                Ok(out)
            }
            Err(err) => {
                if change == Change::Loosening {
                    error!(error = %err, "Failed to persist safety record, change discarded");
                } else {
                    error!(error = %err, "Failed to persist safety record, change applied in memory");
                    *self.current.write() = draft;
                }
                Err(SafetyError::Persistence(err))
            }
        }
    }

    /// Apply a transition to `draft`. Returns the previous state.
    fn apply(
        &self,
        draft: &mut SafetyRecord,
        scope: &SafetyScope,
        target: SafetyState,
        reason: &str,
        forced: bool,
    ) -> Result<SafetyState, SafetyError> {
        let from = draft.state_of(scope);
        let legal = from.can_transition_to(target);
        // leaving a halt is an operator decision
        let automatic_halt_exit = from == SafetyState::EmergencyHalt && !forced;
        if !legal || automatic_halt_exit {
            warn!(
                scope = %scope,
                from = %from,
                to = %target,
                forced,
                "Rejected safety transition"
            );
            return Err(SafetyError::InvalidTransition { from, to: target });
        }

        draft.set_state(scope, target);
        draft.push_history(
            TransitionRecord {
                scope: scope.clone(),
                from,
                to: target,
                reason: reason.to_string(),
                forced,
                at: Utc::now(),
            },
            self.limits.history_limit,
        );

        if target == SafetyState::EmergencyHalt {
            error!(scope = %scope, from = %from, reason, "EMERGENCY_HALT engaged");
        } else if target.severity() > from.severity() {
            warn!(scope = %scope, from = %from, to = %target, reason, forced, "Safety state tightened");
        } else {
            info!(scope = %scope, from = %from, to = %target, reason, forced, "Safety state relaxed");
        }
        Ok(from)
    }

    /// Request an automatic global transition.
    ///
    /// # Errors
    ///
    /// [`SafetyError::InvalidTransition`] when the table forbids it (the
    /// state is unchanged), or a persistence error.
    pub fn transition(&self, target: SafetyState, reason: &str) -> Result<SafetyState, SafetyError> {
        self.transition_scope(&SafetyScope::Global, target, reason, false)
    }

    /// Operator-forced global transition. Still bound by the table; the only
    /// way out of EMERGENCY_HALT.
    ///
    /// # Errors
    ///
    /// As for [`transition`](Self::transition).
    pub fn force_transition(
        &self,
        target: SafetyState,
        reason: &str,
    ) -> Result<SafetyState, SafetyError> {
        self.transition_scope(&SafetyScope::Global, target, reason, true)
    }

    /// Operator-forced transition of one account's scoped state.
    ///
    /// The master has no scoped state, so a master key targets the global
    /// state.
    ///
    /// # Errors
    ///
    /// As for [`transition`](Self::transition).
    pub fn force_account_transition(
        &self,
        account: &AccountKey,
        target: SafetyState,
        reason: &str,
    ) -> Result<SafetyState, SafetyError> {
        self.transition_scope(&scope_for(account), target, reason, true)
    }

    fn transition_scope(
        &self,
        scope: &SafetyScope,
        target: SafetyState,
        reason: &str,
        forced: bool,
    ) -> Result<SafetyState, SafetyError> {
        self.update(|draft| {
            let from = self.apply(draft, scope, target, reason, forced)?;
            Ok((target, Change::of(from, target)))
        })
    }

    /// Record a capital reading for `account` and classify it.
    ///
    /// A CRITICAL master level halts globally; a CRITICAL user level halts
    /// that user's scope only.
    ///
    /// # Errors
    ///
    /// Returns a persistence error after applying the assessment in memory.
    pub fn assess(
        &self,
        account: &AccountKey,
        balance: Decimal,
        position_count: usize,
    ) -> Result<CapitalSnapshot, SafetyError> {
        self.update(|draft| {
            let thresholds = &self.limits.capital;
            let snapshot = {
                let entry = draft.accounts.entry(account.clone()).or_default();
                let snapshot = match &entry.snapshot {
                    Some(previous) => previous.advance(balance, position_count, thresholds),
                    None => CapitalSnapshot::first(balance, position_count, thresholds),
                };
                entry.snapshot = Some(snapshot.clone());
                snapshot
            };
            debug!(
                account = %account,
                balance = %snapshot.current,
                balance_pct = %snapshot.balance_remaining_pct.round_dp(2),
                drawdown_pct = %snapshot.drawdown_pct.round_dp(2),
                level = %snapshot.level,
                "Capital assessed"
            );

            let mut change = Change::Neutral;
            if snapshot.level == SafetyLevel::Critical {
                let scope = scope_for(account);
                if draft.state_of(&scope) != SafetyState::EmergencyHalt {
                    let reason = format!(
                        "capital CRITICAL: balance {}% drawdown {}%",
                        snapshot.balance_remaining_pct.round_dp(2),
                        snapshot.drawdown_pct.round_dp(2)
                    );
                    self.apply(draft, &scope, SafetyState::EmergencyHalt, &reason, false)?;
                    change = Change::Tightening;
                }
            }
            Ok((snapshot, change))
        })
    }

    /// Append a failure and escalate the global state if a threshold is
    /// now reached. Never steps the state backward.
    ///
    /// # Errors
    ///
    /// Returns a persistence error after applying the change in memory.
    pub fn record_failure(
        &self,
        account: Option<&AccountKey>,
        category: FailureCategory,
        detail: &str,
    ) -> Result<SafetyState, SafetyError> {
        self.log_failure(FailureRecord::new(account.cloned(), category, detail))
    }

    fn log_failure(&self, failure: FailureRecord) -> Result<SafetyState, SafetyError> {
        self.update(|draft| {
            draft.failure_count += 1;
            if let Some(account) = &failure.account {
                draft.accounts.entry(account.clone()).or_default().failure_count += 1;
            }
            debug!(
                account = ?failure.account.as_ref().map(AccountKey::as_str),
                category = %failure.category,
                total = draft.failure_count,
                "Failure recorded"
            );
            draft.push_failure(failure, self.limits.failure_log_limit);

            let mut change = Change::Neutral;
            if let Some(target) = self.limits.escalation.target_for(draft.failure_count) {
                let current = draft.state;
                if target.severity() > current.severity() && current.can_transition_to(target) {
                    let reason = format!("{} failures recorded", draft.failure_count);
                    self.apply(draft, &SafetyScope::Global, target, &reason, false)?;
                    change = Change::Tightening;
                }
            }
            Ok((draft.state, change))
        })
    }

    /// Clear failure counters. The state and the failure log are kept.
    ///
    /// # Errors
    ///
    /// Returns a persistence error after applying the reset in memory.
    pub fn reset_failures(&self) -> Result<(), SafetyError> {
        self.update(|draft| {
            let had = draft.failure_count;
            draft.failure_count = 0;
            for account in draft.accounts.values_mut() {
                account.failure_count = 0;
            }
            info!(cleared = had, "Failure counters reset");
            Ok(((), Change::Neutral))
        })
    }

    /// Lift the operator switch.
    ///
    /// # Errors
    ///
    /// Returns a persistence error; the switch stays off in that case.
    pub fn enable_trading(&self) -> Result<(), SafetyError> {
        self.update(|draft| {
            if draft.trading_enabled {
                return Ok(((), Change::None));
            }
            draft.trading_enabled = true;
            draft.disabled_reason = None;
            info!("Trading enabled by operator");
            Ok(((), Change::Loosening))
        })
    }

    /// Block entries and modifications until re-enabled.
    ///
    /// # Errors
    ///
    /// Returns a persistence error after switching off in memory.
    pub fn disable_trading(&self, reason: &str) -> Result<(), SafetyError> {
        self.update(|draft| {
            draft.trading_enabled = false;
            draft.disabled_reason = Some(reason.to_string());
            warn!(reason, "Trading disabled by operator");
            Ok(((), Change::Tightening))
        })
    }

    /// Global check, gated by the master's capital level.
    pub fn can_trade(&self, op: TradeOperation) -> TradeDecision {
        self.can_trade_for(&AccountKey::master(), op)
    }

    /// Check for one account: the more severe of the global and scoped
    /// states, and the worse of the master's and the account's levels.
    ///
    /// A CRITICAL level whose scope is not yet halted is halted here before
    /// the decision is made.
    pub fn can_trade_for(&self, account: &AccountKey, op: TradeOperation) -> TradeDecision {
        let mut record = self.snapshot();

        let critical_scopes: Vec<SafetyScope> = [AccountKey::master(), account.clone()]
            .iter()
            .filter(|key| record.account_level(key) == Some(SafetyLevel::Critical))
            .map(scope_for)
            .filter(|scope| record.state_of(scope) != SafetyState::EmergencyHalt)
            .collect();
        if !critical_scopes.is_empty() {
            let result = self.update(|draft| {
                let mut change = Change::None;
                for scope in &critical_scopes {
                    if draft.state_of(scope) != SafetyState::EmergencyHalt {
                        self.apply(
                            draft,
                            scope,
                            SafetyState::EmergencyHalt,
                            "capital CRITICAL",
                            false,
                        )?;
                        change = Change::Tightening;
                    }
                }
                Ok(((), change))
            });
            if let Err(err) = result {
                error!(error = %err, "Failed to engage halt for CRITICAL capital");
            }
            record = self.snapshot();
        }

        let decision = decide(
            record.effective_state(account),
            record.effective_level(account),
            (!record.trading_enabled)
                .then(|| record.disabled_reason.as_deref().unwrap_or("no reason given")),
            op,
        );
        if !decision.allowed {
            debug!(account = %account, operation = %op, reason = %decision.reason, "Trade blocked");
        }
        decision
    }
}

impl CapitalSafetyStateMachine {
    /// Status built from the durable record alone, for when no workers run.
    #[must_use]
    pub fn controller_status(&self, accounts: &[Account]) -> ControllerStatus {
        let record = self.snapshot();
        let rows = accounts
            .iter()
            .map(|account| {
                let scoped = record.account(&account.key);
                AccountStatus {
                    account: account.key.clone(),
                    role: account.role.to_string(),
                    broker: account.broker.clone(),
                    connection: ConnectionState::Stopped,
                    scoped_state: record.state_of(&SafetyScope::Account(account.key.clone())),
                    effective_state: record.effective_state(&account.key),
                    safety_level: record.account_level(&account.key),
                    balance: scoped
                        .and_then(|a| a.snapshot.as_ref())
                        .map(|s| s.current),
                    last_cycle_at: scoped.and_then(|a| a.snapshot.as_ref()).map(|s| s.assessed_at),
                    cycles: 0,
                    orders_submitted: 0,
                    consecutive_errors: 0,
                    failure_count: record.failure_count_for(&account.key),
                    last_error: None,
                    last_block_reason: None,
                }
            })
            .collect();
        status_from_record(&record, rows)
    }
}

/// Combine a record with per-account rows.
#[must_use]
pub fn status_from_record(record: &SafetyRecord, accounts: Vec<AccountStatus>) -> ControllerStatus {
    ControllerStatus {
        state: record.state,
        safety_level: record.global_level(),
        trading_enabled: record.trading_enabled,
        disabled_reason: record.disabled_reason.clone(),
        failure_count: record.failure_count,
        accounts,
        recent_transitions: record.history.iter().rev().take(10).rev().cloned().collect(),
        updated_at: record.updated_at,
    }
}

impl FailureSink for CapitalSafetyStateMachine {
    fn record(&self, record: FailureRecord) {
        if let Err(err) = self.log_failure(record) {
            error!(error = %err, "Failed to record failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::outbound::store::MemoryStore;
    use crate::domain::{AccountRole, CredentialHandle};
    use crate::error::StoreError;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn machine() -> (CapitalSafetyStateMachine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let machine =
            CapitalSafetyStateMachine::restore(store.clone(), SafetyLimits::default()).unwrap();
        (machine, store)
    }

    fn user(id: &str) -> AccountKey {
        AccountKey::for_role(&AccountRole::User(id.into())).unwrap()
    }

    /// Store whose writes can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl StateStore for FlakyStore {
        fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.load(key)
        }

        fn replace(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Io {
                    key: key.to_string(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.inner.replace(key, bytes)
        }

        fn remove(&self, key: &str) -> Result<bool, StoreError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_starts_normal_and_allows_entries() {
        let (machine, _) = machine();
        assert_eq!(machine.state(), SafetyState::Normal);
        assert!(machine.can_trade(TradeOperation::Entry).allowed);
    }

    #[test]
    fn test_invalid_transition_leaves_state_unchanged() {
        let (machine, _) = machine();
        let err = machine
            .transition(SafetyState::Recovery, "skip ahead")
            .unwrap_err();
        assert!(matches!(
            err,
            SafetyError::InvalidTransition {
                from: SafetyState::Normal,
                to: SafetyState::Recovery
            }
        ));
        assert_eq!(machine.state(), SafetyState::Normal);
        assert!(machine.snapshot().history.is_empty());
    }

    #[test]
    fn test_halt_is_never_left_automatically() {
        let (machine, _) = machine();
        machine
            .transition(SafetyState::EmergencyHalt, "test")
            .unwrap();
        assert!(machine.transition(SafetyState::Recovery, "auto").is_err());
        assert_eq!(machine.state(), SafetyState::EmergencyHalt);

        machine
            .force_transition(SafetyState::Recovery, "operator reviewed")
            .unwrap();
        assert_eq!(machine.state(), SafetyState::Recovery);
        let last = machine.snapshot().history.last().cloned().unwrap();
        assert!(last.forced);
        assert_eq!(last.reason, "operator reviewed");
    }

    #[test]
    fn test_forced_transition_still_obeys_table() {
        let (machine, _) = machine();
        machine.transition(SafetyState::EmergencyHalt, "t").unwrap();
        assert!(machine.force_transition(SafetyState::Normal, "yolo").is_err());
        assert_eq!(machine.state(), SafetyState::EmergencyHalt);
    }

    #[test]
    fn test_critical_master_assessment_halts_globally() {
        let (machine, _) = machine();
        let master = AccountKey::master();
        machine.assess(&master, dec!(10000), 0).unwrap();
        let snapshot = machine.assess(&master, dec!(4500), 0).unwrap();
        assert_eq!(snapshot.level, SafetyLevel::Critical);
        assert_eq!(machine.state(), SafetyState::EmergencyHalt);
        assert_eq!(
            machine.can_trade(TradeOperation::Entry).as_tuple(),
            (false, "EMERGENCY_HALT active")
        );
    }

    #[test]
    fn test_critical_user_assessment_halts_only_that_user() {
        let (machine, _) = machine();
        let alice = user("alice");
        let bob = user("bob");
        machine.assess(&alice, dec!(1000), 0).unwrap();
        machine.assess(&alice, dec!(400), 0).unwrap();
        machine.assess(&bob, dec!(1000), 0).unwrap();

        assert_eq!(machine.state(), SafetyState::Normal);
        assert!(!machine.can_trade_for(&alice, TradeOperation::Entry).allowed);
        assert!(!machine.can_trade_for(&alice, TradeOperation::Exit).allowed);
        assert!(machine.can_trade_for(&bob, TradeOperation::Entry).allowed);
        assert!(machine.can_trade(TradeOperation::Entry).allowed);
    }

    #[test]
    fn test_failure_escalation_steps_through_thresholds() {
        let (machine, _) = machine();
        let x = user("x");
        let mut states = Vec::new();
        for i in 0..10 {
            states.push(
                machine
                    .record_failure(Some(&x), FailureCategory::Network, &format!("fail {i}"))
                    .unwrap(),
            );
        }
        assert_eq!(states[0], SafetyState::Normal);
        assert_eq!(states[1], SafetyState::Degraded);
        assert_eq!(states[4], SafetyState::SafeMode);
        assert_eq!(states[9], SafetyState::EmergencyHalt);
        let record = machine.snapshot();
        assert_eq!(record.failure_count, 10);
        assert_eq!(record.failure_count_for(&x), 10);
        assert_eq!(record.failure_count_for(&user("y")), 0);
    }

    #[test]
    fn test_failures_never_step_backward() {
        let (machine, _) = machine();
        machine.transition(SafetyState::SafeMode, "manual").unwrap();
        for _ in 0..3 {
            machine
                .record_failure(None, FailureCategory::Timeout, "slow")
                .unwrap();
        }
        assert_eq!(machine.state(), SafetyState::SafeMode);
    }

    #[test]
    fn test_reset_clears_counter_only() {
        let (machine, _) = machine();
        for _ in 0..2 {
            machine
                .record_failure(None, FailureCategory::Network, "x")
                .unwrap();
        }
        assert_eq!(machine.state(), SafetyState::Degraded);
        machine.reset_failures().unwrap();
        let record = machine.snapshot();
        assert_eq!(record.failure_count, 0);
        assert_eq!(record.state, SafetyState::Degraded);
        assert_eq!(record.failures.len(), 2);
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let (machine, store) = machine();
        machine.transition(SafetyState::Degraded, "test").unwrap();
        let persisted: SafetyRecord = load_json(store.as_ref(), RECORD_KEY).unwrap().unwrap();
        assert_eq!(persisted.state, SafetyState::Degraded);

        machine.assess(&AccountKey::master(), dec!(100), 1).unwrap();
        let persisted: SafetyRecord = load_json(store.as_ref(), RECORD_KEY).unwrap().unwrap();
        assert!(persisted.global_level().is_some());
    }

    #[test]
    fn test_restore_picks_up_persisted_state() {
        let store = Arc::new(MemoryStore::new());
        {
            let machine =
                CapitalSafetyStateMachine::restore(store.clone(), SafetyLimits::default()).unwrap();
            machine.transition(SafetyState::SafeMode, "before restart").unwrap();
            machine.disable_trading("maintenance").unwrap();
        }
        let machine = CapitalSafetyStateMachine::restore(store, SafetyLimits::default()).unwrap();
        assert_eq!(machine.state(), SafetyState::SafeMode);
        assert!(!machine.snapshot().trading_enabled);
        assert_eq!(machine.snapshot().history.len(), 1);
    }

    #[test]
    fn test_tightening_applies_even_when_persist_fails() {
        let store = Arc::new(FlakyStore::default());
        let machine =
            CapitalSafetyStateMachine::restore(store.clone(), SafetyLimits::default()).unwrap();
        store.failing.store(true, Ordering::SeqCst);

        assert!(matches!(
            machine.transition(SafetyState::EmergencyHalt, "disk test"),
            Err(SafetyError::Persistence(_))
        ));
        assert_eq!(machine.state(), SafetyState::EmergencyHalt);
    }

    #[test]
    fn test_loosening_requires_successful_persist() {
        let store = Arc::new(FlakyStore::default());
        let machine =
            CapitalSafetyStateMachine::restore(store.clone(), SafetyLimits::default()).unwrap();
        machine.transition(SafetyState::Degraded, "t").unwrap();
        machine.disable_trading("t").unwrap();
        store.failing.store(true, Ordering::SeqCst);

        assert!(machine.transition(SafetyState::Normal, "recovered").is_err());
        assert_eq!(machine.state(), SafetyState::Degraded);
        assert!(machine.enable_trading().is_err());
        assert!(!machine.snapshot().trading_enabled);
    }

    #[test]
    fn test_forced_recovery_with_critical_capital_rehalts() {
        let (machine, _) = machine();
        let master = AccountKey::master();
        machine.assess(&master, dec!(1000), 0).unwrap();
        machine.assess(&master, dec!(100), 0).unwrap();
        machine
            .force_transition(SafetyState::Recovery, "operator")
            .unwrap();

        let decision = machine.can_trade(TradeOperation::Exit);
        assert_eq!(decision.as_tuple(), (false, "EMERGENCY_HALT active"));
        assert_eq!(machine.state(), SafetyState::EmergencyHalt);
    }

    #[test]
    fn test_offline_status_reflects_record() {
        let (machine, _) = machine();
        let accounts = vec![
            Account::new(
                AccountRole::Master,
                "paper",
                CredentialHandle::new("MASTER_KEY"),
            )
            .unwrap(),
            Account::new(
                AccountRole::User("dana".into()),
                "paper",
                CredentialHandle::new("DANA_KEY"),
            )
            .unwrap(),
        ];
        machine.assess(&accounts[1].key, dec!(500), 0).unwrap();
        machine
            .record_failure(Some(&accounts[1].key), FailureCategory::Network, "reset")
            .unwrap();

        let status = machine.controller_status(&accounts);
        assert_eq!(status.state, SafetyState::Normal);
        assert_eq!(status.accounts.len(), 2);
        let dana = status.account(&accounts[1].key).unwrap();
        assert_eq!(dana.balance, Some(dec!(500)));
        assert_eq!(dana.failure_count, 1);
        assert_eq!(dana.connection, ConnectionState::Stopped);
    }

    #[test]
    fn test_failure_sink_records_through_trait() {
        let (machine, _) = machine();
        let sink: &dyn FailureSink = &machine;
        sink.record(FailureRecord::new(
            Some(user("z")),
            FailureCategory::Authentication,
            "bad key",
        ));
        assert_eq!(machine.snapshot().failure_count, 1);
    }
}
