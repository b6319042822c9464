//! Capital safety machine behaviour through its public API.

mod support;

use std::sync::Arc;

use rust_decimal_macros::dec;
use tempfile::TempDir;

use support::user;
use warden::adapter::outbound::store::{FileStore, MemoryStore};
use warden::application::safety::{CapitalSafetyStateMachine, SafetyLimits, HALT_REASON};
use warden::domain::{
    AccountKey, CapitalThresholds, FailureCategory, SafetyLevel, SafetyScope, SafetyState,
    TradeOperation,
};
use warden::error::SafetyError;
use warden::port::outbound::store::StateStore;

fn machine() -> CapitalSafetyStateMachine {
    CapitalSafetyStateMachine::restore(Arc::new(MemoryStore::new()), SafetyLimits::default())
        .unwrap()
}

#[test]
fn critical_balance_overrides_moderate_drawdown() {
    let thresholds = CapitalThresholds::default();
    assert_eq!(
        thresholds.classify(dec!(45), 0, dec!(20)),
        SafetyLevel::Critical
    );
}

#[test]
fn critical_master_capital_halts_and_blocks_entries() {
    let machine = machine();
    let master = AccountKey::master();

    machine.assess(&master, dec!(10000), 0).unwrap();
    let snapshot = machine.assess(&master, dec!(4500), 1).unwrap();

    assert_eq!(snapshot.balance_remaining_pct, dec!(45));
    assert_eq!(snapshot.level, SafetyLevel::Critical);
    assert_eq!(machine.state(), SafetyState::EmergencyHalt);
    assert_eq!(
        machine.can_trade(TradeOperation::Entry).as_tuple(),
        (false, HALT_REASON)
    );
    assert!(!machine.can_trade(TradeOperation::Exit).allowed);
    assert!(!machine.can_trade_for(&user("alice"), TradeOperation::Entry).allowed);
}

#[test]
fn recovering_capital_does_not_lift_a_halt() {
    let machine = machine();
    let master = AccountKey::master();
    machine.assess(&master, dec!(10000), 0).unwrap();
    machine.assess(&master, dec!(4000), 0).unwrap();

    machine.assess(&master, dec!(9900), 0).unwrap();

    assert_eq!(machine.state(), SafetyState::EmergencyHalt);
    assert!(matches!(
        machine.transition(SafetyState::Recovery, "capital recovered"),
        Err(SafetyError::InvalidTransition { .. })
    ));
}

/// Ten failures pass the DEGRADED (2) and SAFE_MODE (5) thresholds and
/// reach the EMERGENCY_HALT threshold (10). A scenario that stops at
/// SAFE_MODE after ten failures contradicts that table; the table wins.
#[test]
fn ten_failures_pass_safe_mode_and_reach_the_halt_threshold() {
    let machine = machine();
    let x = user("x");
    let y = user("y");

    for i in 0..10 {
        machine
            .record_failure(Some(&x), FailureCategory::Network, &format!("timeout {i}"))
            .unwrap();
    }

    let record = machine.snapshot();
    let global: Vec<(SafetyState, SafetyState)> = record
        .history
        .iter()
        .filter(|t| t.scope == SafetyScope::Global)
        .map(|t| (t.from, t.to))
        .collect();
    assert_eq!(
        global,
        vec![
            (SafetyState::Normal, SafetyState::Degraded),
            (SafetyState::Degraded, SafetyState::SafeMode),
            (SafetyState::SafeMode, SafetyState::EmergencyHalt),
        ]
    );
    assert!(record.history.iter().all(|t| !t.forced));

    assert_eq!(record.failure_count_for(&x), 10);
    assert_eq!(record.failure_count_for(&y), 0);
    assert_eq!(record.state_of(&SafetyScope::Account(y.clone())), SafetyState::Normal);
    assert_eq!(record.effective_state(&y), SafetyState::EmergencyHalt);
    assert!(!machine.can_trade_for(&y, TradeOperation::Entry).allowed);
}

#[test]
fn safe_mode_from_failures_binds_clean_accounts() {
    let machine = machine();
    let x = user("x");
    let y = user("y");
    for _ in 0..5 {
        machine
            .record_failure(Some(&x), FailureCategory::Authentication, "401")
            .unwrap();
    }

    assert_eq!(machine.state(), SafetyState::SafeMode);
    let entry = machine.can_trade_for(&y, TradeOperation::Entry);
    assert_eq!(entry.as_tuple(), (false, "entries blocked in SAFE_MODE"));
    assert!(machine.can_trade_for(&y, TradeOperation::Exit).allowed);
    let modify = machine.can_trade_for(&y, TradeOperation::Modify);
    assert!(modify.allowed);
    assert!(modify.restricted);
}

#[test]
fn reset_clears_counts_but_keeps_state() {
    let machine = machine();
    for _ in 0..3 {
        machine
            .record_failure(None, FailureCategory::Other, "boom")
            .unwrap();
    }
    assert_eq!(machine.state(), SafetyState::Degraded);

    machine.reset_failures().unwrap();
    assert_eq!(machine.snapshot().failure_count, 0);
    assert_eq!(machine.state(), SafetyState::Degraded);

    // one more failure stays below the first threshold again
    machine
        .record_failure(None, FailureCategory::Other, "boom")
        .unwrap();
    assert_eq!(machine.state(), SafetyState::Degraded);
}

#[test]
fn critical_user_capital_halts_only_that_user() {
    let machine = machine();
    let alice = user("alice");
    let bob = user("bob");
    machine.assess(&alice, dec!(1000), 0).unwrap();
    machine.assess(&alice, dec!(300), 0).unwrap();

    assert_eq!(machine.state(), SafetyState::Normal);
    let record = machine.snapshot();
    assert_eq!(
        record.state_of(&SafetyScope::Account(alice.clone())),
        SafetyState::EmergencyHalt
    );
    assert_eq!(
        machine.can_trade_for(&alice, TradeOperation::Entry).as_tuple(),
        (false, HALT_REASON)
    );
    assert!(machine.can_trade_for(&bob, TradeOperation::Entry).allowed);
    assert!(machine.can_trade(TradeOperation::Entry).allowed);
}

#[test]
fn account_funded_after_an_empty_first_reading_can_trade_again() {
    let machine = machine();
    let alice = user("alice");

    machine.assess(&alice, dec!(0), 0).unwrap();
    assert_eq!(
        machine.snapshot().state_of(&SafetyScope::Account(alice.clone())),
        SafetyState::EmergencyHalt
    );

    let funded = machine.assess(&alice, dec!(1000), 0).unwrap();
    assert_eq!(funded.initial, dec!(1000));
    assert_eq!(funded.level, SafetyLevel::Safe);

    machine
        .force_account_transition(&alice, SafetyState::Recovery, "funded")
        .unwrap();
    machine
        .force_account_transition(&alice, SafetyState::Normal, "funded")
        .unwrap();

    let entry = machine.can_trade_for(&alice, TradeOperation::Entry);
    assert!(entry.allowed, "{}", entry.reason);
    assert_eq!(machine.assess(&alice, dec!(950), 0).unwrap().level, SafetyLevel::Safe);
}

#[test]
fn halt_survives_restart_and_needs_forced_recovery() {
    let dir = TempDir::new().unwrap();
    let open = || {
        let store: Arc<dyn StateStore> = Arc::new(FileStore::new(dir.path()));
        CapitalSafetyStateMachine::restore(store, SafetyLimits::default()).unwrap()
    };

    {
        let machine = open();
        machine
            .transition(SafetyState::EmergencyHalt, "exchange outage")
            .unwrap();
    }

    let machine = open();
    assert_eq!(machine.state(), SafetyState::EmergencyHalt);
    assert!(machine
        .force_transition(SafetyState::Normal, "skip recovery")
        .is_err());
    assert_eq!(machine.state(), SafetyState::EmergencyHalt);

    machine
        .force_transition(SafetyState::Recovery, "operator reviewed")
        .unwrap();
    assert!(!machine.can_trade(TradeOperation::Entry).allowed);
    assert!(machine.can_trade(TradeOperation::Exit).allowed);
    machine
        .force_transition(SafetyState::Normal, "recovery complete")
        .unwrap();

    let reopened = open();
    assert_eq!(reopened.state(), SafetyState::Normal);
    let record = reopened.snapshot();
    let history = &record.history;
    assert_eq!(history.len(), 3);
    assert!(history[1].forced && history[2].forced);
    assert_eq!(history[2].reason, "recovery complete");
}

#[test]
fn operator_switch_blocks_entries_but_not_exits() {
    let machine = machine();
    machine.disable_trading("exchange maintenance").unwrap();

    let entry = machine.can_trade(TradeOperation::Entry);
    assert!(!entry.allowed);
    assert!(entry.reason.contains("exchange maintenance"));
    assert!(!machine.can_trade(TradeOperation::Modify).allowed);
    assert!(machine.can_trade(TradeOperation::Exit).allowed);

    machine.enable_trading().unwrap();
    assert!(machine.can_trade(TradeOperation::Entry).allowed);
}

#[test]
fn every_illegal_transition_leaves_state_unchanged() {
    for from in SafetyState::ALL {
        for to in SafetyState::ALL {
            if from.can_transition_to(to) {
                continue;
            }
            let machine = machine();
            if from != SafetyState::Normal {
                drive_to(&machine, from);
            }
            assert!(machine.force_transition(to, "probe").is_err(), "{from} -> {to}");
            assert_eq!(machine.state(), from);
        }
    }
}

/// Reach `target` from NORMAL through legal forced steps.
fn drive_to(machine: &CapitalSafetyStateMachine, target: SafetyState) {
    match target {
        SafetyState::Normal => {}
        SafetyState::Recovery => {
            machine
                .force_transition(SafetyState::Degraded, "setup")
                .unwrap();
            machine
                .force_transition(SafetyState::Recovery, "setup")
                .unwrap();
        }
        other => {
            machine.force_transition(other, "setup").unwrap();
        }
    }
}
