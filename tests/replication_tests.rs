//! Copy-trade replication against a shared scripted broker.

mod support;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use support::{user, Harness};
use warden::application::replication::{ReplicationSettings, Subscriber, TradeReplicationEngine};
use warden::domain::{
    AccountKey, FillEvent, OrderSide, OrderStatus, Position, ReplicationStatus, SafetyState,
    TradeOperation,
};
use warden::error::BrokerError;
use warden::testkit::broker::{Operation, ScriptedBroker};

fn master_fill(operation: TradeOperation) -> FillEvent {
    FillEvent {
        source_order_id: "master-1".into(),
        symbol: "BTC".into(),
        side: OrderSide::Buy,
        notional: dec!(1000),
        master_balance_at_fill: dec!(10000),
        operation,
        filled_at: Utc::now(),
    }
}

fn engine(harness: &Harness) -> TradeReplicationEngine {
    TradeReplicationEngine::new(harness.machine.clone(), ReplicationSettings::default())
}

fn broker_with(balances: &[(&AccountKey, Decimal)]) -> ScriptedBroker {
    balances
        .iter()
        .fold(ScriptedBroker::new().enforce_sequence(), |broker, (key, balance)| {
            broker.with_balance(key, *balance)
        })
}

#[test]
fn proportional_and_capped_orders_in_one_pass() {
    let alice = user("alice");
    let bob = user("bob");
    let harness = Harness::new(broker_with(&[(&alice, dec!(1000)), (&bob, dec!(500))]));
    let subscribers = vec![
        Subscriber::new(harness.client(&alice)),
        Subscriber::new(harness.client(&bob)).with_ceiling(dec!(0.01)),
    ];

    let report = engine(&harness).replicate(&master_fill(TradeOperation::Entry), &subscribers);

    let a = report.result_for(&alice).unwrap();
    assert_eq!(a.status, ReplicationStatus::Filled);
    assert_eq!(a.scaled_notional, dec!(100));
    assert!(a.order_id.is_some());

    let b = report.result_for(&bob).unwrap();
    assert_eq!(b.status, ReplicationStatus::Capped);
    assert_eq!(b.scaled_notional, dec!(5));
    assert!(b.reason.contains("1% ceiling"), "{}", b.reason);

    assert_eq!(harness.broker.orders_for(&alice)[0].notional, dec!(100));
    assert_eq!(harness.broker.orders_for(&bob)[0].notional, dec!(5));
    assert!(harness.broker.orders_for(&AccountKey::master()).is_empty());

    assert_eq!(report.summary.filled, 1);
    assert_eq!(report.summary.capped, 1);
    assert_eq!(report.summary.total_notional, dec!(105));
    assert_eq!(report.summary.source_order_id, "master-1");
    assert!(!report.summary.is_partial_failure());
}

#[test]
fn no_user_order_exceeds_its_ceiling() {
    let keys: Vec<AccountKey> = (0..6).map(|i| user(&format!("u{i}"))).collect();
    let balances = [
        dec!(0),
        dec!(1),
        dec!(250),
        dec!(10000),
        dec!(50000),
        dec!(123.45),
    ];
    let pairs: Vec<(&AccountKey, Decimal)> = keys.iter().zip(balances).collect();
    let harness = Harness::new(broker_with(&pairs));
    let subscribers: Vec<Subscriber> = keys
        .iter()
        .map(|k| Subscriber::new(harness.client(k)).with_ceiling(dec!(0.05)))
        .collect();

    let report = engine(&harness).replicate(&master_fill(TradeOperation::Entry), &subscribers);

    for (key, balance) in keys.iter().zip(balances) {
        for order in harness.broker.orders_for(key) {
            assert!(order.notional <= balance * dec!(0.05), "{key}: {}", order.notional);
        }
    }
    let zero = report.result_for(&keys[0]).unwrap();
    assert_eq!(zero.status, ReplicationStatus::Skipped);
    assert_eq!(report.summary.subscribers(), 6);
}

#[test]
fn one_failing_user_does_not_block_the_others() {
    let alice = user("alice");
    let bob = user("bob");
    let carol = user("carol");
    let harness = Harness::new(broker_with(&[
        (&alice, dec!(1000)),
        (&bob, dec!(1000)),
        (&carol, dec!(1000)),
    ]));
    harness.broker.fail_next(
        &bob,
        Operation::PlaceOrder,
        vec![BrokerError::Authentication("revoked key".into())],
    );
    let subscribers: Vec<Subscriber> = [&alice, &bob, &carol]
        .into_iter()
        .map(|k| Subscriber::new(harness.client(k)))
        .collect();

    let report = engine(&harness).replicate(&master_fill(TradeOperation::Entry), &subscribers);

    assert_eq!(
        report.result_for(&alice).unwrap().status,
        ReplicationStatus::Filled
    );
    assert_eq!(
        report.result_for(&carol).unwrap().status,
        ReplicationStatus::Filled
    );
    let failed = report.result_for(&bob).unwrap();
    assert_eq!(failed.status, ReplicationStatus::Failed);
    assert!(failed.reason.contains("revoked key"));
    assert!(report.summary.is_partial_failure());

    let record = harness.machine.snapshot();
    assert_eq!(record.failure_count, 1);
    assert_eq!(record.failure_count_for(&bob), 1);
    assert_eq!(record.failure_count_for(&alice), 0);
    assert_eq!(record.failure_count_for(&carol), 0);
}

#[test]
fn balance_read_failure_fails_only_that_user() {
    let alice = user("alice");
    let bob = user("bob");
    let harness = Harness::new(broker_with(&[(&alice, dec!(1000)), (&bob, dec!(1000))]));
    harness.broker.fail_next(
        &alice,
        Operation::GetBalance,
        vec![BrokerError::OrderRejected("account frozen".into())],
    );
    let subscribers = vec![
        Subscriber::new(harness.client(&alice)),
        Subscriber::new(harness.client(&bob)),
    ];

    let report = engine(&harness).replicate(&master_fill(TradeOperation::Entry), &subscribers);

    let a = report.result_for(&alice).unwrap();
    assert_eq!(a.status, ReplicationStatus::Failed);
    assert!(a.reason.starts_with("balance read failed"));
    assert!(harness.broker.orders_for(&alice).is_empty());
    assert_eq!(
        report.result_for(&bob).unwrap().status,
        ReplicationStatus::Filled
    );
}

#[test]
fn non_filled_order_is_reported_with_its_id() {
    let alice = user("alice");
    let harness = Harness::new(
        broker_with(&[(&alice, dec!(1000))]).with_order_status(OrderStatus::Rejected),
    );
    let subscribers = vec![Subscriber::new(harness.client(&alice))];

    let report = engine(&harness).replicate(&master_fill(TradeOperation::Entry), &subscribers);

    let result = report.result_for(&alice).unwrap();
    assert_eq!(result.status, ReplicationStatus::Failed);
    assert!(result.order_id.is_some());
    assert_eq!(harness.machine.snapshot().failure_count_for(&alice), 1);
}

/// The master closing its long: a SELL tagged as an exit.
fn master_exit() -> FillEvent {
    FillEvent {
        side: OrderSide::Sell,
        ..master_fill(TradeOperation::Exit)
    }
}

fn long_btc(notional: Decimal) -> Position {
    Position {
        symbol: "BTC".into(),
        side: OrderSide::Buy,
        notional,
        entry_price: dec!(50000),
    }
}

#[test]
fn restricted_users_skip_entries_and_only_close_their_own_positions() {
    let alice = user("alice");
    let bob = user("bob");
    let carol = user("carol");
    let harness = Harness::new(broker_with(&[
        (&alice, dec!(1000)),
        (&bob, dec!(1000)),
        (&carol, dec!(1000)),
    ]));
    harness.broker.set_positions(&alice, vec![long_btc(dec!(500))]);
    harness.broker.set_positions(&carol, vec![long_btc(dec!(60))]);
    harness
        .machine
        .force_account_transition(&alice, SafetyState::EmergencyHalt, "manual")
        .unwrap();
    for key in [&bob, &carol] {
        harness
            .machine
            .force_account_transition(key, SafetyState::SafeMode, "manual")
            .unwrap();
    }
    let subscribers: Vec<Subscriber> = [&alice, &bob, &carol]
        .into_iter()
        .map(|k| Subscriber::new(harness.client(k)))
        .collect();
    let engine = engine(&harness);

    let entry = engine.replicate(&master_fill(TradeOperation::Entry), &subscribers);
    assert_eq!(entry.summary.skipped, 3);
    assert!(harness.broker.orders().is_empty());

    let exit = engine.replicate(&master_exit(), &subscribers);

    // halted: exits are blocked too
    assert_eq!(
        exit.result_for(&alice).unwrap().status,
        ReplicationStatus::Skipped
    );
    // nothing to close, so the SELL would open a short
    let opened = exit.result_for(&bob).unwrap();
    assert_eq!(opened.status, ReplicationStatus::Skipped);
    assert!(opened.reason.contains("SAFE_MODE"), "{}", opened.reason);
    assert!(harness.broker.orders_for(&bob).is_empty());
    // closes the long, never more than its size
    let closed = exit.result_for(&carol).unwrap();
    assert_eq!(closed.status, ReplicationStatus::Filled);
    assert_eq!(closed.scaled_notional, dec!(60));
    let orders = harness.broker.orders_for(&carol);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Sell);
    assert_eq!(orders[0].notional, dec!(60));

    assert_eq!(harness.machine.state(), SafetyState::Normal);
}

#[test]
fn master_exit_is_an_entry_for_a_normal_user_without_a_position() {
    let alice = user("alice");
    let harness = Harness::new(broker_with(&[(&alice, dec!(1000))]));
    let subscribers = vec![Subscriber::new(harness.client(&alice))];

    let report = engine(&harness).replicate(&master_exit(), &subscribers);

    let result = report.result_for(&alice).unwrap();
    assert_eq!(result.status, ReplicationStatus::Filled);
    assert_eq!(result.scaled_notional, dec!(100));
}

#[test]
fn exhausted_sequence_retries_fail_the_copy_without_escalating() {
    let alice = user("alice");
    let bob = user("bob");
    let harness = Harness::new(broker_with(&[(&alice, dec!(1000)), (&bob, dec!(1000))]));
    harness.broker.fail_next(
        &alice,
        Operation::PlaceOrder,
        (0..10)
            .map(|_| BrokerError::SequenceRejected("invalid nonce".into()))
            .collect(),
    );
    let subscribers = vec![
        Subscriber::new(harness.client(&alice)),
        Subscriber::new(harness.client(&bob)),
    ];

    let report = engine(&harness).replicate(&master_fill(TradeOperation::Entry), &subscribers);

    let failed = report.result_for(&alice).unwrap();
    assert_eq!(failed.status, ReplicationStatus::Failed);
    assert!(failed.reason.contains("still rejected"), "{}", failed.reason);
    assert_eq!(
        report.result_for(&bob).unwrap().status,
        ReplicationStatus::Filled
    );
    let record = harness.machine.snapshot();
    assert_eq!(record.failure_count, 0);
    assert_eq!(harness.machine.state(), SafetyState::Normal);
}

#[test]
fn master_subscriber_is_never_replicated_to() {
    let master = AccountKey::master();
    let alice = user("alice");
    let harness = Harness::new(broker_with(&[(&master, dec!(10000)), (&alice, dec!(1000))]));
    let subscribers = vec![
        Subscriber::new(harness.client(&master)),
        Subscriber::new(harness.client(&alice)),
    ];

    let report = engine(&harness).replicate(&master_fill(TradeOperation::Entry), &subscribers);

    assert!(report.result_for(&master).is_none());
    assert!(harness.broker.calls().iter().all(|c| c.account != master));
    assert_eq!(report.summary.filled, 1);
}
