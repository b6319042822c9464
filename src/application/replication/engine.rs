//! Copy-trade fan-out from a master fill to subscribed user accounts.
//!
//! Each subscriber is handled on its own scoped thread with its own
//! client. A failure or panic for one subscriber becomes a `failed` result
//! for that subscriber and nothing else; the master fill is never touched.

use std::sync::Arc;
use std::thread;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::application::safety::CapitalSafetyStateMachine;
use crate::application::sequence::SequencedAccountClient;
use crate::domain::{
    scale_notional, AccountKey, FailureCategory, FillEvent, ReplicationOrder, ReplicationReport,
    ReplicationResult, ReplicationStatus, Signal, TradeOperation,
};
use crate::error::SequenceError;

/// Engine-wide replication settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationSettings {
    pub enabled: bool,
    /// Default fraction of a user's balance one replicated order may use.
    pub risk_ceiling_pct: Decimal,
    /// Scaled orders below this notional are skipped.
    pub min_notional: Decimal,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            risk_ceiling_pct: Decimal::new(10, 2),
            min_notional: Decimal::ZERO,
        }
    }
}

/// A user account following the master.
#[derive(Clone)]
pub struct Subscriber {
    pub client: Arc<SequencedAccountClient>,
    /// Per-account ceiling, overriding the engine default.
    pub risk_ceiling_pct: Option<Decimal>,
}

impl Subscriber {
    #[must_use]
    pub fn new(client: Arc<SequencedAccountClient>) -> Self {
        Self {
            client,
            risk_ceiling_pct: None,
        }
    }

    #[must_use]
    pub fn with_ceiling(mut self, risk_ceiling_pct: Decimal) -> Self {
        self.risk_ceiling_pct = Some(risk_ceiling_pct);
        self
    }

    #[must_use]
    pub fn account(&self) -> &AccountKey {
        self.client.account()
    }
}

/// Fans master fills out to subscribers.
pub struct TradeReplicationEngine {
    machine: Arc<CapitalSafetyStateMachine>,
    settings: ReplicationSettings,
}

impl TradeReplicationEngine {
    pub fn new(machine: Arc<CapitalSafetyStateMachine>, settings: ReplicationSettings) -> Self {
        Self { machine, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &ReplicationSettings {
        &self.settings
    }

    /// Replicate one master fill to every subscriber.
    ///
    /// Subscriber balances are read fresh here. Results come back in
    /// subscriber order.
    pub fn replicate(&self, fill: &FillEvent, subscribers: &[Subscriber]) -> ReplicationReport {
        let pass_id = uuid::Uuid::new_v4().simple().to_string();

        let results: Vec<ReplicationResult> = if !self.settings.enabled {
            subscribers
                .iter()
                .filter(|s| !s.account().is_master())
                .map(|s| skipped(s.account(), Decimal::ZERO, "replication disabled"))
                .collect()
        } else {
            thread::scope(|scope| {
                let handles: Vec<_> = subscribers
                    .iter()
                    .filter(|s| !s.account().is_master())
                    .map(|subscriber| {
                        let handle = thread::Builder::new()
                            .name(format!("replicate-{}", subscriber.account()))
                            .spawn_scoped(scope, move || self.replicate_one(fill, subscriber));
                        (subscriber, handle)
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|(subscriber, handle)| {
                        let user = subscriber.account();
                        match handle {
                            Ok(handle) => handle.join().unwrap_or_else(|_| {
                                error!(user = %user, "Replication panicked");
                                self.fail(user, Decimal::ZERO, "replication panicked".into())
                            }),
                            Err(err) => {
                                self.fail(user, Decimal::ZERO, format!("failed to spawn: {err}"))
                            }
                        }
                    })
                    .collect()
            })
        };

        let report = ReplicationReport::new(pass_id, fill.source_order_id.clone(), results);
        let summary = &report.summary;
        if summary.is_partial_failure() {
            warn!(
                pass = %summary.pass_id,
                source_order = %summary.source_order_id,
                filled = summary.filled,
                capped = summary.capped,
                skipped = summary.skipped,
                failed = summary.failed,
                "Replication pass finished with failures"
            );
        } else {
            info!(
                pass = %summary.pass_id,
                source_order = %summary.source_order_id,
                filled = summary.filled,
                capped = summary.capped,
                skipped = summary.skipped,
                total_notional = %summary.total_notional,
                "Replication pass finished"
            );
        }
        report
    }

    fn replicate_one(&self, fill: &FillEvent, subscriber: &Subscriber) -> ReplicationResult {
        let user = subscriber.account();
        let client = &subscriber.client;
        let ceiling = subscriber
            .risk_ceiling_pct
            .unwrap_or(self.settings.risk_ceiling_pct);

        let balance = match client.get_balance() {
            Ok(balance) => balance,
            Err(err) => return self.fail_call(user, Decimal::ZERO, "balance read", &err),
        };

        let Some(size) = scale_notional(fill.notional, fill.master_balance_at_fill, balance, ceiling)
        else {
            return skipped(user, Decimal::ZERO, "master balance at fill is not positive");
        };
        if size.notional <= Decimal::ZERO || size.notional < self.settings.min_notional {
            return skipped(
                user,
                size.notional,
                &format!("scaled notional {} below minimum", size.notional.round_dp(2)),
            );
        }

        let (operation, notional) = match self.user_operation(fill, subscriber, size.notional) {
            Ok(classified) => classified,
            Err(err) => return self.fail_call(user, size.notional, "position read", &err),
        };

        let order = ReplicationOrder {
            source_order_id: fill.source_order_id.clone(),
            symbol: fill.symbol.clone(),
            side: fill.side,
            master_notional: fill.notional,
            target_account: user.clone(),
            scaled_notional: notional,
            risk_ceiling_pct: ceiling,
            capped: size.capped,
        };

        let decision = self.machine.can_trade_for(user, operation);
        if !decision.allowed {
            debug!(user = %user, reason = %decision.reason, "Replication blocked");
            return skipped(user, order.scaled_notional, &decision.reason);
        }

        debug!(
            user = %user,
            symbol = %order.symbol,
            side = %order.side,
            proportional = %size.proportional.round_dp(4),
            scaled = %order.scaled_notional.round_dp(4),
            capped = order.capped,
            "Submitting replicated order"
        );
        match client.place_order(&order.symbol, order.side, order.scaled_notional) {
            Ok(result) if result.status.has_fill() => {
                let (status, reason) = if order.capped {
                    (
                        ReplicationStatus::Capped,
                        format!(
                            "clamped from {} to {}% ceiling",
                            size.proportional.round_dp(2),
                            (ceiling * Decimal::ONE_HUNDRED).normalize()
                        ),
                    )
                } else {
                    (ReplicationStatus::Filled, "filled".to_string())
                };
                ReplicationResult {
                    user_id: user.clone(),
                    status,
                    scaled_notional: order.scaled_notional,
                    reason,
                    order_id: Some(result.order_id),
                }
            }
            Ok(result) => {
                let mut failed = self.fail(
                    user,
                    order.scaled_notional,
                    format!("order {} ended {:?}", result.order_id, result.status),
                );
                failed.order_id = Some(result.order_id);
                failed
            }
            Err(err) => self.fail_call(user, order.scaled_notional, "order", &err),
        }
    }

    /// The operation this copy is for the user, and the notional to send.
    ///
    /// A master entry is always an entry. A master exit is an exit only
    /// where it closes an opposing user position, and is then cut to that
    /// position's size. Anything else would open new exposure and is an
    /// entry.
    fn user_operation(
        &self,
        fill: &FillEvent,
        subscriber: &Subscriber,
        notional: Decimal,
    ) -> Result<(TradeOperation, Decimal), SequenceError> {
        if fill.operation != TradeOperation::Exit {
            return Ok((TradeOperation::Entry, notional));
        }
        let positions = subscriber.client.get_open_positions()?;
        let signal = Signal {
            side: fill.side,
            confidence: Decimal::ONE,
            target_notional: notional,
        };
        if signal.operation_against(&fill.symbol, &positions) != TradeOperation::Exit {
            return Ok((TradeOperation::Entry, notional));
        }
        let open: Decimal = positions
            .iter()
            .filter(|p| p.symbol == fill.symbol && p.side == fill.side.opposite())
            .map(|p| p.notional)
            .sum();
        Ok((TradeOperation::Exit, notional.min(open)))
    }

    /// Failed result for an error returned by the client.
    ///
    /// The client already reports final broker and store errors to the
    /// machine. Sequence exhaustion is not a safety failure and is never
    /// recorded.
    fn fail_call(
        &self,
        user: &AccountKey,
        notional: Decimal,
        what: &str,
        err: &SequenceError,
    ) -> ReplicationResult {
        let reason = format!("{what} failed: {err}");
        if matches!(err, SequenceError::InvalidAccountId(_)) {
            return self.fail(user, notional, reason);
        }
        warn!(user = %user, error = %err, "Replication failed");
        failed(user, notional, reason)
    }

    /// Failed result with a matching failure record for `user`.
    fn fail(&self, user: &AccountKey, notional: Decimal, reason: String) -> ReplicationResult {
        warn!(user = %user, reason = %reason, "Replication failed");
        if let Err(err) = self
            .machine
            .record_failure(Some(user), FailureCategory::Replication, &reason)
        {
            error!(user = %user, error = %err, "Failed to record replication failure");
        }
        failed(user, notional, reason)
    }
}

fn skipped(user: &AccountKey, notional: Decimal, reason: &str) -> ReplicationResult {
    ReplicationResult {
        user_id: user.clone(),
        status: ReplicationStatus::Skipped,
        scaled_notional: notional,
        reason: reason.to_string(),
        order_id: None,
    }
}

fn failed(user: &AccountKey, notional: Decimal, reason: String) -> ReplicationResult {
    ReplicationResult {
        user_id: user.clone(),
        status: ReplicationStatus::Failed,
        scaled_notional: notional,
        reason,
        order_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::outbound::store::MemoryStore;
    use crate::application::safety::SafetyLimits;
    use crate::application::sequence::{SequenceAllocator, SequencePolicy};
    use crate::domain::{
        AccountRole, OrderRequest, OrderResult, OrderSide, OrderStatus, Position, SafetyState,
    };
    use crate::error::BrokerError;
    use crate::port::outbound::broker::{Broker, RequestContext};
    use crate::port::outbound::clock::SystemClock;
    use chrono::Utc;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    /// Fixed balance; records every order notional.
    struct FixedBroker {
        balance: Decimal,
        fail_orders: Option<BrokerError>,
        panic_orders: bool,
        orders: Mutex<Vec<Decimal>>,
    }

    impl FixedBroker {
        fn new(balance: Decimal) -> Self {
            Self {
                balance,
                fail_orders: None,
                panic_orders: false,
                orders: Mutex::new(Vec::new()),
            }
        }
    }

    impl Broker for FixedBroker {
        fn name(&self) -> &str {
            "fixed"
        }

        fn place_order(
            &self,
            _ctx: &RequestContext,
            order: &OrderRequest,
        ) -> Result<OrderResult, BrokerError> {
            assert!(!self.panic_orders, "adapter bug");
            if let Some(err) = &self.fail_orders {
                return Err(err.clone());
            }
            self.orders.lock().push(order.notional);
            Ok(OrderResult {
                order_id: format!("o-{}", order.client_order_id),
                status: OrderStatus::Filled,
                filled_notional: order.notional,
                filled_price: dec!(1),
            })
        }

        fn get_balance(&self, _ctx: &RequestContext) -> Result<Decimal, BrokerError> {
            Ok(self.balance)
        }

        fn get_open_positions(&self, _ctx: &RequestContext) -> Result<Vec<Position>, BrokerError> {
            Ok(Vec::new())
        }
    }

    struct Fixture {
        machine: Arc<CapitalSafetyStateMachine>,
        allocator: Arc<SequenceAllocator>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            Self {
                machine: Arc::new(
                    CapitalSafetyStateMachine::restore(store.clone(), SafetyLimits::default())
                        .unwrap(),
                ),
                allocator: Arc::new(SequenceAllocator::new(store, Arc::new(SystemClock))),
            }
        }

        fn subscriber(&self, id: &str, broker: Arc<FixedBroker>) -> Subscriber {
            let key = AccountKey::for_role(&AccountRole::User(id.into())).unwrap();
            let policy = SequencePolicy {
                min_call_interval: Duration::ZERO,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                ..SequencePolicy::default()
            };
            let client = SequencedAccountClient::new(key, broker, self.allocator.clone(), policy)
                .with_failure_sink(self.machine.clone());
            Subscriber::new(Arc::new(client))
        }

        fn engine(&self, ceiling: Decimal) -> TradeReplicationEngine {
            TradeReplicationEngine::new(
                self.machine.clone(),
                ReplicationSettings {
                    risk_ceiling_pct: ceiling,
                    ..ReplicationSettings::default()
                },
            )
        }
    }

    fn fill() -> FillEvent {
        FillEvent {
            source_order_id: "m-1".into(),
            symbol: "BTC-USD".into(),
            side: OrderSide::Buy,
            notional: dec!(1000),
            master_balance_at_fill: dec!(10000),
            operation: TradeOperation::Entry,
            filled_at: Utc::now(),
        }
    }

    #[test]
    fn test_proportional_fill_at_ceiling() {
        let fx = Fixture::new();
        let broker = Arc::new(FixedBroker::new(dec!(1000)));
        let report = fx
            .engine(dec!(0.10))
            .replicate(&fill(), &[fx.subscriber("a", broker.clone())]);
        let result = &report.results[0];
        assert_eq!(result.status, ReplicationStatus::Filled);
        assert_eq!(result.scaled_notional, dec!(100));
        assert_eq!(*broker.orders.lock(), vec![dec!(100)]);
    }

    #[test]
    fn test_clamped_to_ceiling_is_capped() {
        let fx = Fixture::new();
        let broker = Arc::new(FixedBroker::new(dec!(500)));
        let report = fx
            .engine(dec!(0.01))
            .replicate(&fill(), &[fx.subscriber("b", broker.clone())]);
        let result = &report.results[0];
        assert_eq!(result.status, ReplicationStatus::Capped);
        assert_eq!(result.scaled_notional, dec!(5));
        assert_eq!(report.summary.capped, 1);
    }

    #[test]
    fn test_subscriber_override_ceiling() {
        let fx = Fixture::new();
        let broker = Arc::new(FixedBroker::new(dec!(1000)));
        let sub = fx.subscriber("c", broker).with_ceiling(dec!(0.02));
        let report = fx.engine(dec!(0.10)).replicate(&fill(), &[sub]);
        assert_eq!(report.results[0].scaled_notional, dec!(20));
        assert_eq!(report.results[0].status, ReplicationStatus::Capped);
    }

    #[test]
    fn test_failure_is_isolated_to_one_subscriber() {
        let fx = Fixture::new();
        let mut bad = FixedBroker::new(dec!(1000));
        bad.fail_orders = Some(BrokerError::Authentication("revoked".into()));
        let good = Arc::new(FixedBroker::new(dec!(1000)));
        let bad_sub = fx.subscriber("bad", Arc::new(bad));
        let bad_key = bad_sub.account().clone();

        let report = fx
            .engine(dec!(0.10))
            .replicate(&fill(), &[bad_sub, fx.subscriber("good", good.clone())]);

        assert_eq!(report.results[0].status, ReplicationStatus::Failed);
        assert_eq!(report.results[1].status, ReplicationStatus::Filled);
        assert!(report.summary.is_partial_failure());
        assert_eq!(good.orders.lock().len(), 1);

        let record = fx.machine.snapshot();
        assert_eq!(record.failure_count, 1);
        assert_eq!(record.failure_count_for(&bad_key), 1);
    }

    #[test]
    fn test_panic_becomes_failed_result() {
        let fx = Fixture::new();
        let mut broken = FixedBroker::new(dec!(1000));
        broken.panic_orders = true;
        let good = Arc::new(FixedBroker::new(dec!(1000)));
        let report = fx.engine(dec!(0.10)).replicate(
            &fill(),
            &[
                fx.subscriber("broken", Arc::new(broken)),
                fx.subscriber("fine", good),
            ],
        );
        assert_eq!(report.results[0].status, ReplicationStatus::Failed);
        assert!(report.results[0].reason.contains("panicked"));
        assert_eq!(report.results[1].status, ReplicationStatus::Filled);
    }

    #[test]
    fn test_blocked_user_is_skipped_while_master_normal() {
        let fx = Fixture::new();
        let sub = fx.subscriber("held", Arc::new(FixedBroker::new(dec!(1000))));
        fx.machine
            .force_account_transition(sub.account(), SafetyState::SafeMode, "review")
            .unwrap();

        let report = fx.engine(dec!(0.10)).replicate(&fill(), &[sub]);
        assert_eq!(report.results[0].status, ReplicationStatus::Skipped);
        assert!(report.results[0].reason.contains("SAFE_MODE"));
        assert_eq!(fx.machine.state(), SafetyState::Normal);
    }

    #[test]
    fn test_disabled_engine_skips_everyone() {
        let fx = Fixture::new();
        let broker = Arc::new(FixedBroker::new(dec!(1000)));
        let engine = TradeReplicationEngine::new(
            fx.machine.clone(),
            ReplicationSettings {
                enabled: false,
                ..ReplicationSettings::default()
            },
        );
        let report = engine.replicate(&fill(), &[fx.subscriber("d", broker.clone())]);
        assert_eq!(report.results[0].status, ReplicationStatus::Skipped);
        assert!(broker.orders.lock().is_empty());
    }
}
