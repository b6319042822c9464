//! Per-account trading loop.
//!
//! A worker owns exactly one account's client. Each cycle it reads capital,
//! asks the safety machine for permission per signal, submits allowed
//! orders through its own client and, on the master, hands fills to the
//! replication engine. It never touches another account's client.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::replication::{Subscriber, TradeReplicationEngine};
use super::safety::CapitalSafetyStateMachine;
use super::sequence::SequencedAccountClient;
use crate::domain::{
    Account, FillEvent, OrderResult, ReplicationReport, Signal, TradeDecision, TradeOperation,
};
use crate::port::inbound::operator::ConnectionState;
use crate::port::outbound::feed::MarketFeed;
use crate::port::outbound::strategy::Strategy;

/// Stop flag shared by all workers, with an interruptible sleep.
#[derive(Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleep up to `timeout`. Returns true if stopped.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            let _ = self.wake.wait_for(&mut stopped, timeout);
        }
        *stopped
    }
}

/// Worker-side metrics for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStatus {
    pub connection: ConnectionState,
    pub balance: Option<Decimal>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub cycles: u64,
    pub orders_submitted: u64,
    pub consecutive_errors: u32,
    pub last_error: Option<String>,
    pub last_block_reason: Option<String>,
}

/// What one cycle did.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub orders: Vec<OrderResult>,
    pub blocked: Vec<TradeDecision>,
    pub replications: Vec<ReplicationReport>,
    pub errors: Vec<String>,
}

/// Master-only fan-out wiring.
pub struct Replication {
    pub engine: Arc<TradeReplicationEngine>,
    pub subscribers: Vec<Subscriber>,
}

/// Loop bound to one (broker, account) pair.
pub struct AccountWorker {
    account: Account,
    client: Arc<SequencedAccountClient>,
    machine: Arc<CapitalSafetyStateMachine>,
    strategy: Arc<dyn Strategy>,
    feed: Arc<dyn MarketFeed>,
    symbols: Vec<String>,
    replication: Option<Replication>,
    status: Mutex<WorkerStatus>,
}

impl AccountWorker {
    pub fn new(
        account: Account,
        client: Arc<SequencedAccountClient>,
        machine: Arc<CapitalSafetyStateMachine>,
        strategy: Arc<dyn Strategy>,
        feed: Arc<dyn MarketFeed>,
        symbols: Vec<String>,
    ) -> Self {
        Self {
            account,
            client,
            machine,
            strategy,
            feed,
            symbols,
            replication: None,
            status: Mutex::new(WorkerStatus::default()),
        }
    }

    /// Fan master fills out through `replication`. Ignored for users.
    #[must_use]
    pub fn with_replication(mut self, replication: Replication) -> Self {
        if self.account.role.is_master() {
            self.replication = Some(replication);
        }
        self
    }

    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }

    #[must_use]
    pub fn status(&self) -> WorkerStatus {
        self.status.lock().clone()
    }

    /// Run cycles until `stop` fires. Sleeps `interval` between cycles.
    pub fn run(&self, stop: &StopSignal, interval: Duration) {
        info!(
            account = %self.account.key,
            broker = self.client.broker_name(),
            strategy = self.strategy.name(),
            symbols = self.symbols.len(),
            "Worker started"
        );
        while !stop.is_stopped() {
            self.run_cycle();
            if stop.wait(interval) {
                break;
            }
        }
        self.status.lock().connection = ConnectionState::Stopped;
        info!(account = %self.account.key, "Worker stopped");
    }

    /// Run one cycle.
    pub fn run_cycle(&self) -> CycleOutcome {
        let key = &self.account.key;
        let mut outcome = CycleOutcome::default();

        let balance = match self.client.get_balance() {
            Ok(balance) => balance,
            Err(err) => {
                warn!(account = %key, error = %err, "Balance read failed");
                outcome.errors.push(format!("balance read failed: {err}"));
                self.finish_cycle(None, &outcome, ConnectionState::Disconnected);
                return outcome;
            }
        };
        let positions = match self.client.get_open_positions() {
            Ok(positions) => positions,
            Err(err) => {
                warn!(account = %key, error = %err, "Position read failed");
                outcome.errors.push(format!("position read failed: {err}"));
                self.finish_cycle(Some(balance), &outcome, ConnectionState::Degraded);
                return outcome;
            }
        };
        if let Err(err) = self.machine.assess(key, balance, positions.len()) {
            error!(account = %key, error = %err, "Capital assessment not persisted");
        }

        for symbol in &self.symbols {
            let market = match self.feed.latest(symbol) {
                Ok(Some(market)) => market,
                Ok(None) => continue,
                Err(err) => {
                    warn!(account = %key, symbol = %symbol, error = %err, "Market data unavailable");
                    outcome.errors.push(format!("{symbol}: market data: {err}"));
                    continue;
                }
            };
            let signal = match self.strategy.evaluate(symbol, &market) {
                Ok(Some(signal)) => signal,
                Ok(None) => continue,
                Err(err) => {
                    warn!(account = %key, symbol = %symbol, error = %err, "Strategy failed");
                    outcome.errors.push(format!("{symbol}: strategy: {err}"));
                    continue;
                }
            };
            if signal.target_notional <= Decimal::ZERO {
                continue;
            }

            let operation = signal.operation_against(symbol, &positions);
            let decision = self.machine.can_trade_for(key, operation);
            if !decision.allowed {
                info!(
                    account = %key,
                    symbol = %symbol,
                    operation = %operation,
                    reason = %decision.reason,
                    "Order blocked"
                );
                outcome.blocked.push(decision);
                continue;
            }

            match self
                .client
                .place_order(symbol, signal.side, signal.target_notional)
            {
                Ok(result) => {
                    debug!(
                        account = %key,
                        symbol = %symbol,
                        order_id = %result.order_id,
                        status = ?result.status,
                        filled = %result.filled_notional,
                        "Order submitted"
                    );
                    if result.status.has_fill() {
                        if let Some(report) =
                            self.replicate(symbol, &signal, &result, balance, operation)
                        {
                            outcome.replications.push(report);
                        }
                    }
                    outcome.orders.push(result);
                }
                Err(err) => {
                    warn!(account = %key, symbol = %symbol, error = %err, "Order failed");
                    outcome.errors.push(format!("{symbol}: order: {err}"));
                }
            }
        }

        let connection = if !outcome.errors.is_empty() {
            ConnectionState::Degraded
        } else if !outcome.blocked.is_empty() {
            ConnectionState::Blocked
        } else {
            ConnectionState::Connected
        };
        self.finish_cycle(Some(balance), &outcome, connection);
        outcome
    }

    fn replicate(
        &self,
        symbol: &str,
        signal: &Signal,
        result: &OrderResult,
        balance: Decimal,
        operation: TradeOperation,
    ) -> Option<ReplicationReport> {
        let replication = self.replication.as_ref()?;
        if replication.subscribers.is_empty() {
            return None;
        }
        let fill = FillEvent {
            source_order_id: result.order_id.clone(),
            symbol: symbol.to_string(),
            side: signal.side,
            notional: result.filled_notional,
            master_balance_at_fill: balance,
            operation,
            filled_at: Utc::now(),
        };
        Some(replication.engine.replicate(&fill, &replication.subscribers))
    }

    fn finish_cycle(
        &self,
        balance: Option<Decimal>,
        outcome: &CycleOutcome,
        connection: ConnectionState,
    ) {
        let mut status = self.status.lock();
        status.cycles += 1;
        status.last_cycle_at = Some(Utc::now());
        status.connection = connection;
        if balance.is_some() {
            status.balance = balance;
        }
        status.orders_submitted += outcome.orders.len() as u64;
        if let Some(blocked) = outcome.blocked.last() {
            status.last_block_reason = Some(blocked.reason.clone());
        }
        if let Some(err) = outcome.errors.last() {
            status.consecutive_errors += 1;
            status.last_error = Some(err.clone());
        } else {
            status.consecutive_errors = 0;
        }
    }
}
