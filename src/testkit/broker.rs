//! Scripted multi-account broker.
//!
//! One instance serves any number of accounts, keyed by the account in the
//! request context. Behaviour is scripted up front:
//!
//! - balances are fixed per account until changed with `set_balance`;
//! - failures queued with `fail_next` are returned in order, one per call
//!   to the named operation, before normal behaviour resumes;
//! - with `enforce_sequence`, a sequence not above the last accepted one
//!   for that account is rejected the way an exchange would.

use std::collections::{HashMap, VecDeque};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::domain::{AccountKey, OrderRequest, OrderResult, OrderStatus, Position};
use crate::error::BrokerError;
use crate::port::outbound::broker::{Broker, RequestContext};

/// Broker operations a failure can be queued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    PlaceOrder,
    GetBalance,
    GetPositions,
}

/// A call that reached the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub account: AccountKey,
    pub operation: Operation,
    pub sequence: u64,
}

#[derive(Default)]
struct Book {
    balances: HashMap<AccountKey, Decimal>,
    positions: HashMap<AccountKey, Vec<Position>>,
    failures: HashMap<(AccountKey, Operation), VecDeque<BrokerError>>,
    last_sequence: HashMap<AccountKey, u64>,
    calls: Vec<Call>,
    orders: Vec<(AccountKey, OrderRequest)>,
}

pub struct ScriptedBroker {
    name: String,
    book: Mutex<Book>,
    enforce_sequence: bool,
    latency: Duration,
    order_status: OrderStatus,
}

impl Default for ScriptedBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBroker {
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            book: Mutex::new(Book::default()),
            enforce_sequence: false,
            latency: Duration::ZERO,
            order_status: OrderStatus::Filled,
        }
    }

    /// Reject non-increasing sequences per account.
    pub fn enforce_sequence(mut self) -> Self {
        self.enforce_sequence = true;
        self
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Status reported for every accepted order.
    pub fn with_order_status(mut self, status: OrderStatus) -> Self {
        self.order_status = status;
        self
    }

    pub fn with_balance(self, account: &AccountKey, balance: Decimal) -> Self {
        self.set_balance(account, balance);
        self
    }

    pub fn set_balance(&self, account: &AccountKey, balance: Decimal) {
        self.book.lock().balances.insert(account.clone(), balance);
    }

    pub fn set_positions(&self, account: &AccountKey, positions: Vec<Position>) {
        self.book.lock().positions.insert(account.clone(), positions);
    }

    /// Queue `errors` for the next calls of `operation` on `account`.
    pub fn fail_next(&self, account: &AccountKey, operation: Operation, errors: Vec<BrokerError>) {
        self.book
            .lock()
            .failures
            .entry((account.clone(), operation))
            .or_default()
            .extend(errors);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.book.lock().calls.clone()
    }

    /// Sequences seen for `account`, in arrival order.
    pub fn sequences(&self, account: &AccountKey) -> Vec<u64> {
        self.book
            .lock()
            .calls
            .iter()
            .filter(|c| &c.account == account)
            .map(|c| c.sequence)
            .collect()
    }

    /// Accepted orders as `(account, request)`.
    pub fn orders(&self) -> Vec<(AccountKey, OrderRequest)> {
        self.book.lock().orders.clone()
    }

    pub fn orders_for(&self, account: &AccountKey) -> Vec<OrderRequest> {
        self.book
            .lock()
            .orders
            .iter()
            .filter(|(a, _)| a == account)
            .map(|(_, o)| o.clone())
            .collect()
    }

    fn enter(&self, ctx: &RequestContext, operation: Operation) -> Result<(), BrokerError> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let mut book = self.book.lock();
        book.calls.push(Call {
            account: ctx.account.clone(),
            operation,
            sequence: ctx.sequence,
        });

        if self.enforce_sequence {
            let last = book.last_sequence.get(&ctx.account).copied().unwrap_or(0);
            if ctx.sequence <= last {
                return Err(BrokerError::SequenceRejected(format!(
                    "sequence {} not above {last}",
                    ctx.sequence
                )));
            }
            book.last_sequence.insert(ctx.account.clone(), ctx.sequence);
        }

        if let Some(queue) = book.failures.get_mut(&(ctx.account.clone(), operation)) {
            if let Some(err) = queue.pop_front() {
                return Err(err);
            }
        }
        Ok(())
    }
}

impl Broker for ScriptedBroker {
    fn name(&self) -> &str {
        &self.name
    }

    fn place_order(
        &self,
        ctx: &RequestContext,
        order: &OrderRequest,
    ) -> Result<OrderResult, BrokerError> {
        self.enter(ctx, Operation::PlaceOrder)?;
        let mut book = self.book.lock();
        book.orders.push((ctx.account.clone(), order.clone()));
        let filled = if self.order_status.has_fill() {
            order.notional
        } else {
            Decimal::ZERO
        };
        Ok(OrderResult {
            order_id: format!("{}-{}", ctx.account, book.orders.len()),
            status: self.order_status,
            filled_notional: filled,
            filled_price: Decimal::ONE,
        })
    }

    fn get_balance(&self, ctx: &RequestContext) -> Result<Decimal, BrokerError> {
        self.enter(ctx, Operation::GetBalance)?;
        Ok(self
            .book
            .lock()
            .balances
            .get(&ctx.account)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    fn get_open_positions(&self, ctx: &RequestContext) -> Result<Vec<Position>, BrokerError> {
        self.enter(ctx, Operation::GetPositions)?;
        Ok(self
            .book
            .lock()
            .positions
            .get(&ctx.account)
            .cloned()
            .unwrap_or_default())
    }
}
