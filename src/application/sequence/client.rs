//! Per-account sequenced exchange client.
//!
//! Every exchange call for one account runs inside a single reentrant
//! critical section that spans sequence generation, persistence and
//! transmission. Two threads calling the same account can never interleave
//! between "allocate" and "send", so the exchange always sees the account's
//! sequence numbers in increasing order.
//!
//! Error handling per attempt:
//!
//! | Error | Action | Recorded as failure |
//! |---|---|---|
//! | sequence rejected | jump counter, back off, retry up to `max_attempts` | no |
//! | transient / timeout | back off, retry up to `transient_max_attempts` | yes, once exhausted |
//! | authentication | return immediately | yes |
//! | order rejected / other | return immediately | yes |
//!
//! A timeout never rolls the counter back: the exchange may have processed
//! the request.

use std::cell::Cell;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::{Mutex, ReentrantMutex};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::allocator::SequenceAllocator;
use super::policy::SequencePolicy;
use crate::domain::{
    AccountKey, FailureCategory, FailureRecord, OrderRequest, OrderResult, OrderSide, Position,
};
use crate::error::{BrokerError, SequenceError};
use crate::port::outbound::broker::{Broker, RequestContext};

/// Receiver for execution faults.
pub trait FailureSink: Send + Sync {
    fn record(&self, record: FailureRecord);
}

/// Counters describing one client's recent behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub calls: u64,
    pub sequence_rejections: u64,
    /// Calls that returned after their request timeout had passed.
    pub timeout_overruns: u64,
    /// Non-sequence failures since the last successful call.
    pub consecutive_errors: u32,
    pub last_error: Option<String>,
}

/// Exchange client bound to one account.
pub struct SequencedAccountClient {
    account: AccountKey,
    broker: Arc<dyn Broker>,
    allocator: Arc<SequenceAllocator>,
    policy: SequencePolicy,
    failures: Option<Arc<dyn FailureSink>>,
    /// Held for the whole of a call; tracks when the last call finished.
    section: ReentrantMutex<Cell<Option<Instant>>>,
    stats: Mutex<ClientStats>,
}

impl SequencedAccountClient {
    pub fn new(
        account: AccountKey,
        broker: Arc<dyn Broker>,
        allocator: Arc<SequenceAllocator>,
        policy: SequencePolicy,
    ) -> Self {
        Self {
            account,
            broker,
            allocator,
            policy,
            failures: None,
            section: ReentrantMutex::new(Cell::new(None)),
            stats: Mutex::new(ClientStats::default()),
        }
    }

    /// Route final non-sequence failures to `sink`.
    #[must_use]
    pub fn with_failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.failures = Some(sink);
        self
    }

    #[must_use]
    pub fn account(&self) -> &AccountKey {
        &self.account
    }

    #[must_use]
    pub fn broker_name(&self) -> &str {
        self.broker.name()
    }

    #[must_use]
    pub fn policy(&self) -> &SequencePolicy {
        &self.policy
    }

    #[must_use]
    pub fn stats(&self) -> ClientStats {
        self.stats.lock().clone()
    }

    /// Allocate a sequence number for this account outside a call.
    ///
    /// # Errors
    ///
    /// Propagates store failures from the allocator.
    pub fn next_sequence(&self) -> Result<u64, SequenceError> {
        let _section = self.section.lock();
        self.allocator.next_sequence(&self.account)
    }

    /// Run `op` against the broker with a fresh sequence number per attempt.
    ///
    /// `op` may call back into this client on the same thread.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Exhausted`] when the exchange keeps
    /// rejecting sequences, otherwise the final broker or store error.
    pub fn call<T, F>(&self, operation: &'static str, mut op: F) -> Result<T, SequenceError>
    where
        F: FnMut(&dyn Broker, &RequestContext) -> Result<T, BrokerError>,
    {
        let section = self.section.lock();
        let mut sequence_attempts: u32 = 0;
        let mut transient_attempts: u32 = 0;

        loop {
            if let Some(last) = section.get() {
                let elapsed = last.elapsed();
                if elapsed < self.policy.min_call_interval {
                    thread::sleep(self.policy.min_call_interval - elapsed);
                }
            }

            let sequence = match self.allocator.next_sequence(&self.account) {
                Ok(sequence) => sequence,
                Err(err) => {
                    self.note_failure(operation, FailureCategory::Persistence, err.to_string());
                    return Err(err);
                }
            };
            let ctx = RequestContext {
                account: self.account.clone(),
                sequence,
                timeout: self.policy.request_timeout,
            };

            let sent_at = Instant::now();
            let result = op(self.broker.as_ref(), &ctx);
            let took = sent_at.elapsed();
            section.set(Some(Instant::now()));
            {
                let mut stats = self.stats.lock();
                stats.calls += 1;
                if took > ctx.timeout {
                    stats.timeout_overruns += 1;
                }
            }
            if took > ctx.timeout {
                warn!(
                    account = %self.account,
                    broker = self.broker.name(),
                    operation,
                    took_ms = took.as_millis() as u64,
                    timeout_ms = ctx.timeout.as_millis() as u64,
                    "Broker call overran its request timeout"
                );
            }

            match result {
                Ok(value) => {
                    let mut stats = self.stats.lock();
                    stats.consecutive_errors = 0;
                    return Ok(value);
                }
                Err(err) if err.is_sequence_rejection() => {
                    sequence_attempts += 1;
                    self.stats.lock().sequence_rejections += 1;
                    // jump before any delay
                    self.allocator.jump(&self.account, self.policy.jump_margin)?;
                    if sequence_attempts >= self.policy.max_attempts {
                        warn!(
                            account = %self.account,
                            operation,
                            attempts = sequence_attempts,
                            "Sequence still rejected, giving up"
                        );
                        return Err(SequenceError::Exhausted {
                            attempts: sequence_attempts,
                        });
                    }
                    let delay = self.policy.backoff(sequence_attempts - 1);
                    warn!(
                        account = %self.account,
                        operation,
                        sequence,
                        attempt = sequence_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Sequence rejected, retrying after jump"
                    );
                    thread::sleep(delay);
                }
                Err(err) if err.is_retryable() => {
                    transient_attempts += 1;
                    if transient_attempts >= self.policy.transient_max_attempts {
                        return Err(self.fail(operation, err));
                    }
                    let delay = self.policy.backoff(transient_attempts - 1);
                    debug!(
                        account = %self.account,
                        operation,
                        attempt = transient_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient broker error, retrying"
                    );
                    thread::sleep(delay);
                }
                Err(err) => return Err(self.fail(operation, err)),
            }
        }
    }

    fn fail(&self, operation: &'static str, err: BrokerError) -> SequenceError {
        let category = FailureCategory::from_broker_error(&err);
        self.note_failure(operation, category, err.to_string());
        SequenceError::Broker(err)
    }

    fn note_failure(&self, operation: &'static str, category: FailureCategory, detail: String) {
        {
            let mut stats = self.stats.lock();
            stats.consecutive_errors = stats.consecutive_errors.saturating_add(1);
            stats.last_error = Some(detail.clone());
        }
        warn!(
            account = %self.account,
            operation,
            category = %category,
            error = %detail,
            "Exchange call failed"
        );
        if let Some(sink) = &self.failures {
            sink.record(FailureRecord::new(
                Some(self.account.clone()),
                category,
                format!("{operation}: {detail}"),
            ));
        }
    }

    /// Place a market order. The client order id is shared by all retries.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        notional: Decimal,
    ) -> Result<OrderResult, SequenceError> {
        let order = OrderRequest {
            client_order_id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            notional,
        };
        self.call("place_order", |broker, ctx| broker.place_order(ctx, &order))
    }

    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn get_balance(&self) -> Result<Decimal, SequenceError> {
        self.call("get_balance", |broker, ctx| broker.get_balance(ctx))
    }

    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn get_open_positions(&self) -> Result<Vec<Position>, SequenceError> {
        self.call("get_open_positions", |broker, ctx| {
            broker.get_open_positions(ctx)
        })
    }
}
