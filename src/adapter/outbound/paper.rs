//! In-memory paper trading.
//!
//! [`PaperBroker`] fills every order immediately at a static price and
//! keeps cash and positions per account. Reported balance is equity: cash
//! plus position notional, so with static prices it only moves when
//! reconfigured. [`StaticFeed`] serves the same prices as market data.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::{AccountKey, MarketData, OrderRequest, OrderResult, OrderStatus, Position};
use crate::error::BrokerError;
use crate::port::outbound::broker::{Broker, RequestContext};
use crate::port::outbound::feed::MarketFeed;

#[derive(Debug, Default)]
struct PaperAccount {
    cash: Decimal,
    positions: HashMap<String, Position>,
}

impl PaperAccount {
    fn equity(&self) -> Decimal {
        self.cash + self.positions.values().map(|p| p.notional).sum::<Decimal>()
    }

    fn spend(&mut self, notional: Decimal) -> Result<(), BrokerError> {
        if notional > self.cash {
            return Err(BrokerError::OrderRejected(format!(
                "insufficient balance: need {notional}, have {}",
                self.cash
            )));
        }
        self.cash -= notional;
        Ok(())
    }

    fn fill(&mut self, order: &OrderRequest, price: Decimal) -> Result<(), BrokerError> {
        let Some(existing) = self.positions.get(&order.symbol).cloned() else {
            self.spend(order.notional)?;
            self.positions.insert(
                order.symbol.clone(),
                Position {
                    symbol: order.symbol.clone(),
                    side: order.side,
                    notional: order.notional,
                    entry_price: price,
                },
            );
            return Ok(());
        };

        if existing.side == order.side {
            self.spend(order.notional)?;
            if let Some(position) = self.positions.get_mut(&order.symbol) {
                position.notional += order.notional;
            }
            return Ok(());
        }

        let reduce = order.notional.min(existing.notional);
        let remainder = order.notional - reduce;
        if remainder > self.cash + reduce {
            return Err(BrokerError::OrderRejected(format!(
                "insufficient balance to flip {}",
                order.symbol
            )));
        }
        self.cash += reduce;
        if reduce == existing.notional {
            self.positions.remove(&order.symbol);
        } else if let Some(position) = self.positions.get_mut(&order.symbol) {
            position.notional -= reduce;
        }
        if remainder > Decimal::ZERO {
            self.spend(remainder)?;
            self.positions.insert(
                order.symbol.clone(),
                Position {
                    symbol: order.symbol.clone(),
                    side: order.side,
                    notional: remainder,
                    entry_price: price,
                },
            );
        }
        Ok(())
    }
}

/// Paper broker serving any number of accounts.
pub struct PaperBroker {
    prices: HashMap<String, Decimal>,
    accounts: Mutex<HashMap<AccountKey, PaperAccount>>,
    next_order: AtomicU64,
}

impl PaperBroker {
    #[must_use]
    pub fn new(prices: HashMap<String, Decimal>) -> Self {
        Self {
            prices,
            accounts: Mutex::new(HashMap::new()),
            next_order: AtomicU64::new(1),
        }
    }

    /// Open (or reset) an account with `balance` in cash.
    pub fn open_account(&self, account: &AccountKey, balance: Decimal) {
        self.accounts.lock().insert(
            account.clone(),
            PaperAccount {
                cash: balance,
                positions: HashMap::new(),
            },
        );
    }

    fn price(&self, symbol: &str) -> Result<Decimal, BrokerError> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| BrokerError::OrderRejected(format!("no price for {symbol}")))
    }
}

fn unknown(account: &AccountKey) -> BrokerError {
    BrokerError::Authentication(format!("unknown paper account {account}"))
}

impl Broker for PaperBroker {
    fn name(&self) -> &str {
        "paper"
    }

    fn place_order(
        &self,
        ctx: &RequestContext,
        order: &OrderRequest,
    ) -> Result<OrderResult, BrokerError> {
        if order.notional <= Decimal::ZERO {
            return Err(BrokerError::OrderRejected(
                "notional must be positive".to_string(),
            ));
        }
        let price = self.price(&order.symbol)?;
        let mut accounts = self.accounts.lock();
        let account = accounts.get_mut(&ctx.account).ok_or_else(|| unknown(&ctx.account))?;
        account.fill(order, price)?;

        let order_id = format!("paper-{}", self.next_order.fetch_add(1, Ordering::Relaxed));
        debug!(
            account = %ctx.account,
            sequence = ctx.sequence,
            order_id = %order_id,
            symbol = %order.symbol,
            side = %order.side,
            notional = %order.notional,
            "Paper fill"
        );
        Ok(OrderResult {
            order_id,
            status: OrderStatus::Filled,
            filled_notional: order.notional,
            filled_price: price,
        })
    }

    fn get_balance(&self, ctx: &RequestContext) -> Result<Decimal, BrokerError> {
        self.accounts
            .lock()
            .get(&ctx.account)
            .map(PaperAccount::equity)
            .ok_or_else(|| unknown(&ctx.account))
    }

    fn get_open_positions(&self, ctx: &RequestContext) -> Result<Vec<Position>, BrokerError> {
        let accounts = self.accounts.lock();
        let account = accounts.get(&ctx.account).ok_or_else(|| unknown(&ctx.account))?;
        let mut positions: Vec<Position> = account.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }
}

/// Market data from a fixed price table.
pub struct StaticFeed {
    prices: HashMap<String, Decimal>,
}

impl StaticFeed {
    #[must_use]
    pub fn new(prices: HashMap<String, Decimal>) -> Self {
        Self { prices }
    }
}

impl MarketFeed for StaticFeed {
    fn latest(&self, symbol: &str) -> Result<Option<MarketData>, BrokerError> {
        Ok(self.prices.get(symbol).map(|price| MarketData {
            symbol: symbol.to_string(),
            price: *price,
            observed_at: Utc::now(),
        }))
    }
}
