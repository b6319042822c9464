//! Broker capability port.
//!
//! One interface per adapter: the core never branches on broker identity.
//! All methods block and are fallible. Every call carries a
//! [`RequestContext`] with the sequence number allocated for it and the
//! timeout the adapter must apply to the underlying request.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::domain::{AccountKey, OrderRequest, OrderResult, Position};
use crate::error::BrokerError;

/// Per-request metadata supplied by the sequenced client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub account: AccountKey,
    /// Strictly increasing per account.
    pub sequence: u64,
    /// Upper bound on the exchange round trip. Expiry maps to
    /// [`BrokerError::Timeout`].
    pub timeout: Duration,
}

/// Exchange operations available for one account.
///
/// Calls run inside the account's critical section, so no other request
/// for that account can be sent until one returns. Implementations must
/// bound every call by `ctx.timeout` and return [`BrokerError::Timeout`]
/// once it expires. The client counts and logs calls that overrun it.
pub trait Broker: Send + Sync {
    /// Adapter identifier, used in logs and status.
    fn name(&self) -> &str;

    /// Submit a market order for `order.notional` in quote currency.
    fn place_order(
        &self,
        ctx: &RequestContext,
        order: &OrderRequest,
    ) -> Result<OrderResult, BrokerError>;

    /// Current account balance in quote currency.
    fn get_balance(&self, ctx: &RequestContext) -> Result<Decimal, BrokerError>;

    fn get_open_positions(&self, ctx: &RequestContext) -> Result<Vec<Position>, BrokerError>;
}
