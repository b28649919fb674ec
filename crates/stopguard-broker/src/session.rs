//! Broker Session abstraction.
//!
//! The reconciliation cycle, the price streamer and the order dispatcher all
//! talk to the brokerage through [`BrokerSession`]. This allows for:
//! - Dependency injection of [`crate::MockBroker`] in tests
//! - Keeping authentication and HTTP details out of business logic

use std::pin::Pin;
use std::sync::Arc;

use stopguard_core::{OrderSpec, Price};

use crate::error::BrokerResult;
use crate::wire::{RawOrderStrategy, RawPosition};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Positions as returned by the account endpoint.
pub type PositionSnapshot = Vec<RawPosition>;

/// Top-level order strategies as returned by the account endpoint.
pub type OrderBookSnapshot = Vec<RawOrderStrategy>;

/// Acknowledgement of an accepted order placement or replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    /// HTTP status of the accepted request.
    pub status: u16,
    /// Id of the new order, when the broker reported one.
    pub order_id: Option<String>,
}

impl OrderAck {
    /// Order id or a placeholder for logs and notifications.
    #[must_use]
    pub fn display_id(&self) -> &str {
        self.order_id.as_deref().unwrap_or("unknown")
    }
}

/// Brokerage operations consumed by the monitor.
pub trait BrokerSession: Send + Sync {
    /// Current account positions.
    fn fetch_positions<'a>(&'a self, account_id: &'a str)
        -> BoxFuture<'a, BrokerResult<PositionSnapshot>>;

    /// Current order book.
    fn fetch_orders<'a>(&'a self, account_id: &'a str)
        -> BoxFuture<'a, BrokerResult<OrderBookSnapshot>>;

    /// Place a new order.
    fn submit_order<'a>(
        &'a self,
        account_id: &'a str,
        spec: &'a OrderSpec,
    ) -> BoxFuture<'a, BrokerResult<OrderAck>>;

    /// Replace an existing order with `spec`.
    fn replace_order<'a>(
        &'a self,
        account_id: &'a str,
        existing_id: &'a str,
        spec: &'a OrderSpec,
    ) -> BoxFuture<'a, BrokerResult<OrderAck>>;

    /// Cancel an existing order.
    fn cancel_order<'a>(
        &'a self,
        account_id: &'a str,
        order_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<()>>;

    /// Latest price of an underlying (e.g. `$SPX.X`).
    fn fetch_underlying_quote<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, BrokerResult<Price>>;
}

/// Arc wrapper for BrokerSession trait objects.
pub type DynBrokerSession = Arc<dyn BrokerSession>;

/// Extract the order id from an order endpoint `Location` header
/// (`.../accounts/{account}/orders/{orderId}`).
#[must_use]
pub fn extract_order_id(location: &str) -> Option<String> {
    let id = location.trim().trim_end_matches('/').rsplit('/').next()?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(id.to_string())
}
