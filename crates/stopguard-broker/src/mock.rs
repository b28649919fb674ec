//! In-memory broker for tests and dry runs.
//!
//! Serves canned snapshots, records every call, and can be told to fail
//! individual operations.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use stopguard_core::{OrderSpec, Price};

use crate::error::{BrokerError, BrokerResult};
use crate::session::{BoxFuture, BrokerSession, OrderAck, OrderBookSnapshot, PositionSnapshot};

/// A call observed by [`MockBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerCall {
    FetchPositions { account_id: String },
    FetchOrders { account_id: String },
    Submit { account_id: String, spec: OrderSpec },
    Replace { account_id: String, existing_id: String, spec: OrderSpec },
    Cancel { account_id: String, order_id: String },
    FetchQuote { symbol: String },
}

impl BrokerCall {
    /// True for calls that change the order book.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Submit { .. } | Self::Replace { .. } | Self::Cancel { .. }
        )
    }
}

/// Mock broker session.
#[derive(Debug)]
pub struct MockBroker {
    positions: Mutex<PositionSnapshot>,
    orders: Mutex<OrderBookSnapshot>,
    quote: Mutex<Option<Price>>,
    calls: Mutex<Vec<BrokerCall>>,
    /// Symbols whose submissions/replacements are rejected.
    rejected_symbols: Mutex<HashSet<String>>,
    fail_fetches: AtomicBool,
    fail_quotes: AtomicBool,
    fail_cancels: AtomicBool,
    next_order_id: AtomicU64,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBroker {
    /// Create an empty mock broker.
    pub fn new() -> Self {
        Self {
            positions: Mutex::new(Vec::new()),
            orders: Mutex::new(Vec::new()),
            quote: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            rejected_symbols: Mutex::new(HashSet::new()),
            fail_fetches: AtomicBool::new(false),
            fail_quotes: AtomicBool::new(false),
            fail_cancels: AtomicBool::new(false),
            next_order_id: AtomicU64::new(5000),
        }
    }

    /// Replace the position snapshot.
    pub fn set_positions(&self, positions: PositionSnapshot) {
        *self.positions.lock() = positions;
    }

    /// Replace the order book snapshot.
    pub fn set_orders(&self, orders: OrderBookSnapshot) {
        *self.orders.lock() = orders;
    }

    /// Set the underlying quote. `None` makes quote requests fail.
    pub fn set_quote(&self, price: Option<Price>) {
        *self.quote.lock() = price;
    }

    /// Reject submissions and replacements for `symbol`.
    pub fn reject_symbol(&self, symbol: impl Into<String>) {
        self.rejected_symbols.lock().insert(symbol.into());
    }

    /// Make position/order fetches fail with a connectivity error.
    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Make quote fetches fail with a connectivity error.
    pub fn set_fail_quotes(&self, fail: bool) {
        self.fail_quotes.store(fail, Ordering::SeqCst);
    }

    /// Make cancellations fail with a submission error.
    pub fn set_fail_cancels(&self, fail: bool) {
        self.fail_cancels.store(fail, Ordering::SeqCst);
    }

    /// Get recorded calls.
    pub fn calls(&self) -> Vec<BrokerCall> {
        self.calls.lock().clone()
    }

    /// Recorded calls that changed the order book.
    pub fn mutations(&self) -> Vec<BrokerCall> {
        self.calls().into_iter().filter(BrokerCall::is_mutation).collect()
    }

    /// Clear recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: BrokerCall) {
        self.calls.lock().push(call);
    }

    fn check_fetch(&self) -> BrokerResult<()> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(BrokerError::Connectivity("mock: fetch failure".to_string()));
        }
        Ok(())
    }

    fn accept(&self, spec: &OrderSpec) -> BrokerResult<OrderAck> {
        if self.rejected_symbols.lock().contains(&spec.symbol) {
            return Err(BrokerError::Submission {
                status: 400,
                body: format!("mock: rejected {}", spec.symbol),
            });
        }
        let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        Ok(OrderAck {
            status: 201,
            order_id: Some(id.to_string()),
        })
    }
}

impl BrokerSession for MockBroker {
    fn fetch_positions<'a>(
        &'a self,
        account_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<PositionSnapshot>> {
        Box::pin(async move {
            self.record(BrokerCall::FetchPositions {
                account_id: account_id.to_string(),
            });
            self.check_fetch()?;
            Ok(self.positions.lock().clone())
        })
    }

    fn fetch_orders<'a>(
        &'a self,
        account_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<OrderBookSnapshot>> {
        Box::pin(async move {
            self.record(BrokerCall::FetchOrders {
                account_id: account_id.to_string(),
            });
            self.check_fetch()?;
            Ok(self.orders.lock().clone())
        })
    }

    fn submit_order<'a>(
        &'a self,
        account_id: &'a str,
        spec: &'a OrderSpec,
    ) -> BoxFuture<'a, BrokerResult<OrderAck>> {
        Box::pin(async move {
            self.record(BrokerCall::Submit {
                account_id: account_id.to_string(),
                spec: spec.clone(),
            });
            self.accept(spec)
        })
    }

    fn replace_order<'a>(
        &'a self,
        account_id: &'a str,
        existing_id: &'a str,
        spec: &'a OrderSpec,
    ) -> BoxFuture<'a, BrokerResult<OrderAck>> {
        Box::pin(async move {
            self.record(BrokerCall::Replace {
                account_id: account_id.to_string(),
                existing_id: existing_id.to_string(),
                spec: spec.clone(),
            });
            self.accept(spec)
        })
    }

    fn cancel_order<'a>(
        &'a self,
        account_id: &'a str,
        order_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<()>> {
        Box::pin(async move {
            self.record(BrokerCall::Cancel {
                account_id: account_id.to_string(),
                order_id: order_id.to_string(),
            });
            if self.fail_cancels.load(Ordering::SeqCst) {
                return Err(BrokerError::Submission {
                    status: 400,
                    body: format!("mock: cannot cancel {order_id}"),
                });
            }
            Ok(())
        })
    }

    fn fetch_underlying_quote<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, BrokerResult<Price>> {
        Box::pin(async move {
            self.record(BrokerCall::FetchQuote {
                symbol: symbol.to_string(),
            });
            if self.fail_quotes.load(Ordering::SeqCst) {
                return Err(BrokerError::Connectivity("mock: quote failure".to_string()));
            }
            (*self.quote.lock())
                .ok_or_else(|| BrokerError::MalformedResponse(format!("mock: no quote for {symbol}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_records_calls_and_assigns_ids() {
        let broker = MockBroker::new();
        let spec = OrderSpec::buy_to_close_stop("SPXW_061523P4400", 1, Price::new(dec!(5)));

        let first = broker.submit_order("acct", &spec).await.unwrap();
        let second = broker.submit_order("acct", &spec).await.unwrap();
        assert_ne!(first.order_id, second.order_id);

        let calls = broker.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(BrokerCall::is_mutation));
    }

    #[tokio::test]
    async fn test_mock_rejects_symbol() {
        let broker = MockBroker::new();
        broker.reject_symbol("SPXW_061523P4400");
        let spec = OrderSpec::buy_to_close_market("SPXW_061523P4400", 1);

        let err = broker.submit_order("acct", &spec).await.unwrap_err();
        assert!(matches!(err, BrokerError::Submission { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_mock_fetch_failure_is_connectivity() {
        let broker = MockBroker::new();
        broker.set_fail_fetches(true);
        let err = broker.fetch_positions("acct").await.unwrap_err();
        assert!(err.is_connectivity());
    }
}
