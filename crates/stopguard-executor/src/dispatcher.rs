//! Order Dispatcher.
//!
//! Sends a planned action list to the broker one action at a time. A failed
//! action is reported and notified, and the remaining actions still run.
//! The shutdown token is checked before every broker call; once it is
//! cancelled nothing further is sent.

use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use stopguard_broker::DynBrokerSession;
use stopguard_telemetry::{DynNotifier, Metrics, Severity};

use crate::error::{DispatchError, DispatchResult};
use crate::planner::{ActionReason, PlannedAction};

/// Result of one action. `Ok` carries the new order id for submissions and
/// replacements, when the broker reported one.
#[derive(Debug)]
pub struct ActionOutcome {
    pub action: PlannedAction,
    pub result: DispatchResult<Option<String>>,
}

/// Result of one dispatch run.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Outcomes in plan order.
    pub outcomes: Vec<ActionOutcome>,
    /// Actions never sent because shutdown was requested.
    pub not_attempted: usize,
}

impl DispatchReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// True if shutdown interrupted the run.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.not_attempted > 0
    }
}

/// Sends planned actions to the broker.
pub struct Dispatcher {
    broker: DynBrokerSession,
    account_id: String,
    notifier: DynNotifier,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        broker: DynBrokerSession,
        account_id: impl Into<String>,
        notifier: DynNotifier,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            broker,
            account_id: account_id.into(),
            notifier,
            shutdown,
        }
    }

    /// Execute `actions` in order.
    ///
    /// A failed cancel blocks the later submissions for the same symbol so a
    /// quantity correction never doubles up coverage. A failed ITM close
    /// blocks the cancels of that symbol's remaining stops, which stay
    /// working as its only protection.
    pub async fn execute(&self, actions: Vec<PlannedAction>) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut blocked: HashSet<String> = HashSet::new();
        let mut itm_close_failed: HashSet<String> = HashSet::new();
        let total = actions.len();

        for (idx, action) in actions.into_iter().enumerate() {
            if self.shutdown.is_cancelled() {
                report.not_attempted = total - idx;
                warn!(
                    remaining = report.not_attempted,
                    "Shutdown requested, not sending remaining orders"
                );
                break;
            }

            let is_cancel = matches!(action, PlannedAction::Cancel { .. });
            let prerequisite_failed = if is_cancel {
                action.reason() == ActionReason::ItmClose
                    && itm_close_failed.contains(action.symbol())
            } else {
                blocked.contains(action.symbol())
            };
            let result = if prerequisite_failed {
                Err(DispatchError::PrerequisiteFailed {
                    action: action.to_string(),
                    symbol: action.symbol().to_string(),
                })
            } else {
                self.send(&action).await
            };

            match &result {
                Ok(order_id) => {
                    Metrics::order_action(action.kind(), "ok");
                    self.notify_success(&action, order_id.as_deref());
                }
                Err(e) => {
                    let label = if e.is_rejection() { "rejected" } else { "error" };
                    Metrics::order_action(action.kind(), label);
                    error!(action = %action, error = %e, "Order action failed");
                    self.notifier.notify(
                        &format!("FAILED: {action} on {}: {e}", action.symbol()),
                        Severity::Important,
                    );
                    if is_cancel {
                        blocked.insert(action.symbol().to_string());
                    } else if action.reason() == ActionReason::ItmClose {
                        itm_close_failed.insert(action.symbol().to_string());
                    }
                }
            }

            report.outcomes.push(ActionOutcome { action, result });
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            not_attempted = report.not_attempted,
            "Dispatch complete"
        );
        report
    }

    async fn send(&self, action: &PlannedAction) -> DispatchResult<Option<String>> {
        let account = self.account_id.as_str();
        let broker_err = |source| DispatchError::Broker {
            action: action.to_string(),
            source,
        };

        match action {
            PlannedAction::Submit { spec, .. } => self
                .broker
                .submit_order(account, spec)
                .await
                .map(|ack| ack.order_id)
                .map_err(broker_err),
            PlannedAction::Replace {
                existing_id, spec, ..
            } => self
                .broker
                .replace_order(account, existing_id, spec)
                .await
                .map(|ack| ack.order_id)
                .map_err(broker_err),
            PlannedAction::Cancel { order_id, .. } => self
                .broker
                .cancel_order(account, order_id)
                .await
                .map(|()| None)
                .map_err(broker_err),
        }
    }

    fn notify_success(&self, action: &PlannedAction, order_id: Option<&str>) {
        let order_id = order_id.unwrap_or("unknown");
        let (message, severity) = match action {
            PlannedAction::Submit { spec, reason } if *reason == ActionReason::ItmClose => (
                format!(
                    "ITM protection: closing {} x{} at market, order ID: {order_id}",
                    spec.symbol, spec.quantity
                ),
                Severity::Important,
            ),
            PlannedAction::Replace {
                existing_id, spec, ..
            } => (
                format!(
                    "ITM protection: replaced stop {existing_id} with market close of {} x{}, order ID: {order_id}",
                    spec.symbol, spec.quantity
                ),
                Severity::Important,
            ),
            PlannedAction::Submit { spec, .. } => (
                format!("Buy to Close order placed: {spec}, order ID: {order_id}"),
                Severity::Important,
            ),
            PlannedAction::Cancel {
                symbol, order_id, ..
            } => (
                format!("Cancelled stop order {order_id} for {symbol}"),
                Severity::Info,
            ),
        };
        info!(action = %action, order_id = %order_id, "Order action succeeded");
        self.notifier.notify(&message, severity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use stopguard_broker::{BrokerCall, MockBroker};
    use stopguard_core::{OrderSpec, Price};
    use stopguard_telemetry::{MemoryNotifier, NotificationLevel};

    fn dispatcher(
        broker: Arc<MockBroker>,
        notifier: Arc<MemoryNotifier>,
        token: CancellationToken,
    ) -> Dispatcher {
        Dispatcher::new(broker, "acct", notifier, token)
    }

    fn submit(symbol: &str, qty: u32) -> PlannedAction {
        PlannedAction::Submit {
            spec: OrderSpec::buy_to_close_stop(symbol, qty, Price::new(dec!(5))),
            reason: ActionReason::MissingStop,
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_remaining_actions() {
        let broker = Arc::new(MockBroker::new());
        broker.reject_symbol("BAD_P1");
        let notifier = Arc::new(MemoryNotifier::new(NotificationLevel::Important));
        let d = dispatcher(broker.clone(), notifier.clone(), CancellationToken::new());

        let report = d
            .execute(vec![submit("BAD_P1", 1), submit("GOOD_P1", 2)])
            .await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 1);
        assert!(report.outcomes[0].result.as_ref().unwrap_err().is_rejection());
        assert_eq!(broker.mutations().len(), 2);
        assert_eq!(notifier.matching("FAILED").len(), 1);
        assert_eq!(notifier.matching("GOOD_P1").len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_sends_nothing() {
        let broker = Arc::new(MockBroker::new());
        let notifier = Arc::new(MemoryNotifier::new(NotificationLevel::All));
        let token = CancellationToken::new();
        token.cancel();
        let d = dispatcher(broker.clone(), notifier, token);

        let report = d.execute(vec![submit("A_P1", 1), submit("B_P1", 1)]).await;
        assert_eq!(report.not_attempted, 2);
        assert!(report.interrupted());
        assert!(broker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_replace_and_cancel_reach_broker() {
        let broker = Arc::new(MockBroker::new());
        let notifier = Arc::new(MemoryNotifier::new(NotificationLevel::All));
        let d = dispatcher(broker.clone(), notifier.clone(), CancellationToken::new());

        let actions = vec![
            PlannedAction::Replace {
                existing_id: "77".to_string(),
                spec: OrderSpec::buy_to_close_market("S_P4400", 3),
                reason: ActionReason::ItmClose,
            },
            PlannedAction::Cancel {
                symbol: "S_P4400".to_string(),
                order_id: "78".to_string(),
                reason: ActionReason::ItmClose,
            },
        ];
        let report = d.execute(actions).await;
        assert_eq!(report.succeeded(), 2);

        let calls = broker.calls();
        assert!(matches!(&calls[0], BrokerCall::Replace { existing_id, .. } if existing_id == "77"));
        assert!(matches!(&calls[1], BrokerCall::Cancel { order_id, .. } if order_id == "78"));
        assert_eq!(notifier.matching("ITM protection").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_itm_replace_keeps_other_stops() {
        let broker = Arc::new(MockBroker::new());
        broker.reject_symbol("S_P4400");
        let notifier = Arc::new(MemoryNotifier::new(NotificationLevel::Important));
        let d = dispatcher(broker.clone(), notifier.clone(), CancellationToken::new());

        let actions = vec![
            PlannedAction::Replace {
                existing_id: "77".to_string(),
                spec: OrderSpec::buy_to_close_market("S_P4400", 3),
                reason: ActionReason::ItmClose,
            },
            PlannedAction::Cancel {
                symbol: "S_P4400".to_string(),
                order_id: "78".to_string(),
                reason: ActionReason::ItmClose,
            },
            PlannedAction::Submit {
                spec: OrderSpec::buy_to_close_market("T_C4700", 1),
                reason: ActionReason::ItmClose,
            },
        ];
        let report = d.execute(actions).await;

        assert_eq!(report.failed(), 2);
        assert!(report.outcomes[0].result.as_ref().unwrap_err().is_rejection());
        assert!(matches!(
            report.outcomes[1].result,
            Err(DispatchError::PrerequisiteFailed { .. })
        ));
        assert!(report.outcomes[2].result.is_ok());
        assert!(!broker
            .calls()
            .iter()
            .any(|c| matches!(c, BrokerCall::Cancel { .. })));
        assert_eq!(notifier.matching("FAILED").len(), 2);
    }

    #[tokio::test]
    async fn test_failed_cancel_blocks_resubmit_for_symbol() {
        let broker = Arc::new(MockBroker::new());
        broker.set_fail_cancels(true);
        let notifier = Arc::new(MemoryNotifier::new(NotificationLevel::Important));
        let d = dispatcher(broker.clone(), notifier, CancellationToken::new());

        let actions = vec![
            PlannedAction::Cancel {
                symbol: "S_P1".to_string(),
                order_id: "10".to_string(),
                reason: ActionReason::QuantityMismatch,
            },
            PlannedAction::Submit {
                spec: OrderSpec::buy_to_close_stop("S_P1", 3, Price::new(dec!(5))),
                reason: ActionReason::QuantityMismatch,
            },
            submit("OTHER_P1", 1),
        ];
        let report = d.execute(actions).await;

        assert_eq!(report.failed(), 2);
        assert!(matches!(
            report.outcomes[1].result,
            Err(DispatchError::PrerequisiteFailed { .. })
        ));
        assert!(report.outcomes[2].result.is_ok());
        let submits: Vec<_> = broker
            .calls()
            .into_iter()
            .filter(|c| matches!(c, BrokerCall::Submit { .. }))
            .collect();
        assert_eq!(submits.len(), 1);
    }
}
