//! Order planning.
//!
//! Turns coverage gaps and ITM alerts into a list of broker actions. Pure:
//! nothing here talks to the broker, so the same plan is used for dry runs
//! and live submission.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

use stopguard_core::{CoverageGap, GapKind, ItmAlert, OrderRecord, OrderSpec, Price};
use stopguard_reconcile::fill_lots;

/// How stop triggers are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopMode {
    /// Every stop triggers at the configured price.
    #[default]
    Fixed,
    /// Each stop triggers at a multiple of its entry fill price.
    Multiplier,
}

impl fmt::Display for StopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Multiplier => write!(f, "multiplier"),
        }
    }
}

/// Planner inputs taken from the monitor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    pub mode: StopMode,
    /// Fixed trigger price or multiplier, depending on `mode`.
    pub trigger_value: Decimal,
}

/// Why an action was planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionReason {
    MissingStop,
    QuantityMismatch,
    ItmClose,
}

impl fmt::Display for ActionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStop => write!(f, "missing_stop"),
            Self::QuantityMismatch => write!(f, "quantity_mismatch"),
            Self::ItmClose => write!(f, "itm_close"),
        }
    }
}

/// One broker action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Submit {
        spec: OrderSpec,
        reason: ActionReason,
    },
    Replace {
        existing_id: String,
        spec: OrderSpec,
        reason: ActionReason,
    },
    Cancel {
        symbol: String,
        order_id: String,
        reason: ActionReason,
    },
}

impl PlannedAction {
    /// Option symbol the action is for.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Submit { spec, .. } | Self::Replace { spec, .. } => &spec.symbol,
            Self::Cancel { symbol, .. } => symbol,
        }
    }

    /// Metric label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "submit",
            Self::Replace { .. } => "replace",
            Self::Cancel { .. } => "cancel",
        }
    }

    #[must_use]
    pub fn reason(&self) -> ActionReason {
        match self {
            Self::Submit { reason, .. }
            | Self::Replace { reason, .. }
            | Self::Cancel { reason, .. } => *reason,
        }
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit { spec, reason } => write!(f, "submit {spec} ({reason})"),
            Self::Replace {
                existing_id,
                spec,
                reason,
            } => write!(f, "replace {existing_id} with {spec} ({reason})"),
            Self::Cancel {
                symbol,
                order_id,
                reason,
            } => write!(f, "cancel {order_id} for {symbol} ({reason})"),
        }
    }
}

/// Build the action list for one cycle.
///
/// ITM alerts come first and supersede any gap on the same symbol. An alert
/// with an existing working stop replaces it with a market close and cancels
/// the symbol's other working stops; otherwise a market close is submitted.
/// Mismatch gaps cancel their working stops before the corrected stops are
/// submitted.
///
/// `filled` are the normalized FILLED SELL_TO_OPEN records, used for
/// per-lot triggers in [`StopMode::Multiplier`].
pub fn plan_orders(
    gaps: &[CoverageGap],
    alerts: &[ItmAlert],
    filled: &[OrderRecord],
    policy: StopPolicy,
) -> Vec<PlannedAction> {
    let mut actions = Vec::new();
    let itm_symbols: HashSet<&str> = alerts.iter().map(|a| a.symbol.as_str()).collect();

    for alert in alerts {
        let spec = OrderSpec::buy_to_close_market(alert.symbol.clone(), alert.quantity);
        match &alert.existing_stop_order_id {
            Some(existing_id) => actions.push(PlannedAction::Replace {
                existing_id: existing_id.clone(),
                spec,
                reason: ActionReason::ItmClose,
            }),
            None => actions.push(PlannedAction::Submit {
                spec,
                reason: ActionReason::ItmClose,
            }),
        }
        for order_id in &alert.other_stop_order_ids {
            actions.push(PlannedAction::Cancel {
                symbol: alert.symbol.clone(),
                order_id: order_id.clone(),
                reason: ActionReason::ItmClose,
            });
        }
    }

    for gap in gaps {
        if itm_symbols.contains(gap.symbol.as_str()) {
            debug!(symbol = %gap.symbol, "Gap superseded by ITM close");
            continue;
        }

        let reason = match gap.kind {
            GapKind::MissingStop => ActionReason::MissingStop,
            GapKind::QuantityMismatch { .. } => ActionReason::QuantityMismatch,
        };

        let stops = stop_orders_for_gap(gap, filled, policy);
        if stops.is_empty() {
            continue;
        }

        if reason == ActionReason::QuantityMismatch {
            for order_id in &gap.working_order_ids {
                actions.push(PlannedAction::Cancel {
                    symbol: gap.symbol.clone(),
                    order_id: order_id.clone(),
                    reason,
                });
            }
        }

        actions.extend(
            stops
                .into_iter()
                .map(|spec| PlannedAction::Submit { spec, reason }),
        );
    }

    actions
}

/// Stop orders closing `gap`.
///
/// - Fixed: one stop for the gap quantity at the rounded fixed trigger.
/// - Multiplier with two or more distinct-price fill lots: one stop per lot,
///   sized to the lot, at the rounded multiple of the lot price.
/// - Multiplier with one lot: one stop for the gap quantity at the rounded
///   multiple of that lot's price.
/// - Multiplier without fill data: multiple of the gap reference price.
///
/// A trigger that rounds to zero yields no order.
pub fn stop_orders_for_gap(
    gap: &CoverageGap,
    filled: &[OrderRecord],
    policy: StopPolicy,
) -> Vec<OrderSpec> {
    let triggers: Vec<(u32, Price)> = match policy.mode {
        StopMode::Fixed => vec![(gap.quantity, Price::new(policy.trigger_value))],
        StopMode::Multiplier => {
            let lots = fill_lots(filled, &gap.symbol);
            match lots.as_slice() {
                [] => vec![(gap.quantity, gap.reference_price * policy.trigger_value)],
                [only] => vec![(gap.quantity, only.price * policy.trigger_value)],
                many => many
                    .iter()
                    .map(|lot| (lot.quantity, lot.price * policy.trigger_value))
                    .collect(),
            }
        }
    };

    triggers
        .into_iter()
        .filter_map(|(quantity, raw)| {
            let trigger = raw.nicklefy();
            if !trigger.is_positive() || quantity == 0 {
                warn!(
                    symbol = %gap.symbol,
                    quantity,
                    raw_trigger = %raw,
                    "Unusable stop trigger, skipping"
                );
                return None;
            }
            Some(OrderSpec::buy_to_close_stop(gap.symbol.clone(), quantity, trigger))
        })
        .collect()
}
