//! Coverage Reconciler.
//!
//! Matches open shorts against working protective stops and reports the
//! symbols whose coverage is missing or has the wrong size.

use tracing::{debug, info, warn};

use stopguard_core::{
    AggregatedQuantity, CoverageGap, GapKind, Instruction, OptionPosition, OrderRecord,
    OrderStatus,
};

use crate::aggregator::aggregate_records;
use crate::error::ReconcileResult;

/// Working stop coverage for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingStop {
    pub symbol: String,
    /// Total contracts across all working stops.
    pub quantity: u32,
    /// Distinct order ids, first-seen order.
    pub order_ids: Vec<String>,
}

/// Working protective stops grouped by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingCoverage {
    stops: Vec<WorkingStop>,
}

impl WorkingCoverage {
    /// Build from normalized WORKING records. Only BUY_TO_CLOSE legs count as
    /// protection.
    pub fn from_records(records: &[OrderRecord]) -> ReconcileResult<Self> {
        let protective: Vec<OrderRecord> = records
            .iter()
            .filter(|r| r.status == OrderStatus::Working && r.instruction == Instruction::BuyToClose)
            .cloned()
            .collect();

        let stops = aggregate_records(&protective)?
            .into_iter()
            .map(|agg| {
                let mut order_ids: Vec<String> = Vec::new();
                for record in protective.iter().filter(|r| r.symbol == agg.symbol) {
                    if !order_ids.contains(&record.order_id) {
                        order_ids.push(record.order_id.clone());
                    }
                }
                WorkingStop {
                    symbol: agg.symbol,
                    quantity: agg.quantity,
                    order_ids,
                }
            })
            .collect();

        Ok(Self { stops })
    }

    /// Coverage for `symbol`.
    pub fn get(&self, symbol: &str) -> Option<&WorkingStop> {
        self.stops.iter().find(|s| s.symbol == symbol)
    }

    /// Number of covered symbols.
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// True when nothing is covered.
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Iterate covered symbols.
    pub fn iter(&self) -> impl Iterator<Item = &WorkingStop> {
        self.stops.iter()
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    /// Gaps in open-short order.
    pub gaps: Vec<CoverageGap>,
    /// Covered symbols skipped for lack of entry fill history.
    pub unverified: Vec<String>,
}

/// Reconcile open shorts against working coverage.
///
/// Per open short:
/// 1. no working stop: gap for the full position at its average price;
/// 2. working stop but no filled-entry aggregate: skipped, listed in
///    [`CoverageReport::unverified`];
/// 3. otherwise a gap sized from the filled aggregate when the working
///    quantity differs from the position quantity.
pub fn reconcile_coverage(
    open_shorts: &[OptionPosition],
    working: &WorkingCoverage,
    filled: &[AggregatedQuantity],
) -> CoverageReport {
    let mut report = CoverageReport::default();

    for position in open_shorts {
        let symbol = &position.symbol;

        let Some(stop) = working.get(symbol) else {
            info!(symbol = %symbol, quantity = position.short_quantity, "Stop is missing");
            report.gaps.push(CoverageGap {
                symbol: symbol.clone(),
                quantity: position.short_quantity,
                reference_price: position.average_price,
                kind: GapKind::MissingStop,
                working_order_ids: Vec::new(),
            });
            continue;
        };

        let Some(entry) = filled.iter().find(|f| &f.symbol == symbol) else {
            warn!(
                symbol = %symbol,
                working_quantity = stop.quantity,
                "Stop exists but no entry fills found, cannot verify quantity"
            );
            report.unverified.push(symbol.clone());
            continue;
        };

        if stop.quantity == position.short_quantity {
            debug!(symbol = %symbol, quantity = stop.quantity, "Stop covers position");
            continue;
        }

        info!(
            symbol = %symbol,
            position_quantity = position.short_quantity,
            working_quantity = stop.quantity,
            "Quantity mismatch between working stop and open short"
        );
        report.gaps.push(CoverageGap {
            symbol: symbol.clone(),
            quantity: entry.quantity,
            reference_price: entry.price.unwrap_or(position.average_price),
            kind: GapKind::QuantityMismatch {
                working_quantity: stop.quantity,
            },
            working_order_ids: stop.order_ids.clone(),
        });
    }

    report
}
