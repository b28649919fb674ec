//! Record Normalizer.
//!
//! Converts decoded broker payloads into uniform per-symbol records. Records
//! that cannot be normalized are dropped and reported alongside the output;
//! a bad record never aborts the whole collection.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use stopguard_broker::{RawOrderStrategy, RawPosition};
use stopguard_core::{
    underlying_root, whole_contracts, AssetType, EquityHolding, FixedIncomeHolding, Instruction,
    OptionPosition, OrderRecord, OrderStatus, PositionCensus, Price,
};

use crate::error::{ReconcileError, ReconcileResult};

/// Wire format of `enteredTime`.
const ENTERED_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Normalized output plus the records dropped along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub dropped: Vec<ReconcileError>,
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            dropped: Vec::new(),
        }
    }
}

impl<T> Normalized<T> {
    fn drop_record(&mut self, err: ReconcileError) {
        warn!(error = %err, "Dropping record");
        self.dropped.push(err);
    }
}

// ============================================================================
// Orders
// ============================================================================

/// Flatten order strategies with status `filter` into one record per
/// (order, leg).
///
/// - Compound orders (with child strategies) are skipped.
/// - Orders with any non-OPTION leg are skipped entirely.
/// - For `FILLED`, only SELL_TO_OPEN legs are kept and each carries its
///   resolved execution price; a leg without one is dropped.
/// - For other statuses the record price is the stop price, falling back to
///   the limit price.
///
/// Output order follows input order.
pub fn normalize_orders(strategies: &[RawOrderStrategy], filter: OrderStatus) -> Normalized<OrderRecord> {
    let mut out = Normalized::default();

    for strategy in strategies {
        if strategy.is_compound() {
            debug!(order_id = %strategy.order_id, "Skipping compound order");
            continue;
        }
        if strategy.status != filter {
            continue;
        }
        if strategy
            .order_leg_collection
            .iter()
            .any(|leg| leg.instrument.asset_type != AssetType::Option)
        {
            debug!(order_id = %strategy.order_id, "Skipping order with non-option leg");
            continue;
        }

        let entered_time = match parse_entered_time(strategy) {
            Ok(t) => t,
            Err(e) => {
                out.drop_record(e);
                continue;
            }
        };

        for leg in &strategy.order_leg_collection {
            if filter == OrderStatus::Filled && leg.instruction != Instruction::SellToOpen {
                continue;
            }

            let context = format!("order {} leg {}", strategy.order_id, leg.leg_id);

            let Some(symbol) = leg.instrument.symbol.clone() else {
                out.drop_record(ReconcileError::malformed(context, "missing symbol"));
                continue;
            };

            let quantity = match whole_contracts(leg.quantity.unwrap_or(strategy.quantity)) {
                Ok(0) => {
                    out.drop_record(ReconcileError::malformed(context, "zero quantity"));
                    continue;
                }
                Ok(q) => q,
                Err(e) => {
                    out.drop_record(ReconcileError::malformed(context, e));
                    continue;
                }
            };

            let price = if filter == OrderStatus::Filled {
                match resolve_fill_price(strategy, &leg.leg_id) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        out.drop_record(e);
                        continue;
                    }
                }
            } else {
                strategy.stop_price.or(strategy.price)
            };

            let underlying = leg
                .instrument
                .underlying_symbol
                .clone()
                .unwrap_or_else(|| underlying_root(&symbol).to_string());

            out.records.push(OrderRecord {
                order_id: strategy.order_id.clone(),
                leg_id: leg.leg_id.clone(),
                entered_time,
                underlying,
                instruction: leg.instruction,
                symbol,
                quantity,
                status: strategy.status,
                price,
            });
        }
    }

    debug!(
        status = %filter,
        records = out.records.len(),
        dropped = out.dropped.len(),
        "Normalized orders"
    );
    out
}

fn parse_entered_time(strategy: &RawOrderStrategy) -> ReconcileResult<DateTime<Utc>> {
    let context = || format!("order {}", strategy.order_id);
    let raw = strategy
        .entered_time
        .as_deref()
        .ok_or_else(|| ReconcileError::malformed(context(), "missing enteredTime"))?;

    DateTime::parse_from_str(raw, ENTERED_TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ReconcileError::malformed(context(), e))
}

/// Execution price of one leg: the quantity-weighted average over every
/// execution of that leg across the order's activity collection.
///
/// An execution with a fractional or negative quantity makes the leg
/// malformed.
pub fn resolve_fill_price(strategy: &RawOrderStrategy, leg_id: &str) -> ReconcileResult<Price> {
    let mut executions: Vec<(Decimal, Price)> = Vec::new();
    for exec in strategy
        .order_activity_collection
        .iter()
        .flat_map(|activity| activity.execution_legs.iter())
        .filter(|exec| exec.leg_id == leg_id)
    {
        let Some(price) = exec.price else {
            continue;
        };
        let weight = whole_contracts(exec.quantity).map_err(|e| {
            ReconcileError::malformed(
                format!("order {} leg {leg_id} execution", strategy.order_id),
                e,
            )
        })?;
        executions.push((Decimal::from(weight), price));
    }

    let Some(&(_, first_price)) = executions.first() else {
        return Err(ReconcileError::MissingExecutionPrice {
            order_id: strategy.order_id.clone(),
            leg_id: leg_id.to_string(),
        });
    };

    let total: Decimal = executions.iter().map(|(w, _)| *w).sum();
    if total.is_zero() {
        return Ok(first_price);
    }
    let notional: Decimal = executions.iter().map(|(w, p)| *w * p.inner()).sum();
    Ok(Price::new(notional / total))
}

// ============================================================================
// Positions
// ============================================================================

/// Open short option positions: `assetType == OPTION` and `shortQuantity > 0`.
pub fn normalize_option_positions(positions: &[RawPosition]) -> Normalized<OptionPosition> {
    let mut out = Normalized::default();

    for position in positions {
        let instrument = &position.instrument;
        if instrument.asset_type != AssetType::Option || position.short_quantity <= 0.0 {
            continue;
        }

        let Some(symbol) = instrument.symbol.clone() else {
            out.drop_record(ReconcileError::malformed("option position", "missing symbol"));
            continue;
        };

        let short_quantity = match whole_contracts(position.short_quantity) {
            Ok(q) => q,
            Err(e) => {
                out.drop_record(ReconcileError::malformed(symbol, e));
                continue;
            }
        };

        let underlying = instrument
            .underlying_symbol
            .clone()
            .unwrap_or_else(|| underlying_root(&symbol).to_string());

        out.records.push(OptionPosition {
            symbol,
            underlying,
            put_call: instrument.put_call,
            short_quantity,
            average_price: position.average_price.unwrap_or(Price::ZERO),
        });
    }

    out
}

/// FIXED_INCOME holdings.
pub fn normalize_fixed_income(positions: &[RawPosition]) -> Normalized<FixedIncomeHolding> {
    let mut out = Normalized::default();

    for position in positions {
        let instrument = &position.instrument;
        if instrument.asset_type != AssetType::FixedIncome {
            continue;
        }

        let Some(cusip) = instrument.cusip.clone().or_else(|| instrument.symbol.clone()) else {
            out.drop_record(ReconcileError::malformed("fixed income position", "missing cusip"));
            continue;
        };

        out.records.push(FixedIncomeHolding {
            cusip,
            description: instrument.description.clone().unwrap_or_default(),
            maturity_date: instrument.maturity_date.clone(),
            factor: instrument.factor.unwrap_or(1.0),
        });
    }

    out
}

/// EQUITY holdings.
pub fn normalize_equities(positions: &[RawPosition]) -> Normalized<EquityHolding> {
    let mut out = Normalized::default();

    for position in positions {
        let instrument = &position.instrument;
        if instrument.asset_type != AssetType::Equity {
            continue;
        }

        let Some(symbol) = instrument.symbol.clone() else {
            out.drop_record(ReconcileError::malformed("equity position", "missing symbol"));
            continue;
        };

        let quantities = whole_contracts(position.short_quantity)
            .and_then(|short| whole_contracts(position.long_quantity).map(|long| (short, long)));
        let (short_quantity, long_quantity) = match quantities {
            Ok(q) => q,
            Err(e) => {
                out.drop_record(ReconcileError::malformed(symbol, e));
                continue;
            }
        };

        out.records.push(EquityHolding {
            symbol,
            short_quantity,
            long_quantity,
            average_price: position.average_price.unwrap_or(Price::ZERO),
        });
    }

    out
}

/// Count positions by instrument type. Long option positions count as other.
pub fn position_census(positions: &[RawPosition]) -> PositionCensus {
    let mut census = PositionCensus::default();
    for position in positions {
        match position.instrument.asset_type {
            AssetType::FixedIncome => census.fixed_income += 1,
            AssetType::Equity => census.equities += 1,
            AssetType::Option if position.short_quantity > 0.0 => census.short_options += 1,
            _ => census.other += 1,
        }
    }
    census
}
