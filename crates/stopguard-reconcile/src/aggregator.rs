//! Aggregator.
//!
//! Collapses per-leg records into one entry per symbol. Output follows the
//! order in which each symbol was first seen.

use rust_decimal::Decimal;
use std::collections::HashMap;

use stopguard_core::{AggregatedQuantity, FillLot, OrderRecord, Price};

use crate::error::{ReconcileError, ReconcileResult};

#[derive(Default)]
struct Accumulator {
    quantity: u32,
    priced_quantity: Decimal,
    notional: Decimal,
}

/// Aggregate `(symbol, quantity, price)` tuples per symbol.
///
/// `quantity` is the plain sum. `price` is the quantity-weighted average over
/// the priced contributions, or `None` when no contribution had a price.
///
/// # Errors
/// [`ReconcileError::ZeroQuantity`] if a symbol sums to zero contracts.
pub fn aggregate<'a, I>(entries: I) -> ReconcileResult<Vec<AggregatedQuantity>>
where
    I: IntoIterator<Item = (&'a str, u32, Option<Price>)>,
{
    let mut order: Vec<&'a str> = Vec::new();
    let mut acc: HashMap<&'a str, Accumulator> = HashMap::new();

    for (symbol, quantity, price) in entries {
        let slot = acc.entry(symbol).or_insert_with(|| {
            order.push(symbol);
            Accumulator::default()
        });
        slot.quantity = slot.quantity.saturating_add(quantity);
        if let Some(price) = price {
            let q = Decimal::from(quantity);
            slot.priced_quantity += q;
            slot.notional += q * price.inner();
        }
    }

    order
        .into_iter()
        .map(|symbol| {
            let slot = &acc[symbol];
            if slot.quantity == 0 {
                return Err(ReconcileError::ZeroQuantity(symbol.to_string()));
            }
            let price = (!slot.priced_quantity.is_zero())
                .then(|| Price::new(slot.notional / slot.priced_quantity));
            Ok(AggregatedQuantity {
                symbol: symbol.to_string(),
                quantity: slot.quantity,
                price,
            })
        })
        .collect()
}

/// Aggregate normalized order records.
pub fn aggregate_records(records: &[OrderRecord]) -> ReconcileResult<Vec<AggregatedQuantity>> {
    aggregate(
        records
            .iter()
            .map(|r| (r.symbol.as_str(), r.quantity, r.price)),
    )
}

/// Fill lots of `symbol`, one per distinct fill price, in first-seen order.
///
/// Records without a price are ignored. Lots at the same price are merged
/// and keep the first contributing order id.
pub fn fill_lots(records: &[OrderRecord], symbol: &str) -> Vec<FillLot> {
    let mut lots: Vec<FillLot> = Vec::new();
    for record in records.iter().filter(|r| r.symbol == symbol) {
        let Some(price) = record.price else {
            continue;
        };
        match lots.iter_mut().find(|lot| lot.price == price) {
            Some(lot) => lot.quantity = lot.quantity.saturating_add(record.quantity),
            None => lots.push(FillLot {
                order_id: record.order_id.clone(),
                quantity: record.quantity,
                price,
            }),
        }
    }
    lots
}
