//! ITM Protection Evaluator.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use stopguard_core::{parse_strike, ItmAlert, OptionPosition, Price};

use crate::coverage::WorkingCoverage;

/// Flag open shorts whose strike is within `offset` points of `underlying`.
///
/// Symbols without a parseable strike (strike 0) never trigger. The alert
/// quantity is the full short quantity regardless of existing coverage.
pub fn evaluate_itm(
    open_shorts: &[OptionPosition],
    underlying: Price,
    offset: Decimal,
    working: &WorkingCoverage,
) -> Vec<ItmAlert> {
    let mut alerts = Vec::new();

    for position in open_shorts {
        let strike = parse_strike(&position.symbol);
        if strike.is_zero() {
            debug!(symbol = %position.symbol, "No strike in symbol, skipping ITM check");
            continue;
        }

        let distance = underlying.distance_to(strike);
        if distance > offset {
            continue;
        }

        let mut stop_ids = working
            .get(&position.symbol)
            .map(|s| s.order_ids.clone())
            .unwrap_or_default()
            .into_iter();
        let existing_stop_order_id = stop_ids.next();

        warn!(
            symbol = %position.symbol,
            strike = %strike,
            underlying = %underlying,
            distance = %distance,
            offset = %offset,
            "Short strike within ITM protection distance"
        );

        alerts.push(ItmAlert {
            symbol: position.symbol.clone(),
            quantity: position.short_quantity,
            strike,
            underlying_price: underlying,
            existing_stop_order_id,
            other_stop_order_ids: stop_ids.collect(),
        });
    }

    alerts
}
