//! Option symbol parsing.
//!
//! Brokerage option identifiers embed the expiry and strike as numeric runs,
//! e.g. `SPXW_061523P4400` (expiry `061523`, strike `4400`) or
//! `SPXW_061523P4402.5`.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use crate::Price;

/// A run of digits with an optional fractional part.
static NUMERIC_RUN: Lazy<Regex> = Lazy::new(|| {
    // Literal pattern, cannot fail to compile.
    Regex::new(r"\d+(?:\.\d+)?").unwrap()
});

/// Extract the strike price from an option symbol.
///
/// The strike is the second numeric run in the symbol. A symbol with a single
/// numeric run (no embedded expiry) uses that run. A symbol with no numeric
/// run yields [`Price::ZERO`], which callers treat as "strike unknown" and
/// never as an in-the-money trigger.
#[must_use]
pub fn parse_strike(symbol: &str) -> Price {
    let runs: Vec<&str> = NUMERIC_RUN.find_iter(symbol).map(|m| m.as_str()).collect();

    let token = match runs.as_slice() {
        [] => return Price::ZERO,
        [only] => *only,
        [_, second, ..] => *second,
    };

    token
        .parse::<Decimal>()
        .map(Price::new)
        .unwrap_or(Price::ZERO)
}

/// Underlying root of an option symbol (text before the first `_`).
#[must_use]
pub fn underlying_root(symbol: &str) -> &str {
    symbol.split_once('_').map_or(symbol, |(root, _)| root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_strike_is_second_numeric_run() {
        assert_eq!(parse_strike("SPXW_061523P4400"), Price::new(dec!(4400)));
        assert_eq!(parse_strike("SPXW_061523C4495"), Price::new(dec!(4495)));
    }

    #[test]
    fn test_fractional_strike() {
        assert_eq!(parse_strike("SPXW_061523P4402.5"), Price::new(dec!(4402.5)));
    }

    #[test]
    fn test_single_numeric_run_is_used() {
        assert_eq!(parse_strike("AAPL_P100"), Price::new(dec!(100)));
    }

    #[test]
    fn test_no_numeric_run_yields_zero() {
        assert_eq!(parse_strike("SPXW_PUT"), Price::ZERO);
        assert_eq!(parse_strike(""), Price::ZERO);
    }

    #[test]
    fn test_underlying_root() {
        assert_eq!(underlying_root("SPXW_061523P4400"), "SPXW");
        assert_eq!(underlying_root("SPX"), "SPX");
    }
}
