//! Precision-safe price type for option premiums and underlying quotes.
//!
//! Uses `rust_decimal` for exact decimal arithmetic so that tick rounding
//! and weighted averages never pick up floating-point drift.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Mul;
use std::str::FromStr;

/// Minimum price increment for index options: 5 cents.
pub const NICKEL_TICK_CENTS: i64 = 5;

/// Price with exact decimal precision.
///
/// Wraps `Decimal` to keep premiums, triggers and underlying quotes from
/// being mixed up with contract quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Lossy conversion for metrics.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.0.to_f64().unwrap_or(0.0)
    }

    /// Absolute distance between two prices.
    #[inline]
    pub fn distance_to(&self, other: Price) -> Decimal {
        (self.0 - other.0).abs()
    }

    /// Round to the nearest nickel (5-cent) increment.
    ///
    /// Steps: scale x100, divide by 5 and round to a whole number, multiply
    /// by 5 and scale back /100, then round to 2 decimal places. Both
    /// rounding steps use half-to-even so results match the reference
    /// float `round` behaviour, e.g. 2.325 -> 2.30 and 2.375 -> 2.40.
    #[must_use]
    pub fn nicklefy(&self) -> Self {
        let tick = Decimal::from(NICKEL_TICK_CENTS);
        let hundred = Decimal::ONE_HUNDRED;

        let cents = self.0 * hundred;
        let ticks = (cents / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
        let snapped = ticks * tick / hundred;

        Self(
            snapped
                .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
                .normalize(),
        )
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Nickel-round a raw decimal price.
///
/// Convenience wrapper over [`Price::nicklefy`] for call sites that hold a
/// bare `Decimal` (configured triggers, multiplier products).
#[must_use]
pub fn nicklefy(value: Decimal) -> Decimal {
    Price::new(value).nicklefy().inner()
}
