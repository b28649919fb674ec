//! Domain records shared by the reconciliation pipeline.
//!
//! All records are rebuilt from a fresh broker snapshot every poll cycle;
//! nothing here carries identity across cycles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Instruction, OrderStatus, Price, PutCall};

/// One open short option leg.
///
/// Invariant: `short_quantity > 0` (enforced by the normalizer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionPosition {
    pub symbol: String,
    pub underlying: String,
    pub put_call: Option<PutCall>,
    pub short_quantity: u32,
    pub average_price: Price,
}

/// One (order, leg) pair from the order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub leg_id: String,
    pub entered_time: DateTime<Utc>,
    pub underlying: String,
    pub instruction: Instruction,
    pub symbol: String,
    pub quantity: u32,
    pub status: OrderStatus,
    /// Fill price for FILLED records, order price (if any) otherwise.
    pub price: Option<Price>,
}

/// Per-symbol totals derived from a set of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedQuantity {
    pub symbol: String,
    pub quantity: u32,
    /// Quantity-weighted average over priced contributions; `None` when no
    /// contribution carried a price.
    pub price: Option<Price>,
}

/// One discrete execution contributing to a short position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillLot {
    pub order_id: String,
    pub quantity: u32,
    pub price: Price,
}

/// Why a symbol lacks correct protective coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GapKind {
    /// No working stop exists for the symbol.
    MissingStop,
    /// Working stop quantity differs from the position quantity.
    QuantityMismatch { working_quantity: u32 },
}

impl fmt::Display for GapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStop => write!(f, "missing_stop"),
            Self::QuantityMismatch { .. } => write!(f, "quantity_mismatch"),
        }
    }
}

/// Missing or mismatched protective coverage for an open short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub symbol: String,
    pub quantity: u32,
    pub reference_price: Price,
    pub kind: GapKind,
    /// Working stop orders currently covering the symbol (empty for
    /// [`GapKind::MissingStop`]).
    pub working_order_ids: Vec<String>,
}

/// Open short whose strike is within the protection distance of the
/// underlying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItmAlert {
    pub symbol: String,
    /// Full short quantity, not reduced by existing coverage.
    pub quantity: u32,
    pub strike: Price,
    pub underlying_price: Price,
    /// Working stop to replace with the market close; `None` means submit
    /// fresh.
    pub existing_stop_order_id: Option<String>,
    /// Further working stops for the symbol, cancelled alongside the replace.
    pub other_stop_order_ids: Vec<String>,
}

/// A FIXED_INCOME holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedIncomeHolding {
    pub cusip: String,
    pub description: String,
    pub maturity_date: Option<String>,
    pub factor: f64,
}

/// An EQUITY holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityHolding {
    pub symbol: String,
    pub short_quantity: u32,
    pub long_quantity: u32,
    pub average_price: Price,
}

/// Count of positions by instrument type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCensus {
    pub fixed_income: usize,
    pub equities: usize,
    pub short_options: usize,
    pub other: usize,
}

impl PositionCensus {
    /// Total positions counted.
    pub fn total(&self) -> usize {
        self.fixed_income + self.equities + self.short_options + self.other
    }
}
