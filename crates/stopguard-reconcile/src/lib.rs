//! Reconciliation engine for stopguard.
//!
//! Pure functions over one broker snapshot; nothing here performs I/O or
//! keeps state between cycles.
//!
//! # Key Components
//!
//! - [`normalize_orders`]: Order book → per-leg [`stopguard_core::OrderRecord`]s
//! - [`normalize_option_positions`]: Positions → open shorts (plus fixed income / equity / census)
//! - [`aggregate`]: Per-symbol quantity sums and weighted average prices
//! - [`fill_lots`]: Distinct-price entry lots for multiplier stops
//! - [`WorkingCoverage`]: Working BUY_TO_CLOSE stops by symbol
//! - [`reconcile_coverage`]: Missing / mismatched stop detection
//! - [`evaluate_itm`]: Strike-vs-underlying proximity check

pub mod aggregator;
pub mod coverage;
pub mod error;
pub mod itm;
pub mod normalizer;

pub use aggregator::{aggregate, aggregate_records, fill_lots};
pub use coverage::{reconcile_coverage, CoverageReport, WorkingCoverage, WorkingStop};
pub use error::{ReconcileError, ReconcileResult};
pub use itm::evaluate_itm;
pub use normalizer::{
    normalize_equities, normalize_fixed_income, normalize_option_positions, normalize_orders,
    position_census, resolve_fill_price, Normalized,
};
