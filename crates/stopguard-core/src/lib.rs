//! Core domain types for the stopguard monitor.
//!
//! This crate provides the fundamental types used throughout the system:
//! - `Price`: Precision-safe premium/quote type with nickel rounding
//! - Option symbol parsing (strike extraction)
//! - Broker enums (`Instruction`, `OrderStatus`, `AssetType`, ...)
//! - `OrderSpec`: The order handed to the Broker Session
//! - Reconciliation records (`OptionPosition`, `OrderRecord`, `CoverageGap`, `ItmAlert`)

pub mod decimal;
pub mod error;
pub mod order;
pub mod symbol;
pub mod types;

pub use decimal::{nicklefy, Price, NICKEL_TICK_CENTS};
pub use error::{whole_contracts, CoreError, Result};
pub use order::{
    AssetType, Instruction, OrderDuration, OrderKind, OrderSpec, OrderStatus, OrderType, PutCall,
};
pub use symbol::{parse_strike, underlying_root};
pub use types::{
    AggregatedQuantity, CoverageGap, EquityHolding, FillLot, FixedIncomeHolding, GapKind,
    ItmAlert, OptionPosition, OrderRecord, PositionCensus,
};
