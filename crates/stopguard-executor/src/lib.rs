//! Order Dispatcher for stopguard.
//!
//! Converts reconciliation findings into broker actions and sends them.
//!
//! # Key Components
//!
//! - [`plan_orders`]: Gaps + ITM alerts → ordered [`PlannedAction`] list (pure)
//! - [`stop_orders_for_gap`]: Fixed / multiplier stop sizing with nickel rounding
//! - [`Dispatcher`]: Sends a plan, continuing past individual failures
//!
//! # Action ordering
//!
//! 1. ITM closes (replace the first working stop, cancel the rest, or submit)
//! 2. Per gap: cancel mismatched working stops, then submit corrected stops

pub mod dispatcher;
pub mod error;
pub mod planner;

pub use dispatcher::{ActionOutcome, DispatchReport, Dispatcher};
pub use error::{DispatchError, DispatchResult};
pub use planner::{
    plan_orders, stop_orders_for_gap, ActionReason, PlannedAction, StopMode, StopPolicy,
};
