//! Reconciliation error types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// A FILLED leg has no matching execution in the order's activity.
    #[error("No execution price for order {order_id} leg {leg_id}")]
    MissingExecutionPrice { order_id: String, leg_id: String },

    /// A record is missing a required field or carries an unusable value.
    #[error("Malformed record {context}: {reason}")]
    MalformedRecord { context: String, reason: String },

    /// Aggregation produced a symbol with zero total quantity.
    #[error("Zero aggregated quantity for {0}")]
    ZeroQuantity(String),
}

impl ReconcileError {
    pub(crate) fn malformed(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedRecord {
            context: context.into(),
            reason: reason.to_string(),
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
