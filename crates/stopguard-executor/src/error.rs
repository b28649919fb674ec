//! Dispatch error types.

use stopguard_broker::BrokerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The broker refused or failed the action.
    #[error("{action} failed: {source}")]
    Broker {
        action: String,
        #[source]
        source: BrokerError,
    },

    /// Not sent because an earlier action it depends on failed for the same
    /// symbol: a cancel before a resubmit, or an ITM close before the cancels
    /// of the remaining stops.
    #[error("{action} skipped: prior action for {symbol} failed")]
    PrerequisiteFailed { action: String, symbol: String },
}

impl DispatchError {
    /// True when the broker explicitly rejected the order.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Broker {
                source: BrokerError::Submission { .. },
                ..
            }
        )
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
