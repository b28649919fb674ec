//! Broker session error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// Transport failure or timeout talking to the broker.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Response arrived but could not be decoded into the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Non-success status on a read endpoint.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Order placement, replacement or cancellation rejected.
    #[error("Order submission rejected (HTTP {status}): {body}")]
    Submission { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl BrokerError {
    /// True for failures that should end the current cycle but not the loop.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_) | Self::Http { .. })
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
