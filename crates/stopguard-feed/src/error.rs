//! Feed error types.

use stopguard_broker::BrokerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Quote request failed: {0}")]
    Quote(#[from] BrokerError),

    #[error("Invalid price for {symbol}: {price}")]
    InvalidPrice { symbol: String, price: String },
}

pub type FeedResult<T> = Result<T, FeedError>;
