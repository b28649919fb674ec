//! Underlying price feed for stopguard.
//!
//! A single-writer / many-reader price cell and the task that keeps it
//! current. The cell is the only state shared between the price task and the
//! reconciliation cycle.

pub mod error;
pub mod streamer;
pub mod underlying;

pub use error::{FeedError, FeedResult};
pub use streamer::{PriceStreamer, DEFAULT_POLL_INTERVAL};
pub use underlying::{
    underlying_price_cell, PriceSample, UnderlyingPriceReader, UnderlyingPriceWriter,
};
