//! Shared underlying price cell.
//!
//! Exactly one [`UnderlyingPriceWriter`] exists per cell and is owned by the
//! price-streaming task. Any number of [`UnderlyingPriceReader`]s observe it.
//! Each read returns a whole [`PriceSample`]; a reader never sees a
//! half-written value.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

use stopguard_core::Price;

/// One observed underlying price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSample {
    pub price: Price,
    pub received_at: DateTime<Utc>,
}

impl PriceSample {
    /// Age of the sample relative to `now`.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.received_at)
    }
}

/// Create a new empty cell.
#[must_use]
pub fn underlying_price_cell() -> (UnderlyingPriceWriter, UnderlyingPriceReader) {
    let slot = Arc::new(RwLock::new(None));
    (
        UnderlyingPriceWriter {
            slot: Arc::clone(&slot),
        },
        UnderlyingPriceReader { slot },
    )
}

/// Write side of the cell. Not `Clone`.
#[derive(Debug)]
pub struct UnderlyingPriceWriter {
    slot: Arc<RwLock<Option<PriceSample>>>,
}

impl UnderlyingPriceWriter {
    /// Publish a price observed now.
    pub fn publish(&self, price: Price) {
        self.publish_sample(PriceSample {
            price,
            received_at: Utc::now(),
        });
    }

    /// Publish a sample with an explicit timestamp.
    pub fn publish_sample(&self, sample: PriceSample) {
        *self.slot.write() = Some(sample);
    }

    /// A reader for this cell.
    #[must_use]
    pub fn reader(&self) -> UnderlyingPriceReader {
        UnderlyingPriceReader {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Read side of the cell.
#[derive(Debug, Clone)]
pub struct UnderlyingPriceReader {
    slot: Arc<RwLock<Option<PriceSample>>>,
}

impl UnderlyingPriceReader {
    /// Latest sample, if any was published.
    #[must_use]
    pub fn latest(&self) -> Option<PriceSample> {
        *self.slot.read()
    }

    /// Latest sample no older than `max_age`.
    #[must_use]
    pub fn latest_fresh(&self, max_age: Duration) -> Option<PriceSample> {
        self.latest()
            .filter(|sample| sample.age(Utc::now()) <= max_age)
    }
}
