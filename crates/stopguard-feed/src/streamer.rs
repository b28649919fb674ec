//! Underlying price streaming task.
//!
//! Polls the broker for the underlying quote at a fixed short interval and
//! publishes each price into the shared cell. The task owns the only
//! [`UnderlyingPriceWriter`].

use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use stopguard_broker::DynBrokerSession;
use stopguard_core::Price;
use stopguard_telemetry::Metrics;

use crate::error::{FeedError, FeedResult};
use crate::underlying::UnderlyingPriceWriter;

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Polls the underlying quote until cancelled.
pub struct PriceStreamer {
    broker: DynBrokerSession,
    symbol: String,
    poll_interval: Duration,
    writer: UnderlyingPriceWriter,
    shutdown: CancellationToken,
}

impl PriceStreamer {
    /// Create a streamer for `symbol` (e.g. `$SPX.X`).
    pub fn new(
        broker: DynBrokerSession,
        symbol: impl Into<String>,
        poll_interval: Duration,
        writer: UnderlyingPriceWriter,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            broker,
            symbol: symbol.into(),
            poll_interval,
            writer,
            shutdown,
        }
    }

    /// Fetch one quote and publish it.
    pub async fn poll_once(&self) -> FeedResult<Price> {
        let price = self.broker.fetch_underlying_quote(&self.symbol).await?;
        if !price.is_positive() {
            return Err(FeedError::InvalidPrice {
                symbol: self.symbol.clone(),
                price: price.to_string(),
            });
        }
        self.writer.publish(price);
        Metrics::underlying_price(price.to_f64());
        Ok(price)
    }

    /// Run the polling loop.
    ///
    /// Failed polls are logged and the previous sample is left in place. An
    /// overrunning poll delays the next tick instead of overlapping it.
    pub async fn run(self) {
        info!(
            symbol = %self.symbol,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "PriceStreamer started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.shutdown.is_cancelled() {
                break;
            }

            match self.poll_once().await {
                Ok(price) => debug!(symbol = %self.symbol, price = %price, "Underlying price"),
                Err(e) => {
                    Metrics::price_feed_error();
                    warn!(symbol = %self.symbol, error = %e, "Underlying quote poll failed");
                }
            }
        }

        info!(symbol = %self.symbol, "PriceStreamer stopped");
    }
}
