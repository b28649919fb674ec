//! Prometheus metrics for the stopguard monitor.
//!
//! Covers:
//! - Reconciliation cycle outcomes and duration
//! - Open short / working stop counts
//! - Coverage gaps and ITM alerts
//! - Order actions sent to the broker
//! - Underlying price feed
//!
//! # Panics
//!
//! Registration panics on a duplicate metric name. This can only happen on
//! first access to a metric static.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_int_counter,
    register_int_gauge, CounterVec, Encoder, Gauge, Histogram, IntCounter, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Completed reconciliation cycles.
/// Labels: outcome (completed/no_shorts/fetch_failed/interrupted/error)
pub static CYCLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stopguard_cycles_total",
        "Reconciliation cycles by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Reconciliation cycle duration in milliseconds.
pub static CYCLE_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "stopguard_cycle_duration_ms",
        "Reconciliation cycle duration in milliseconds",
        vec![50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Open short option positions seen in the last cycle.
pub static OPEN_SHORTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("stopguard_open_shorts", "Open short option positions").unwrap()
});

/// Symbols with working stop coverage in the last cycle.
pub static COVERED_SYMBOLS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "stopguard_covered_symbols",
        "Symbols with working BUY_TO_CLOSE stops"
    )
    .unwrap()
});

/// Coverage gaps found.
/// Labels: kind (missing_stop/quantity_mismatch/unverified)
pub static COVERAGE_GAPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stopguard_coverage_gaps_total",
        "Coverage gaps found by kind",
        &["kind"]
    )
    .unwrap()
});

/// ITM alerts raised.
pub static ITM_ALERTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("stopguard_itm_alerts_total", "ITM protection alerts").unwrap()
});

/// Records dropped during normalization.
pub static DROPPED_RECORDS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "stopguard_dropped_records_total",
        "Broker records dropped as malformed"
    )
    .unwrap()
});

/// Order actions sent to the broker.
/// Labels: action (submit/replace/cancel), result (ok/rejected/error)
pub static ORDER_ACTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stopguard_order_actions_total",
        "Order actions by kind and result",
        &["action", "result"]
    )
    .unwrap()
});

/// Latest underlying price.
pub static UNDERLYING_PRICE: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("stopguard_underlying_price", "Latest underlying price").unwrap()
});

/// Failed underlying quote polls.
pub static PRICE_FEED_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "stopguard_price_feed_errors_total",
        "Failed underlying quote polls"
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record a finished cycle.
    pub fn cycle_completed(outcome: &str, duration_ms: f64) {
        CYCLES_TOTAL.with_label_values(&[outcome]).inc();
        CYCLE_DURATION_MS.observe(duration_ms);
    }

    /// Set open short count.
    pub fn open_shorts(count: usize) {
        OPEN_SHORTS.set(count as i64);
    }

    /// Set covered symbol count.
    pub fn covered_symbols(count: usize) {
        COVERED_SYMBOLS.set(count as i64);
    }

    /// Record a coverage gap.
    pub fn coverage_gap(kind: &str) {
        COVERAGE_GAPS_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record an ITM alert.
    pub fn itm_alert() {
        ITM_ALERTS_TOTAL.inc();
    }

    /// Record dropped records.
    pub fn records_dropped(count: usize) {
        DROPPED_RECORDS_TOTAL.inc_by(count as u64);
    }

    /// Record an order action result.
    pub fn order_action(action: &str, result: &str) {
        ORDER_ACTIONS_TOTAL.with_label_values(&[action, result]).inc();
    }

    /// Record the latest underlying price.
    pub fn underlying_price(price: f64) {
        UNDERLYING_PRICE.set(price);
    }

    /// Record a failed quote poll.
    pub fn price_feed_error() {
        PRICE_FEED_ERRORS_TOTAL.inc();
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
