//! One reconciliation cycle.
//!
//! Fetch positions and orders, normalize, reconcile coverage, check ITM
//! proximity, plan corrective orders, dispatch. Every step works on the
//! snapshot fetched in this cycle; nothing carries over to the next one.

use rust_decimal::Decimal;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use stopguard_broker::{BrokerError, DynBrokerSession};
use stopguard_core::{CoverageGap, GapKind, ItmAlert, OrderStatus, PositionCensus};
use stopguard_executor::{plan_orders, DispatchReport, Dispatcher, PlannedAction, StopPolicy};
use stopguard_feed::UnderlyingPriceReader;
use stopguard_reconcile::{
    aggregate_records, evaluate_itm, normalize_option_positions, normalize_orders,
    position_census, reconcile_coverage, WorkingCoverage,
};
use stopguard_telemetry::{DynNotifier, Metrics, Severity};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Inputs read from the control surface at cycle start.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub account_id: String,
    pub stop_policy: StopPolicy,
    pub itm_protection_enabled: bool,
    pub itm_protection_offset: Decimal,
    pub auto_submit: bool,
    /// Older underlying samples are ignored.
    pub max_price_age: chrono::Duration,
}

impl CycleSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            account_id: config.broker.account_id.clone(),
            stop_policy: config.monitor.stop_policy(),
            itm_protection_enabled: config.monitor.itm_protection_enabled,
            itm_protection_offset: config.monitor.itm_protection_offset,
            auto_submit: config.monitor.auto_submit,
            max_price_age: config.price_feed.max_age(),
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Reconciled (and dispatched when auto-submit is on).
    Completed,
    /// No open short options; the order book was not fetched.
    NoShorts,
    /// A broker fetch failed; the rest of the cycle was skipped.
    FetchFailed,
    /// Shutdown was requested mid-cycle.
    Interrupted,
}

impl CycleOutcome {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NoShorts => "no_shorts",
            Self::FetchFailed => "fetch_failed",
            Self::Interrupted => "interrupted",
        }
    }
}

/// What one cycle saw and did.
#[derive(Debug)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub census: PositionCensus,
    pub open_shorts: usize,
    pub working_stops: usize,
    pub dropped_records: usize,
    pub gaps: Vec<CoverageGap>,
    pub unverified: Vec<String>,
    pub alerts: Vec<ItmAlert>,
    pub planned: Vec<PlannedAction>,
    /// `None` when nothing was dispatched (auto-submit off or empty plan).
    pub dispatch: Option<DispatchReport>,
}

impl CycleReport {
    fn new(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            census: PositionCensus::default(),
            open_shorts: 0,
            working_stops: 0,
            dropped_records: 0,
            gaps: Vec::new(),
            unverified: Vec::new(),
            alerts: Vec::new(),
            planned: Vec::new(),
            dispatch: None,
        }
    }

    fn with_outcome(mut self, outcome: CycleOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

/// Runs reconciliation cycles against one account.
pub struct ReconciliationCycle {
    broker: DynBrokerSession,
    notifier: DynNotifier,
    prices: UnderlyingPriceReader,
    settings: CycleSettings,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
}

impl ReconciliationCycle {
    pub fn new(
        broker: DynBrokerSession,
        notifier: DynNotifier,
        prices: UnderlyingPriceReader,
        settings: CycleSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            broker.clone(),
            settings.account_id.clone(),
            notifier.clone(),
            shutdown.clone(),
        );
        Self {
            broker,
            notifier,
            prices,
            settings,
            dispatcher,
            shutdown,
        }
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Run one cycle and record its outcome metrics.
    ///
    /// Broker fetch failures end the cycle early with
    /// [`CycleOutcome::FetchFailed`]; only internal invariant violations are
    /// returned as errors.
    pub async fn run_once(&self) -> AppResult<CycleReport> {
        let started = Instant::now();
        let result = self.execute().await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(report) => {
                Metrics::cycle_completed(report.outcome.as_str(), elapsed_ms);
                info!(
                    outcome = report.outcome.as_str(),
                    open_shorts = report.open_shorts,
                    working_stops = report.working_stops,
                    gaps = report.gaps.len(),
                    alerts = report.alerts.len(),
                    planned = report.planned.len(),
                    elapsed_ms = elapsed_ms as u64,
                    "Cycle finished"
                );
            }
            Err(e) => {
                Metrics::cycle_completed("error", elapsed_ms);
                error!(error = %e, "Cycle failed");
            }
        }
        result
    }

    async fn execute(&self) -> AppResult<CycleReport> {
        let account = self.settings.account_id.as_str();
        let mut report = CycleReport::new(CycleOutcome::Completed);

        if self.shutdown.is_cancelled() {
            return Ok(report.with_outcome(CycleOutcome::Interrupted));
        }

        let positions = match self.broker.fetch_positions(account).await {
            Ok(p) => p,
            Err(e) => return Ok(self.fetch_failed(report, "positions", &e)),
        };

        if self.shutdown.is_cancelled() {
            return Ok(report.with_outcome(CycleOutcome::Interrupted));
        }

        report.census = position_census(&positions);
        info!(
            fixed_income = report.census.fixed_income,
            equities = report.census.equities,
            short_options = report.census.short_options,
            other = report.census.other,
            "Position census"
        );
        self.notifier.notify(
            &format!(
                "Positions: {} fixed income, {} equities, {} short options, {} other",
                report.census.fixed_income,
                report.census.equities,
                report.census.short_options,
                report.census.other
            ),
            Severity::Info,
        );

        let shorts = normalize_option_positions(&positions);
        report.dropped_records += shorts.dropped.len();
        let open_shorts = shorts.records;
        report.open_shorts = open_shorts.len();
        Metrics::open_shorts(open_shorts.len());

        if open_shorts.is_empty() {
            info!("No open short options, skipping order book");
            Metrics::covered_symbols(0);
            Metrics::records_dropped(report.dropped_records);
            return Ok(report.with_outcome(CycleOutcome::NoShorts));
        }

        let orders = match self.broker.fetch_orders(account).await {
            Ok(o) => o,
            Err(e) => return Ok(self.fetch_failed(report, "orders", &e)),
        };

        if self.shutdown.is_cancelled() {
            return Ok(report.with_outcome(CycleOutcome::Interrupted));
        }

        let working = normalize_orders(&orders, OrderStatus::Working);
        let filled = normalize_orders(&orders, OrderStatus::Filled);
        report.dropped_records += working.dropped.len() + filled.dropped.len();
        Metrics::records_dropped(report.dropped_records);

        let coverage = WorkingCoverage::from_records(&working.records)?;
        report.working_stops = coverage.len();
        Metrics::covered_symbols(coverage.len());
        for stop in coverage.iter() {
            debug!(symbol = %stop.symbol, quantity = stop.quantity, "Working stop");
        }

        let filled_totals = aggregate_records(&filled.records)?;
        let coverage_report = reconcile_coverage(&open_shorts, &coverage, &filled_totals);

        for gap in &coverage_report.gaps {
            Metrics::coverage_gap(&gap.kind.to_string());
            let message = match gap.kind {
                GapKind::MissingStop => {
                    format!("Stop is missing for {} x{}", gap.symbol, gap.quantity)
                }
                GapKind::QuantityMismatch { working_quantity } => format!(
                    "Stop quantity mismatch for {}: working {working_quantity}, filled {}",
                    gap.symbol, gap.quantity
                ),
            };
            self.notifier.notify(&message, Severity::Important);
        }
        for symbol in &coverage_report.unverified {
            Metrics::coverage_gap("unverified");
            self.notifier.notify(
                &format!("Cannot verify stop quantity for {symbol}: no entry fills found"),
                Severity::Important,
            );
        }
        report.gaps = coverage_report.gaps;
        report.unverified = coverage_report.unverified;

        report.alerts = self.check_itm(&open_shorts, &coverage);

        report.planned = plan_orders(
            &report.gaps,
            &report.alerts,
            &filled.records,
            self.settings.stop_policy,
        );
        for action in &report.planned {
            info!(action = %action, reason = ?action.reason(), "Planned order action");
        }

        if report.planned.is_empty() {
            debug!("All open shorts covered");
        } else if !self.settings.auto_submit {
            info!(
                planned = report.planned.len(),
                "User selected not to submit, orders not sent"
            );
            self.notifier.notify(
                &format!(
                    "{} order action(s) planned, auto-submit is off",
                    report.planned.len()
                ),
                Severity::Info,
            );
        } else {
            let dispatch = self.dispatcher.execute(report.planned.clone()).await;
            if dispatch.interrupted() {
                report.outcome = CycleOutcome::Interrupted;
            }
            report.dispatch = Some(dispatch);
        }

        Ok(report)
    }

    fn check_itm(
        &self,
        open_shorts: &[stopguard_core::OptionPosition],
        coverage: &WorkingCoverage,
    ) -> Vec<ItmAlert> {
        if !self.settings.itm_protection_enabled {
            return Vec::new();
        }

        let Some(sample) = self.prices.latest_fresh(self.settings.max_price_age) else {
            warn!("No fresh underlying price, skipping ITM check this cycle");
            return Vec::new();
        };

        let alerts = evaluate_itm(
            open_shorts,
            sample.price,
            self.settings.itm_protection_offset,
            coverage,
        );
        for alert in &alerts {
            Metrics::itm_alert();
            self.notifier.notify(
                &format!(
                    "ITM: {} strike {} is within {} of underlying {}",
                    alert.symbol,
                    alert.strike,
                    self.settings.itm_protection_offset,
                    alert.underlying_price
                ),
                Severity::Important,
            );
        }
        alerts
    }

    fn fetch_failed(&self, report: CycleReport, what: &str, err: &BrokerError) -> CycleReport {
        if err.is_connectivity() {
            warn!(fetch = what, error = %err, "Broker unreachable, skipping cycle");
        } else {
            error!(fetch = what, error = %err, "Broker fetch failed, skipping cycle");
        }
        report.with_outcome(CycleOutcome::FetchFailed)
    }
}
