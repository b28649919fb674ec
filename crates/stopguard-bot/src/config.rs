//! Application configuration.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use stopguard_core::Price;
use stopguard_executor::{StopMode, StopPolicy};
use stopguard_telemetry::NotificationLevel;

/// Shortest accepted cycle or price poll interval.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
/// Longest accepted cycle or price poll interval.
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(86_400);

/// Brokerage connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// REST API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Account to monitor.
    #[serde(default)]
    pub account_id: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    /// Per-request timeout (ms).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "https://api.tdameritrade.com/v1".to_string()
}

fn default_access_token_env() -> String {
    "STOPGUARD_ACCESS_TOKEN".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            account_id: String::new(),
            access_token_env: default_access_token_env(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl BrokerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Reconciliation loop settings (the control surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between reconciliation cycles. Must be > 0.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,
    /// Fixed price or fill-price multiplier.
    #[serde(default)]
    pub stop_mode: StopMode,
    /// Trigger price (fixed) or multiplier (multiplier). Must be > 0.
    #[serde(default = "default_stop_trigger_value")]
    pub stop_trigger_value: Decimal,
    /// Enable ITM protection.
    #[serde(default = "default_itm_protection_enabled")]
    pub itm_protection_enabled: bool,
    /// Points between strike and underlying at which a short is closed.
    #[serde(default = "default_itm_protection_offset")]
    pub itm_protection_offset: Decimal,
    /// Send orders to the broker. When false, planned orders are only
    /// reported.
    #[serde(default)]
    pub auto_submit: bool,
}

fn default_poll_interval_secs() -> f64 {
    60.0
}

fn default_stop_trigger_value() -> Decimal {
    Decimal::from(2)
}

fn default_itm_protection_enabled() -> bool {
    true
}

fn default_itm_protection_offset() -> Decimal {
    Decimal::from(5)
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            stop_mode: StopMode::default(),
            stop_trigger_value: default_stop_trigger_value(),
            itm_protection_enabled: default_itm_protection_enabled(),
            itm_protection_offset: default_itm_protection_offset(),
            auto_submit: false,
        }
    }
}

impl MonitorConfig {
    /// Cycle interval. Only meaningful after [`AppConfig::validate`]; an
    /// unrepresentable value falls back to the default.
    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_poll_interval_secs()))
    }

    /// Stop sizing policy for the planner.
    pub fn stop_policy(&self) -> StopPolicy {
        StopPolicy {
            mode: self.stop_mode,
            trigger_value: self.stop_trigger_value,
        }
    }
}

/// Underlying price feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeedConfig {
    /// Underlying symbol to poll.
    #[serde(default = "default_underlying_symbol")]
    pub underlying_symbol: String,
    /// Poll interval (ms).
    #[serde(default = "default_price_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Samples older than this are ignored for ITM checks (ms).
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: u64,
}

fn default_underlying_symbol() -> String {
    "$SPX.X".to_string()
}

fn default_price_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_age_ms() -> u64 {
    10_000
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            underlying_symbol: default_underlying_symbol(),
            poll_interval_ms: default_price_poll_interval_ms(),
            max_age_ms: default_max_age_ms(),
        }
    }
}

impl PriceFeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.max_age_ms).unwrap_or(i64::MAX))
    }
}

/// Operator notification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub level: NotificationLevel,
    /// Chat webhook. Notifications go to the log when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port. 0 disables the endpoint.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_log_level() -> String {
    stopguard_telemetry::DEFAULT_FILTER.to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub price_feed: PriceFeedConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Check the control surface constraints. Any error here is fatal.
    pub fn validate(&self) -> AppResult<()> {
        if self.broker.account_id.trim().is_empty() {
            return Err(AppError::Config("broker.account_id must be set".to_string()));
        }
        if self.broker.base_url.trim().is_empty() {
            return Err(AppError::Config("broker.base_url must be set".to_string()));
        }
        if self.broker.request_timeout_ms == 0 {
            return Err(AppError::Config(
                "broker.request_timeout_ms must be > 0".to_string(),
            ));
        }

        let interval = self.monitor.poll_interval_secs;
        match Duration::try_from_secs_f64(interval) {
            Ok(d) if (MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL).contains(&d) => {}
            _ => {
                return Err(AppError::Config(format!(
                    "monitor.poll_interval_secs must be within {}..={}, got {interval}",
                    MIN_POLL_INTERVAL.as_secs_f64(),
                    MAX_POLL_INTERVAL.as_secs_f64()
                )));
            }
        }

        let trigger = self.monitor.stop_trigger_value;
        if trigger <= Decimal::ZERO {
            return Err(AppError::Config(format!(
                "monitor.stop_trigger_value must be > 0, got {trigger}"
            )));
        }
        if self.monitor.stop_mode == StopMode::Fixed && Price::new(trigger).nicklefy().is_zero() {
            return Err(AppError::Config(format!(
                "monitor.stop_trigger_value {trigger} rounds to 0.00"
            )));
        }

        let offset = self.monitor.itm_protection_offset;
        if offset < Decimal::ZERO {
            return Err(AppError::Config(format!(
                "monitor.itm_protection_offset must be >= 0, got {offset}"
            )));
        }

        if self.price_feed.underlying_symbol.trim().is_empty() {
            return Err(AppError::Config(
                "price_feed.underlying_symbol must be set".to_string(),
            ));
        }
        let price_interval = self.price_feed.poll_interval();
        if !(MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL).contains(&price_interval) {
            return Err(AppError::Config(format!(
                "price_feed.poll_interval_ms must be within 1..={}, got {}",
                MAX_POLL_INTERVAL.as_millis(),
                self.price_feed.poll_interval_ms
            )));
        }

        Ok(())
    }
}
