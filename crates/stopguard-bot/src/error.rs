//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Broker error: {0}")]
    Broker(#[from] stopguard_broker::BrokerError),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] stopguard_reconcile::ReconcileError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] stopguard_telemetry::TelemetryError),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type AppResult<T> = Result<T, AppError>;
