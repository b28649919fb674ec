//! Observability for stopguard.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus metrics behind the [`Metrics`] facade, served over HTTP
//! - Operator notifications through [`NotificationSink`]

pub mod error;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod server;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, DEFAULT_FILTER};
pub use metrics::Metrics;
pub use notify::{
    DynNotifier, LogNotifier, MemoryNotifier, NotificationLevel, NotificationSink, Severity,
    WebhookNotifier,
};
pub use server::{create_router, run_metrics_server};
