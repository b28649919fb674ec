//! Stop-order coverage monitor.
//!
//! Keeps every open short option protected by a working stop order and
//! force-closes shorts whose strike drifts too close to the underlying:
//! - Configuration and the control surface (`config`)
//! - One reconciliation pass over a broker snapshot (`cycle`)
//! - The fixed-interval driver (`poll_loop`)
//! - Session supervision with the underlying price task (`app`)

pub mod app;
pub mod config;
pub mod cycle;
pub mod error;
pub mod poll_loop;

pub use app::Application;
pub use config::AppConfig;
pub use cycle::{CycleOutcome, CycleReport, CycleSettings, ReconciliationCycle};
pub use error::{AppError, AppResult};
pub use poll_loop::run_poll_loop;
