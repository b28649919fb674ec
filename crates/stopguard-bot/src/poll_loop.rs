//! Poll Loop Controller.
//!
//! Drives [`ReconciliationCycle::run_once`] on a fixed interval until the
//! shutdown token is cancelled. Cycles never overlap: an overrunning cycle
//! delays the next tick. A failed cycle is logged and the loop carries on.

use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cycle::ReconciliationCycle;

/// Run cycles every `interval` until `shutdown` fires. Returns the number of
/// cycles started.
pub async fn run_poll_loop(
    cycle: ReconciliationCycle,
    interval: Duration,
    shutdown: CancellationToken,
) -> u64 {
    info!(
        interval_ms = interval.as_millis() as u64,
        auto_submit = cycle.settings().auto_submit,
        "Poll loop started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cycles = 0u64;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if shutdown.is_cancelled() {
            break;
        }

        cycles += 1;
        if let Err(e) = cycle.run_once().await {
            warn!(cycle = cycles, error = %e, "Cycle aborted, retrying next tick");
        }
    }

    info!(cycles, "Poll loop stopped");
    cycles
}
