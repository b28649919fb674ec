//! Main application orchestration.
//!
//! One monitoring session is a supervised task pair sharing a cancellation
//! token:
//! - the price task, sole writer of the underlying price cell
//! - the poll loop, running reconciliation cycles and reading the cell
//!
//! plus an optional metrics endpoint. Ctrl-C (or cancelling
//! [`Application::shutdown_token`]) stops all of them, and so does either
//! task of the pair ending on its own.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use stopguard_broker::{DynBrokerSession, RestBrokerClient};
use stopguard_feed::{underlying_price_cell, PriceStreamer};
use stopguard_telemetry::{run_metrics_server, DynNotifier, LogNotifier, WebhookNotifier};

use crate::config::AppConfig;
use crate::cycle::{CycleSettings, ReconciliationCycle};
use crate::error::{AppError, AppResult};
use crate::poll_loop::run_poll_loop;

/// Main application.
pub struct Application {
    config: AppConfig,
    broker: DynBrokerSession,
    notifier: DynNotifier,
    shutdown: CancellationToken,
}

impl Application {
    /// Create the application with the REST broker client and the configured
    /// notifier.
    ///
    /// The bearer token is read from the environment variable named by
    /// `broker.access_token_env`.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let token_var = &config.broker.access_token_env;
        let access_token = std::env::var(token_var)
            .map_err(|_| AppError::Config(format!("{token_var} is not set")))?;

        let client = RestBrokerClient::new(
            config.broker.base_url.clone(),
            access_token,
            config.broker.request_timeout(),
        )?;

        let notifier: DynNotifier = match &config.notifications.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone(), config.notifications.level)?),
            None => Arc::new(LogNotifier::new(config.notifications.level)),
        };

        Ok(Self::with_components(config, Arc::new(client), notifier))
    }

    /// Create the application around an existing broker session and notifier.
    pub fn with_components(
        config: AppConfig,
        broker: DynBrokerSession,
        notifier: DynNotifier,
    ) -> Self {
        Self {
            config,
            broker,
            notifier,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the session when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until shutdown.
    pub async fn run(self) -> AppResult<()> {
        info!(
            account_id = %self.config.broker.account_id,
            stop_mode = %self.config.monitor.stop_mode,
            trigger = %self.config.monitor.stop_trigger_value,
            itm_protection = self.config.monitor.itm_protection_enabled,
            auto_submit = self.config.monitor.auto_submit,
            "Starting monitoring session"
        );

        self.spawn_signal_handler();

        let metrics_handle = match self.config.telemetry.metrics_port {
            0 => None,
            port => {
                let token = self.shutdown.clone();
                Some(tokio::spawn(async move {
                    if let Err(e) = run_metrics_server(port, token).await {
                        error!(error = %e, "Metrics server failed");
                    }
                }))
            }
        };

        let (writer, reader) = underlying_price_cell();

        let streamer = PriceStreamer::new(
            self.broker.clone(),
            self.config.price_feed.underlying_symbol.clone(),
            self.config.price_feed.poll_interval(),
            writer,
            self.shutdown.clone(),
        );
        let feed_handle = tokio::spawn(streamer.run());

        let cycle = ReconciliationCycle::new(
            self.broker.clone(),
            self.notifier.clone(),
            reader,
            CycleSettings::from_config(&self.config),
            self.shutdown.clone(),
        );
        let poll_handle = tokio::spawn(run_poll_loop(
            cycle,
            self.config.monitor.poll_interval(),
            self.shutdown.clone(),
        ));

        let cycles = supervise(feed_handle, poll_handle, &self.shutdown).await;

        if let Some(handle) = metrics_handle {
            handle.await?;
        }

        let cycles = cycles?;
        info!(cycles, "Monitoring session stopped");
        Ok(())
    }

    fn spawn_signal_handler(&self) {
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        info!("Shutdown signal received");
                        token.cancel();
                    }
                    Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
                },
            }
        });
    }
}

/// Wait for the price task and the poll loop. Whichever ends first cancels
/// `shutdown` so the other one stops too. A panic in either task is returned
/// once both have finished.
async fn supervise(
    mut feed: JoinHandle<()>,
    mut poll: JoinHandle<u64>,
    shutdown: &CancellationToken,
) -> AppResult<u64> {
    let (feed_result, poll_result) = tokio::select! {
        feed_result = &mut feed => {
            if !shutdown.is_cancelled() {
                warn!("Price task ended, stopping session");
                shutdown.cancel();
            }
            (feed_result, poll.await)
        }
        poll_result = &mut poll => {
            if !shutdown.is_cancelled() {
                warn!("Poll loop ended, stopping session");
                shutdown.cancel();
            }
            (feed.await, poll_result)
        }
    };

    feed_result?;
    Ok(poll_result?)
}
