//! Monitoring session integration tests.
//!
//! Runs the price task and the poll loop together against the mock broker
//! and checks that cancellation stops all broker traffic.

mod integration;
use integration::common::{cycle, notifier, settings, short_option};

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use stopguard_bot::{run_poll_loop, AppConfig, Application};
use stopguard_broker::{BrokerCall, MockBroker};
use stopguard_core::Price;
use stopguard_feed::underlying_price_cell;

fn session_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.broker.account_id = "123456789".to_string();
    config.monitor.poll_interval_secs = 0.02;
    config.monitor.auto_submit = false;
    config.price_feed.poll_interval_ms = 10;
    config.telemetry.metrics_port = 0;
    config
}

#[tokio::test]
async fn test_session_stops_all_broker_calls_on_cancel() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option("SPXW_061523P4400", 1, 5.0)]);
    broker.set_quote(Some(Price::new(dec!(4500))));

    let app = Application::with_components(session_config(), broker.clone(), notifier());
    let token = app.shutdown_token();
    let handle = tokio::spawn(app.run());

    tokio::time::sleep(Duration::from_millis(150)).await;
    token.cancel();

    let result = timeout(Duration::from_secs(2), handle)
        .await
        .expect("session should stop after cancel")
        .expect("session task should not panic");
    assert!(result.is_ok());

    let calls = broker.calls();
    assert!(calls
        .iter()
        .any(|c| matches!(c, BrokerCall::FetchPositions { .. })));
    assert!(calls
        .iter()
        .any(|c| matches!(c, BrokerCall::FetchQuote { .. })));
    assert!(broker.mutations().is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(broker.calls().len(), calls.len());
}

#[tokio::test]
async fn test_poll_loop_with_cancelled_token_runs_nothing() {
    let broker = Arc::new(MockBroker::new());
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();
    let token = CancellationToken::new();
    token.cancel();

    let cycle = cycle(&broker, &notifier, reader, settings(true), token.clone());
    let cycles = run_poll_loop(cycle, Duration::from_millis(10), token).await;

    assert_eq!(cycles, 0);
    assert!(broker.calls().is_empty());
}

#[tokio::test]
async fn test_poll_loop_keeps_running_through_failures() {
    let broker = Arc::new(MockBroker::new());
    broker.set_fail_fetches(true);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();
    let token = CancellationToken::new();

    let cycle = cycle(&broker, &notifier, reader, settings(true), token.clone());
    let handle = tokio::spawn(run_poll_loop(cycle, Duration::from_millis(10), token.clone()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();
    let cycles = timeout(Duration::from_secs(2), handle)
        .await
        .expect("poll loop should stop after cancel")
        .expect("poll loop should not panic");

    assert!(cycles >= 2);
    let fetches = broker
        .calls()
        .into_iter()
        .filter(|c| matches!(c, BrokerCall::FetchPositions { .. }))
        .count();
    assert_eq!(fetches as u64, cycles);
}

#[test]
fn test_application_requires_access_token() {
    let mut config = session_config();
    config.broker.access_token_env = "STOPGUARD_TEST_TOKEN_THAT_IS_NOT_SET".to_string();
    assert!(matches!(
        Application::new(config),
        Err(stopguard_bot::AppError::Config(_))
    ));
}
