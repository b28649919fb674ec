//! Reconciliation cycle integration tests.
//!
//! Each test loads a broker snapshot into the mock broker, runs one cycle
//! and checks the broker calls, the report and the notifications.

mod integration;
use integration::common::{
    cycle, equity, filled_entry, filled_with_equity_leg, notifier, positions_from_body, settings,
    short_option, working_stop, working_stop_without_quantity, ACCOUNT,
};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use stopguard_bot::CycleOutcome;
use stopguard_broker::{BrokerCall, MockBroker};
use stopguard_core::{GapKind, OrderSpec, Price};
use stopguard_executor::{PlannedAction, StopMode, StopPolicy};
use stopguard_feed::underlying_price_cell;

const SPX_PUT: &str = "SPXW_061523P4400";

fn submitted_specs(broker: &MockBroker) -> Vec<OrderSpec> {
    broker
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            BrokerCall::Submit { spec, .. } => Some(spec),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_missing_stop_is_submitted() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 2, 3.10)]);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();

    let cycle = cycle(&broker, &notifier, reader, settings(true), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.open_shorts, 1);
    assert_eq!(report.gaps.len(), 1);
    assert_eq!(report.gaps[0].kind, GapKind::MissingStop);
    assert_eq!(report.gaps[0].quantity, 2);

    let specs = submitted_specs(&broker);
    assert_eq!(specs.len(), 1);
    assert_eq!(
        specs[0],
        OrderSpec::buy_to_close_stop(SPX_PUT, 2, Price::new(dec!(2.00)))
    );
    assert!(matches!(
        &broker.mutations()[0],
        BrokerCall::Submit { account_id, .. } if account_id == ACCOUNT
    ));

    let dispatch = report.dispatch.expect("orders were dispatched");
    assert_eq!(dispatch.succeeded(), 1);
    assert_eq!(notifier.matching("Stop is missing").len(), 1);
    assert_eq!(notifier.matching("Buy to Close order placed").len(), 1);
}

#[tokio::test]
async fn test_covered_position_sends_nothing() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 3, 10.0)]);
    broker.set_orders(vec![
        filled_entry(1001, SPX_PUT, 3, 10.0),
        working_stop(2001, SPX_PUT, 3, 2.0),
    ]);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();

    let cycle = cycle(&broker, &notifier, reader, settings(true), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.working_stops, 1);
    assert!(report.gaps.is_empty());
    assert!(report.planned.is_empty());
    assert!(report.dispatch.is_none());
    assert!(broker.mutations().is_empty());
}

#[tokio::test]
async fn test_quantity_mismatch_cancels_then_resubmits() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 3, 10.0)]);
    broker.set_orders(vec![
        filled_entry(1001, SPX_PUT, 3, 10.0),
        working_stop(2001, SPX_PUT, 2, 2.0),
    ]);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();

    let cycle = cycle(&broker, &notifier, reader, settings(true), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert_eq!(report.gaps.len(), 1);
    assert_eq!(
        report.gaps[0].kind,
        GapKind::QuantityMismatch {
            working_quantity: 2
        }
    );
    assert_eq!(report.gaps[0].quantity, 3);

    let mutations = broker.mutations();
    assert_eq!(mutations.len(), 2);
    assert!(matches!(&mutations[0], BrokerCall::Cancel { order_id, .. } if order_id == "2001"));
    assert!(matches!(&mutations[1], BrokerCall::Submit { spec, .. } if spec.quantity == 3));
    assert_eq!(notifier.matching("Stop quantity mismatch").len(), 1);
}

#[tokio::test]
async fn test_itm_short_replaces_working_stop_with_market_close() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 1, 5.0)]);
    broker.set_orders(vec![
        filled_entry(1001, SPX_PUT, 1, 5.0),
        working_stop(2001, SPX_PUT, 1, 2.0),
    ]);
    let notifier = notifier();
    let (writer, reader) = underlying_price_cell();
    writer.publish(Price::new(dec!(4395)));

    let cycle = cycle(&broker, &notifier, reader, settings(true), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert!(report.gaps.is_empty());
    assert_eq!(report.alerts.len(), 1);
    assert_eq!(
        report.alerts[0].existing_stop_order_id.as_deref(),
        Some("2001")
    );

    let mutations = broker.mutations();
    assert_eq!(mutations.len(), 1);
    match &mutations[0] {
        BrokerCall::Replace {
            existing_id, spec, ..
        } => {
            assert_eq!(existing_id, "2001");
            assert_eq!(spec, &OrderSpec::buy_to_close_market(SPX_PUT, 1));
        }
        other => panic!("expected replace, got {other:?}"),
    }
    assert_eq!(notifier.matching("ITM protection").len(), 1);
}

#[tokio::test]
async fn test_failed_itm_close_keeps_remaining_stops() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 1, 5.0)]);
    broker.set_orders(vec![
        filled_entry(1001, SPX_PUT, 1, 5.0),
        working_stop(2001, SPX_PUT, 1, 2.0),
        working_stop(2002, SPX_PUT, 1, 2.0),
    ]);
    broker.reject_symbol(SPX_PUT);
    let notifier = notifier();
    let (writer, reader) = underlying_price_cell();
    writer.publish(Price::new(dec!(4395)));

    let cycle = cycle(&broker, &notifier, reader, settings(true), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert_eq!(report.alerts.len(), 1);
    assert_eq!(report.alerts[0].other_stop_order_ids, vec!["2002".to_string()]);
    let dispatch = report.dispatch.expect("orders were dispatched");
    assert_eq!(dispatch.succeeded(), 0);
    assert_eq!(dispatch.failed(), 2);

    let mutations = broker.mutations();
    assert_eq!(mutations.len(), 1);
    assert!(matches!(&mutations[0], BrokerCall::Replace { existing_id, .. } if existing_id == "2001"));
}

#[tokio::test]
async fn test_itm_supersedes_missing_stop() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 2, 5.0)]);
    let notifier = notifier();
    let (writer, reader) = underlying_price_cell();
    writer.publish(Price::new(dec!(4402.5)));

    let cycle = cycle(&broker, &notifier, reader, settings(true), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert_eq!(report.gaps.len(), 1);
    assert_eq!(report.alerts.len(), 1);
    assert_eq!(
        submitted_specs(&broker),
        vec![OrderSpec::buy_to_close_market(SPX_PUT, 2)]
    );
}

#[tokio::test]
async fn test_far_underlying_does_not_alert() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 1, 5.0)]);
    let notifier = notifier();
    let (writer, reader) = underlying_price_cell();
    writer.publish(Price::new(dec!(4500)));

    let cycle = cycle(&broker, &notifier, reader, settings(false), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert!(report.alerts.is_empty());
    assert_eq!(report.gaps.len(), 1);
}

#[tokio::test]
async fn test_multiplier_mode_submits_one_stop_per_lot() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 5, 11.2)]);
    broker.set_orders(vec![
        filled_entry(1001, SPX_PUT, 2, 10.0),
        filled_entry(1002, SPX_PUT, 3, 12.0),
    ]);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();

    let mut settings = settings(true);
    settings.stop_policy = StopPolicy {
        mode: StopMode::Multiplier,
        trigger_value: dec!(2.5),
    };

    let cycle = cycle(&broker, &notifier, reader, settings, CancellationToken::new());
    cycle.run_once().await.unwrap();

    let specs = submitted_specs(&broker);
    assert_eq!(
        specs,
        vec![
            OrderSpec::buy_to_close_stop(SPX_PUT, 2, Price::new(dec!(25.00))),
            OrderSpec::buy_to_close_stop(SPX_PUT, 3, Price::new(dec!(30.00))),
        ]
    );
}

#[tokio::test]
async fn test_auto_submit_off_only_reports_plan() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 2, 3.10)]);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();

    let cycle = cycle(&broker, &notifier, reader, settings(false), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.planned.len(), 1);
    assert!(matches!(report.planned[0], PlannedAction::Submit { .. }));
    assert!(report.dispatch.is_none());
    assert!(broker.mutations().is_empty());
    assert_eq!(notifier.matching("auto-submit is off").len(), 1);
}

#[tokio::test]
async fn test_no_short_options_skips_order_book() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![equity("AAPL", 100)]);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();

    let cycle = cycle(&broker, &notifier, reader, settings(true), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::NoShorts);
    assert_eq!(report.census.equities, 1);
    assert_eq!(
        broker.calls(),
        vec![BrokerCall::FetchPositions {
            account_id: ACCOUNT.to_string()
        }]
    );
    assert_eq!(notifier.matching("1 equities").len(), 1);
}

#[tokio::test]
async fn test_fetch_failure_skips_cycle() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 2, 3.10)]);
    broker.set_fail_fetches(true);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();

    let cycle = cycle(&broker, &notifier, reader, settings(true), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::FetchFailed);
    assert!(broker.mutations().is_empty());

    // Next cycle recovers once the broker is reachable again.
    broker.set_fail_fetches(false);
    let report = cycle.run_once().await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(broker.mutations().len(), 1);
}

#[tokio::test]
async fn test_rejected_submission_does_not_block_others() {
    let other = "SPXW_061523P4300";
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![
        short_option(SPX_PUT, 1, 3.0),
        short_option(other, 1, 2.0),
    ]);
    broker.reject_symbol(SPX_PUT);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();

    let cycle = cycle(&broker, &notifier, reader, settings(true), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Completed);
    let dispatch = report.dispatch.expect("orders were dispatched");
    assert_eq!(dispatch.failed(), 1);
    assert_eq!(dispatch.succeeded(), 1);
    assert_eq!(broker.mutations().len(), 2);
    assert_eq!(notifier.matching("FAILED").len(), 1);
}

#[tokio::test]
async fn test_order_without_quantity_does_not_block_missing_stops() {
    let call = "SPXW_061523C4700";
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![
        short_option(SPX_PUT, 1, 3.0),
        short_option(call, 1, 2.0),
    ]);
    broker.set_orders(vec![working_stop_without_quantity(2001, call, 4.0)]);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();

    let cycle = cycle(&broker, &notifier, reader, settings(true), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.dropped_records, 1);
    assert_eq!(report.working_stops, 0);
    let mut symbols: Vec<_> = submitted_specs(&broker)
        .into_iter()
        .map(|spec| spec.symbol)
        .collect();
    symbols.sort();
    assert_eq!(symbols, vec![call.to_string(), SPX_PUT.to_string()]);
}

#[tokio::test]
async fn test_undecodable_position_does_not_hide_other_shorts() {
    let positions = positions_from_body(
        r#"{
            "securitiesAccount": {
                "positions": [
                    {"shortQuantity": 1.0, "instrument": {"symbol": "SPXW_061523C4700"}},
                    {
                        "shortQuantity": 2.0,
                        "averagePrice": 3.1,
                        "instrument": {"assetType": "OPTION", "symbol": "SPXW_061523P4400"}
                    }
                ]
            }
        }"#,
    );
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(positions);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();

    let cycle = cycle(&broker, &notifier, reader, settings(true), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.open_shorts, 1);
    assert_eq!(
        submitted_specs(&broker),
        vec![OrderSpec::buy_to_close_stop(SPX_PUT, 2, Price::new(dec!(2.00)))]
    );
}

#[tokio::test]
async fn test_order_with_non_option_leg_is_excluded() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 2, 4.0)]);
    broker.set_orders(vec![
        filled_with_equity_leg(1001, SPX_PUT, 2, 4.0),
        working_stop(2001, SPX_PUT, 1, 2.0),
    ]);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();

    let cycle = cycle(&broker, &notifier, reader, settings(true), CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    // Without entry fill data the mismatch cannot be judged.
    assert!(report.gaps.is_empty());
    assert_eq!(report.unverified, vec![SPX_PUT.to_string()]);
    assert!(broker.mutations().is_empty());
    assert_eq!(notifier.matching("Cannot verify").len(), 1);
}

#[tokio::test]
async fn test_cancelled_token_issues_no_broker_calls() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 2, 3.10)]);
    let notifier = notifier();
    let (_writer, reader) = underlying_price_cell();
    let token = CancellationToken::new();
    token.cancel();

    let cycle = cycle(&broker, &notifier, reader, settings(true), token);
    let report = cycle.run_once().await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Interrupted);
    assert!(broker.calls().is_empty());
}

#[tokio::test]
async fn test_itm_disabled_ignores_price() {
    let broker = Arc::new(MockBroker::new());
    broker.set_positions(vec![short_option(SPX_PUT, 1, 5.0)]);
    let notifier = notifier();
    let (writer, reader) = underlying_price_cell();
    writer.publish(Price::new(dec!(4400)));

    let mut settings = settings(false);
    settings.itm_protection_enabled = false;
    settings.itm_protection_offset = Decimal::ZERO;

    let cycle = cycle(&broker, &notifier, reader, settings, CancellationToken::new());
    let report = cycle.run_once().await.unwrap();

    assert!(report.alerts.is_empty());
}
