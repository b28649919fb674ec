//! Shared fixtures: broker payloads and cycle wiring.

#![allow(dead_code)]

use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use stopguard_bot::{CycleSettings, ReconciliationCycle};
use stopguard_broker::{AccountResponse, MockBroker, RawOrderStrategy, RawPosition};
use stopguard_executor::{StopMode, StopPolicy};
use stopguard_feed::UnderlyingPriceReader;
use stopguard_telemetry::{MemoryNotifier, NotificationLevel};

pub const ACCOUNT: &str = "123456789";
pub const ENTERED: &str = "2023-06-15T14:30:00+0000";

fn option_instrument(symbol: &str) -> serde_json::Value {
    json!({
        "assetType": "OPTION",
        "symbol": symbol,
        "underlyingSymbol": "$SPX.X",
        "putCall": "PUT"
    })
}

/// Open short option position.
pub fn short_option(symbol: &str, quantity: u32, average_price: f64) -> RawPosition {
    serde_json::from_value(json!({
        "shortQuantity": f64::from(quantity),
        "longQuantity": 0.0,
        "averagePrice": average_price,
        "instrument": option_instrument(symbol)
    }))
    .unwrap()
}

/// Long equity position.
pub fn equity(symbol: &str, quantity: u32) -> RawPosition {
    serde_json::from_value(json!({
        "shortQuantity": 0.0,
        "longQuantity": f64::from(quantity),
        "averagePrice": 150.0,
        "instrument": {"assetType": "EQUITY", "symbol": symbol}
    }))
    .unwrap()
}

/// Working BUY_TO_CLOSE stop order.
pub fn working_stop(order_id: u64, symbol: &str, quantity: u32, stop_price: f64) -> RawOrderStrategy {
    serde_json::from_value(json!({
        "orderId": order_id,
        "status": "WORKING",
        "enteredTime": ENTERED,
        "quantity": f64::from(quantity),
        "orderType": "STOP",
        "stopPrice": stop_price,
        "orderLegCollection": [{
            "legId": 1,
            "instruction": "BUY_TO_CLOSE",
            "quantity": f64::from(quantity),
            "orderLegType": "OPTION",
            "instrument": option_instrument(symbol)
        }]
    }))
    .unwrap()
}

/// Working BUY_TO_CLOSE stop whose order and leg both omit `quantity`.
pub fn working_stop_without_quantity(order_id: u64, symbol: &str, stop_price: f64) -> RawOrderStrategy {
    serde_json::from_value(json!({
        "orderId": order_id,
        "status": "WORKING",
        "enteredTime": ENTERED,
        "orderType": "STOP",
        "stopPrice": stop_price,
        "orderLegCollection": [{
            "legId": 1,
            "instruction": "BUY_TO_CLOSE",
            "orderLegType": "OPTION",
            "instrument": option_instrument(symbol)
        }]
    }))
    .unwrap()
}

/// Positions decoded from a raw `fields=positions` account body.
pub fn positions_from_body(body: &str) -> Vec<RawPosition> {
    serde_json::from_str::<AccountResponse>(body)
        .unwrap()
        .securities_account
        .positions
}

/// Filled SELL_TO_OPEN entry with one execution at `price`.
pub fn filled_entry(order_id: u64, symbol: &str, quantity: u32, price: f64) -> RawOrderStrategy {
    serde_json::from_value(json!({
        "orderId": order_id,
        "status": "FILLED",
        "enteredTime": ENTERED,
        "quantity": f64::from(quantity),
        "price": price,
        "orderLegCollection": [{
            "legId": 1,
            "instruction": "SELL_TO_OPEN",
            "quantity": f64::from(quantity),
            "orderLegType": "OPTION",
            "instrument": option_instrument(symbol)
        }],
        "orderActivityCollection": [{
            "activityType": "EXECUTION",
            "executionLegs": [{"legId": 1, "quantity": f64::from(quantity), "price": price}]
        }]
    }))
    .unwrap()
}

/// Filled order with an option leg and an equity leg.
pub fn filled_with_equity_leg(order_id: u64, symbol: &str, quantity: u32, price: f64) -> RawOrderStrategy {
    serde_json::from_value(json!({
        "orderId": order_id,
        "status": "FILLED",
        "enteredTime": ENTERED,
        "quantity": f64::from(quantity),
        "orderLegCollection": [
            {
                "legId": 1,
                "instruction": "SELL_TO_OPEN",
                "quantity": f64::from(quantity),
                "orderLegType": "OPTION",
                "instrument": option_instrument(symbol)
            },
            {
                "legId": 2,
                "instruction": "BUY",
                "quantity": 100.0,
                "orderLegType": "EQUITY",
                "instrument": {"assetType": "EQUITY", "symbol": "SPY"}
            }
        ],
        "orderActivityCollection": [{
            "activityType": "EXECUTION",
            "executionLegs": [
                {"legId": 1, "quantity": f64::from(quantity), "price": price},
                {"legId": 2, "quantity": 100.0, "price": 440.0}
            ]
        }]
    }))
    .unwrap()
}

/// Fixed-mode settings with a 2.00 trigger and a 5 point ITM offset.
pub fn settings(auto_submit: bool) -> CycleSettings {
    CycleSettings {
        account_id: ACCOUNT.to_string(),
        stop_policy: StopPolicy {
            mode: StopMode::Fixed,
            trigger_value: Decimal::from(2),
        },
        itm_protection_enabled: true,
        itm_protection_offset: Decimal::from(5),
        auto_submit,
        max_price_age: chrono::Duration::seconds(10),
    }
}

pub fn notifier() -> Arc<MemoryNotifier> {
    Arc::new(MemoryNotifier::new(NotificationLevel::All))
}

pub fn cycle(
    broker: &Arc<MockBroker>,
    notifier: &Arc<MemoryNotifier>,
    prices: UnderlyingPriceReader,
    settings: CycleSettings,
    shutdown: CancellationToken,
) -> ReconciliationCycle {
    ReconciliationCycle::new(broker.clone(), notifier.clone(), prices, settings, shutdown)
}
