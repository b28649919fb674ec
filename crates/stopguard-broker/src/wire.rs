//! Typed request/response structures for the brokerage REST API.
//!
//! Responses are decoded once at the session boundary into these structures;
//! absent fields are explicit `Option`s or defaulted collections. Business
//! logic never sees untyped JSON. A position or order that does not decode is
//! dropped from its collection without failing the rest of the snapshot.

use rust_decimal::Decimal;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use stopguard_core::{
    AssetType, Instruction, OrderDuration, OrderSpec, OrderStatus, OrderType, Price, PutCall,
};

/// Deserialize a price, accepting String, Number or null.
fn deserialize_opt_price<'de, D>(deserializer: D) -> Result<Option<Price>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct PriceVisitor;

    impl<'de> Visitor<'de> for PriceVisitor {
        type Value = Option<Price>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, number, or null for a price")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_some<D2>(self, deserializer: D2) -> Result<Self::Value, D2::Error>
        where
            D2: serde::Deserializer<'de>,
        {
            deserializer.deserialize_any(self)
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            v.trim()
                .parse::<Decimal>()
                .map(|d| Some(Price::new(d)))
                .map_err(de::Error::custom)
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            // Round-trip through the shortest string form so 2.35 stays 2.35.
            let s = v.to_string();
            s.parse::<Decimal>()
                .map(|d| Some(Price::new(d)))
                .map_err(de::Error::custom)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Price::new(Decimal::from(v))))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Price::new(Decimal::from(v))))
        }
    }

    deserializer.deserialize_any(PriceVisitor)
}

/// Deserialize an identifier that the API sends as either a number or a
/// string.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer identifier")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v.to_string())
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v.to_string())
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

/// Deserialize a collection element by element. Elements that fail to decode
/// are logged and skipped; `null` reads as empty.
fn deserialize_lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    let record = std::any::type_name::<T>().rsplit("::").next().unwrap_or("record");

    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(record, index, error = %e, "Dropping undecodable record");
                None
            }
        })
        .collect())
}

// ============================================================================
// Account snapshot (positions / orders)
// ============================================================================

/// `GET /accounts/{id}?fields=positions|orders` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub securities_account: SecuritiesAccount,
}

/// Account body. Either collection may be absent depending on `fields`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritiesAccount {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_vec")]
    pub positions: Vec<RawPosition>,
    #[serde(default, deserialize_with = "deserialize_lenient_vec")]
    pub order_strategies: Vec<RawOrderStrategy>,
}

/// Instrument descriptor shared by positions and order legs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInstrument {
    pub asset_type: AssetType,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub cusip: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub put_call: Option<PutCall>,
    #[serde(default)]
    pub underlying_symbol: Option<String>,
    #[serde(default)]
    pub maturity_date: Option<String>,
    #[serde(default)]
    pub factor: Option<f64>,
}

/// One account position.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPosition {
    #[serde(default)]
    pub short_quantity: f64,
    #[serde(default)]
    pub long_quantity: f64,
    #[serde(default, deserialize_with = "deserialize_opt_price")]
    pub average_price: Option<Price>,
    pub instrument: RawInstrument,
}

/// One top-level order strategy from the order book.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrderStrategy {
    #[serde(deserialize_with = "deserialize_id")]
    pub order_id: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub entered_time: Option<String>,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub order_type: Option<OrderType>,
    #[serde(default, deserialize_with = "deserialize_opt_price")]
    pub price: Option<Price>,
    #[serde(default, deserialize_with = "deserialize_opt_price")]
    pub stop_price: Option<Price>,
    #[serde(default)]
    pub order_leg_collection: Vec<RawOrderLeg>,
    #[serde(default)]
    pub order_activity_collection: Vec<RawOrderActivity>,
    /// Present on OCO / trigger compound orders. Contents are not inspected.
    #[serde(default)]
    pub child_order_strategies: Option<Vec<IgnoredAny>>,
}

impl RawOrderStrategy {
    /// True for compound (OCO / trigger) orders.
    pub fn is_compound(&self) -> bool {
        self.child_order_strategies.is_some()
    }
}

/// One leg of an order strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrderLeg {
    #[serde(deserialize_with = "deserialize_id")]
    pub leg_id: String,
    pub instruction: Instruction,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub order_leg_type: Option<AssetType>,
    pub instrument: RawInstrument,
}

/// Order activity (executions).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrderActivity {
    #[serde(default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub execution_legs: Vec<RawExecutionLeg>,
}

/// A single execution of one leg.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExecutionLeg {
    #[serde(deserialize_with = "deserialize_id")]
    pub leg_id: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default, deserialize_with = "deserialize_opt_price")]
    pub price: Option<Price>,
    #[serde(default)]
    pub time: Option<String>,
}

// ============================================================================
// Quotes
// ============================================================================

/// One entry of `GET /marketdata/{symbol}/quotes`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuote {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_price")]
    pub last_price: Option<Price>,
    #[serde(default, deserialize_with = "deserialize_opt_price")]
    pub mark: Option<Price>,
}

impl RawQuote {
    /// Last trade price, falling back to mark.
    pub fn best_price(&self) -> Option<Price> {
        self.last_price.or(self.mark)
    }
}

/// Quotes response keyed by symbol.
pub type QuotesResponse = HashMap<String, RawQuote>;

// ============================================================================
// Order placement
// ============================================================================

/// Order placement body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub order_type: OrderType,
    pub session: &'static str,
    pub duration: OrderDuration,
    pub order_strategy_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
    pub order_leg_collection: Vec<OrderLegRequest>,
}

/// Leg of an order placement body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLegRequest {
    pub instruction: Instruction,
    pub quantity: u32,
    pub instrument: InstrumentRequest,
}

/// Instrument of an order placement leg.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentRequest {
    pub symbol: String,
    pub asset_type: AssetType,
}

impl From<&OrderSpec> for OrderRequest {
    fn from(spec: &OrderSpec) -> Self {
        Self {
            order_type: spec.kind.order_type(),
            session: "NORMAL",
            duration: spec.duration,
            order_strategy_type: "SINGLE",
            stop_price: spec.stop_price().map(|p| format!("{:.2}", p.inner())),
            order_leg_collection: vec![OrderLegRequest {
                instruction: spec.instruction,
                quantity: spec.quantity,
                instrument: InstrumentRequest {
                    symbol: spec.symbol.clone(),
                    asset_type: AssetType::Option,
                },
            }],
        }
    }
}
