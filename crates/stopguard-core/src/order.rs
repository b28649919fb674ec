//! Order-related enums and the order specification handed to the broker.
//!
//! Enum spellings follow the brokerage wire format (SCREAMING_SNAKE_CASE) so
//! the same types are used when decoding the order book and when encoding
//! order submissions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Price;

/// Leg instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    BuyToOpen,
    SellToOpen,
    BuyToClose,
    SellToClose,
    Buy,
    Sell,
    #[serde(other)]
    Other,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BuyToOpen => "BUY_TO_OPEN",
            Self::SellToOpen => "SELL_TO_OPEN",
            Self::BuyToClose => "BUY_TO_CLOSE",
            Self::SellToClose => "SELL_TO_CLOSE",
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Other => "OTHER",
        };
        write!(f, "{s}")
    }
}

/// Order status as reported in the order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Accepted,
    Queued,
    Working,
    PendingActivation,
    PendingCancel,
    PendingReplace,
    Filled,
    Expired,
    Canceled,
    Rejected,
    Replaced,
    #[serde(other)]
    Other,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "ACCEPTED",
            Self::Queued => "QUEUED",
            Self::Working => "WORKING",
            Self::PendingActivation => "PENDING_ACTIVATION",
            Self::PendingCancel => "PENDING_CANCEL",
            Self::PendingReplace => "PENDING_REPLACE",
            Self::Filled => "FILLED",
            Self::Expired => "EXPIRED",
            Self::Canceled => "CANCELED",
            Self::Rejected => "REJECTED",
            Self::Replaced => "REPLACED",
            Self::Other => "OTHER",
        };
        write!(f, "{s}")
    }
}

/// Instrument asset type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Option,
    Equity,
    FixedIncome,
    #[serde(other)]
    Other,
}

/// Put or call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PutCall {
    Put,
    Call,
}

/// Order type on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
    #[serde(other)]
    Other,
}

/// Order duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderDuration {
    #[default]
    Day,
    GoodTillCancel,
    FillOrKill,
}

/// Pricing of an order to be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    /// Stop order triggering at `stop_price`.
    Stop { stop_price: Price },
    /// Market order for immediate exit.
    Market,
}

impl OrderKind {
    /// Wire order type.
    pub fn order_type(&self) -> OrderType {
        match self {
            Self::Stop { .. } => OrderType::Stop,
            Self::Market => OrderType::Market,
        }
    }
}

/// Single-leg option order handed to the Broker Session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    /// Option symbol.
    pub symbol: String,
    /// Leg instruction (always BUY_TO_CLOSE for protective orders).
    pub instruction: Instruction,
    /// Contracts.
    pub quantity: u32,
    /// Stop or market.
    pub kind: OrderKind,
    /// Time in force.
    pub duration: OrderDuration,
}

impl OrderSpec {
    /// Good-till-cancel stop order buying back a short.
    #[must_use]
    pub fn buy_to_close_stop(symbol: impl Into<String>, quantity: u32, stop_price: Price) -> Self {
        Self {
            symbol: symbol.into(),
            instruction: Instruction::BuyToClose,
            quantity,
            kind: OrderKind::Stop { stop_price },
            duration: OrderDuration::GoodTillCancel,
        }
    }

    /// Day market order buying back a short.
    #[must_use]
    pub fn buy_to_close_market(symbol: impl Into<String>, quantity: u32) -> Self {
        Self {
            symbol: symbol.into(),
            instruction: Instruction::BuyToClose,
            quantity,
            kind: OrderKind::Market,
            duration: OrderDuration::Day,
        }
    }

    /// Stop price if this is a stop order.
    pub fn stop_price(&self) -> Option<Price> {
        match self.kind {
            OrderKind::Stop { stop_price } => Some(stop_price),
            OrderKind::Market => None,
        }
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OrderKind::Stop { stop_price } => write!(
                f,
                "{} {} x{} STOP @{}",
                self.instruction, self.symbol, self.quantity, stop_price
            ),
            OrderKind::Market => write!(
                f,
                "{} {} x{} MARKET",
                self.instruction, self.symbol, self.quantity
            ),
        }
    }
}
