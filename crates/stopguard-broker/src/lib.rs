//! Broker Session for stopguard.
//!
//! Everything the monitor needs from the brokerage goes through the
//! [`BrokerSession`] trait:
//! - Typed wire structures decoded once at this boundary (`wire`)
//! - REST client with bearer-token auth (`RestBrokerClient`)
//! - In-memory `MockBroker` for tests and dry runs

pub mod client;
pub mod error;
pub mod mock;
pub mod session;
pub mod wire;

pub use client::{RestBrokerClient, DEFAULT_TIMEOUT};
pub use error::{BrokerError, BrokerResult};
pub use mock::{BrokerCall, MockBroker};
pub use session::{
    extract_order_id, BoxFuture, BrokerSession, DynBrokerSession, OrderAck, OrderBookSnapshot,
    PositionSnapshot,
};
pub use wire::{
    AccountResponse, OrderRequest, QuotesResponse, RawExecutionLeg, RawInstrument,
    RawOrderActivity, RawOrderLeg, RawOrderStrategy, RawPosition, RawQuote, SecuritiesAccount,
};
