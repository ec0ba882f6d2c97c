//! Exchange client interface
//!
//! The engine talks to the prediction-market exchange only through this
//! trait. Wire protocol, authentication and order signing live behind it;
//! submission retries with backoff are the client's concern, never the
//! engine's.

mod paper;

pub use paper::PaperExchange;

use crate::market::MarketDef;
use crate::order::{Fill, OrderType, Side};
use crate::orderbook::OrderBook;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Exchange-level errors, mapped onto order terminal states by the engine
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    /// The exchange refused the order (4xx, e.g. insufficient balance).
    /// Permanent for this order; never retried.
    #[error("order rejected by exchange: {0}")]
    Rejected(String),
    /// Network or exchange-side failure (5xx) during an order operation.
    /// Terminal for this order id; a re-attempt requires a new order.
    #[error("order system error: {0}")]
    System(String),
    /// The exchange is unreachable for non-order operations
    #[error("exchange unreachable: {0}")]
    Connectivity(String),
}

/// API key metadata
#[derive(Debug, Clone)]
pub struct ApiKeyInfo {
    pub key_id: String,
    pub can_trade: bool,
}

/// A single asset balance
#[derive(Debug, Clone)]
pub struct Balance {
    pub asset: String,
    pub available: Decimal,
}

/// An order submission request
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub token_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
    pub order_type: OrderType,
}

/// How the exchange acknowledged an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// Fully executed immediately
    Filled,
    /// Resting on the book
    Open,
}

/// Exchange acknowledgment of a submitted order
#[derive(Debug, Clone)]
pub struct PlaceOrderResponse {
    /// Exchange-assigned order id
    pub order_id: String,
    pub status: AckStatus,
    /// Executions applied on submission (FOK orders fill here)
    pub fills: Vec<Fill>,
}

/// Client interface to the prediction-market exchange
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Server time; also serves as the connectivity probe
    async fn get_time(&self) -> Result<DateTime<Utc>, ExchangeError>;
    /// Metadata for the configured API key
    async fn get_api_key_info(&self) -> Result<ApiKeyInfo, ExchangeError>;
    /// Account balances
    async fn get_balances(&self) -> Result<Vec<Balance>, ExchangeError>;
    /// The active 15-minute market for a crypto, if one is listed
    async fn get_current_market(&self, crypto: &str) -> Result<Option<MarketDef>, ExchangeError>;
    /// Current order book for a token
    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook, ExchangeError>;
    /// Submit an order
    async fn place_order(&self, req: PlaceOrderRequest)
        -> Result<PlaceOrderResponse, ExchangeError>;
    /// Cancel a resting order
    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError>;
    /// Cancel every resting order for this account
    async fn cancel_all_orders(&self) -> Result<(), ExchangeError>;
}
