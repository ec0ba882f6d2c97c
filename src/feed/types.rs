//! Price feed types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single spot price tick from the reference exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    /// Crypto the price refers to (e.g. "BTC")
    pub crypto: String,
    /// Trading symbol on the reference exchange (e.g. "BTCUSDT")
    pub symbol: String,
    /// Trade price
    pub price: Decimal,
    /// Local timestamp when the tick was received
    pub timestamp: DateTime<Utc>,
    /// Exchange-reported trade timestamp
    pub exchange_ts: DateTime<Utc>,
}

/// Connection status reported by a feed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Feed connected and streaming
    Connected,
    /// Connection lost, reconnect scheduled
    Reconnecting { attempt: u32 },
    /// Reconnect budget exhausted; feed stopped retrying
    Exhausted,
}

impl FeedStatus {
    /// Whether the feed is currently delivering data
    pub fn is_connected(self) -> bool {
        matches!(self, FeedStatus::Connected)
    }
}
