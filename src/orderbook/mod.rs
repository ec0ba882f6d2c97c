//! Prediction-market order book module
//!
//! Maintains L2 books for the outcome tokens being traded, fed by the CLOB
//! WebSocket stream.

mod book;
mod client;

pub use book::{BookCache, OrderBook};
pub use client::{BookFeedHandle, ClobConfig, ClobFeed};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price level of an L2 book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// A book update tagged with how the wire event said to apply it
///
/// The distinction comes from the CLOB event type: a `book` event is a full
/// snapshot that replaces the cached book (the exchange resends one after
/// every reconnect to resync), a `price_change` event is an incremental
/// delta that merges into it. Level counts say nothing — a 15-minute market
/// book is often only a level or two deep.
#[derive(Debug, Clone)]
pub enum BookUpdate {
    /// Full snapshot; replaces any cached book for the token
    Snapshot(OrderBook),
    /// Incremental delta; merges into the cached book
    Delta(OrderBook),
}

impl BookUpdate {
    /// The book carried by this update
    pub fn book(&self) -> &OrderBook {
        match self {
            BookUpdate::Snapshot(book) | BookUpdate::Delta(book) => book,
        }
    }

    /// Token the update refers to
    pub fn token_id(&self) -> &str {
        &self.book().token_id
    }
}
