//! Order book state management

use super::{BookUpdate, PriceLevel};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// L2 aggregated order book for a token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    /// Token identifier
    pub token_id: String,
    /// Bid levels, sorted best (highest) to worst
    pub bids: Vec<PriceLevel>,
    /// Ask levels, sorted best (lowest) to worst
    pub asks: Vec<PriceLevel>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(token_id: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            bids: vec![],
            asks: vec![],
            updated_at: Utc::now(),
        }
    }

    /// Best bid price (max over resting bids)
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Best ask price (min over resting asks)
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Quoted spread
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Size resting at the best bid
    pub fn best_bid_size(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.size)
    }

    /// Size resting at the best ask
    pub fn best_ask_size(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.size)
    }
}

/// Current books by token id, merging incremental updates
pub struct BookCache {
    books: HashMap<String, OrderBook>,
}

impl BookCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            books: HashMap::new(),
        }
    }

    /// Apply an update as tagged: snapshots replace, deltas merge
    pub fn apply(&mut self, update: BookUpdate) {
        match update {
            BookUpdate::Snapshot(book) => self.apply_snapshot(book),
            BookUpdate::Delta(book) => self.apply_delta(book),
        }
    }

    /// Apply a full snapshot, replacing any existing book for the token
    pub fn apply_snapshot(&mut self, book: OrderBook) {
        self.books.insert(book.token_id.clone(), book);
    }

    /// Merge an incremental delta into the existing book
    ///
    /// Levels with zero size are removed; unknown tokens get a fresh book
    /// seeded from the delta.
    pub fn apply_delta(&mut self, delta: OrderBook) {
        let existing = self
            .books
            .entry(delta.token_id.clone())
            .or_insert_with(|| OrderBook::new(delta.token_id.clone()));

        for level in delta.bids {
            match existing.bids.iter().position(|l| l.price == level.price) {
                Some(pos) if level.size.is_zero() => {
                    existing.bids.remove(pos);
                }
                Some(pos) => existing.bids[pos].size = level.size,
                None if !level.size.is_zero() => existing.bids.push(level),
                None => {}
            }
        }
        existing.bids.sort_by(|a, b| b.price.cmp(&a.price));

        for level in delta.asks {
            match existing.asks.iter().position(|l| l.price == level.price) {
                Some(pos) if level.size.is_zero() => {
                    existing.asks.remove(pos);
                }
                Some(pos) => existing.asks[pos].size = level.size,
                None if !level.size.is_zero() => existing.asks.push(level),
                None => {}
            }
        }
        existing.asks.sort_by(|a, b| a.price.cmp(&b.price));

        existing.updated_at = delta.updated_at;
    }

    /// Get a book by token id
    pub fn get(&self, token_id: &str) -> Option<&OrderBook> {
        self.books.get(token_id)
    }

    /// Whether a book exists for the token
    pub fn has_token(&self, token_id: &str) -> bool {
        self.books.contains_key(token_id)
    }

    /// Drop books for tokens no longer tracked (e.g. after a window rollover)
    pub fn retain_tokens(&mut self, token_ids: &[String]) {
        self.books.retain(|id, _| token_ids.iter().any(|t| t == id));
    }

    /// Number of tracked books
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

impl Default for BookCache {
    fn default() -> Self {
        Self::new()
    }
}
