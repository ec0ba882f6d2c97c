//! Tick synthesis
//!
//! Combines the up-token order book with the reference spot price into one
//! comparable snapshot per book delta. Down-side quotes are derived from the
//! up book: the two outcomes are complementary probabilities, so
//! `down_bid = 1 - up_ask` and `down_ask = 1 - up_bid`.
//!
//! Ticks are ephemeral: regenerated on every delta, never cached across
//! synthesis cycles, and dropped entirely when either input is missing.

use crate::feed::PriceTick;
use crate::market::{time_remaining_secs, MarketDef};
use crate::order::TokenSide;
use crate::orderbook::{BookCache, BookUpdate};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A synthesized market snapshot for one crypto at one instant
#[derive(Debug, Clone)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub crypto: String,
    pub window_epoch: i64,
    pub time_remaining_secs: i64,
    /// Reference spot price
    pub spot_price: Decimal,
    pub up_bid: Decimal,
    pub up_ask: Decimal,
    pub up_mid: Decimal,
    pub down_bid: Decimal,
    pub down_ask: Decimal,
    pub down_mid: Decimal,
    /// Dollar depth resting at the best up bid
    pub up_bid_depth: Decimal,
    /// Dollar depth resting at the best up ask
    pub up_ask_depth: Decimal,
    pub spread: Decimal,
    /// Spread as a percentage of mid
    pub spread_pct: Decimal,
    /// The active market this tick describes
    pub market: MarketDef,
}

impl Tick {
    /// Best ask for the given outcome token
    pub fn ask(&self, side: TokenSide) -> Decimal {
        match side {
            TokenSide::Up => self.up_ask,
            TokenSide::Down => self.down_ask,
        }
    }

    /// Best bid for the given outcome token
    pub fn bid(&self, side: TokenSide) -> Decimal {
        match side {
            TokenSide::Up => self.up_bid,
            TokenSide::Down => self.down_bid,
        }
    }

    /// Token id for the given outcome
    pub fn token_id(&self, side: TokenSide) -> &str {
        match side {
            TokenSide::Up => &self.market.up_token_id,
            TokenSide::Down => &self.market.down_token_id,
        }
    }
}

/// Synthesizes ticks from book deltas and spot prices
pub struct TickSynth {
    books: BookCache,
    spots: HashMap<String, PriceTick>,
    markets: HashMap<String, MarketDef>,
    /// up token id -> crypto
    token_index: HashMap<String, String>,
}

impl TickSynth {
    /// Create an empty synthesizer
    pub fn new() -> Self {
        Self {
            books: BookCache::new(),
            spots: HashMap::new(),
            markets: HashMap::new(),
            token_index: HashMap::new(),
        }
    }

    /// Track (or replace) the active market for a crypto
    ///
    /// Replacing drops the old window's book state and token index entry.
    pub fn set_market(&mut self, market: MarketDef) {
        if let Some(old) = self.markets.get(&market.crypto) {
            self.token_index.remove(&old.up_token_id);
        }
        self.token_index
            .insert(market.up_token_id.clone(), market.crypto.clone());
        let tracked: Vec<String> = self
            .markets
            .values()
            .filter(|m| m.crypto != market.crypto)
            .map(|m| m.up_token_id.clone())
            .chain(std::iter::once(market.up_token_id.clone()))
            .collect();
        self.books.retain_tokens(&tracked);
        self.markets.insert(market.crypto.clone(), market);
    }

    /// The active market for a crypto
    pub fn market(&self, crypto: &str) -> Option<&MarketDef> {
        self.markets.get(crypto)
    }

    /// All tracked markets
    pub fn markets(&self) -> impl Iterator<Item = &MarketDef> {
        self.markets.values()
    }

    /// Record the latest spot price for a crypto
    pub fn on_spot(&mut self, tick: PriceTick) {
        self.spots.insert(tick.crypto.clone(), tick);
    }

    /// Apply a book update and synthesize a tick if both inputs exist
    ///
    /// The update carries its own application mode from the wire event type:
    /// snapshots replace the cached book, deltas merge into it. Returns
    /// None, emitting nothing, when the token is not tracked, the spot price
    /// is missing, or the book is one-sided.
    pub fn on_book(&mut self, update: BookUpdate, now: DateTime<Utc>) -> Option<Tick> {
        let token_id = update.token_id().to_string();
        self.books.apply(update);

        let crypto = self.token_index.get(&token_id)?.clone();
        let market = self.markets.get(&crypto)?.clone();
        let spot = match self.spots.get(&crypto) {
            Some(spot) => spot,
            None => {
                tracing::debug!(crypto = %crypto, "No spot price yet, dropping tick");
                return None;
            }
        };

        let book = self.books.get(&token_id)?;
        let (up_bid, up_ask) = match (book.best_bid(), book.best_ask()) {
            (Some(bid), Some(ask)) => (bid, ask),
            _ => {
                tracing::debug!(crypto = %crypto, "One-sided book, dropping tick");
                return None;
            }
        };

        let up_mid = (up_bid + up_ask) / Decimal::TWO;
        let down_bid = Decimal::ONE - up_ask;
        let down_ask = Decimal::ONE - up_bid;
        let down_mid = (down_bid + down_ask) / Decimal::TWO;
        let spread = up_ask - up_bid;
        let spread_pct = if up_mid.is_zero() {
            Decimal::ZERO
        } else {
            spread / up_mid * Decimal::ONE_HUNDRED
        };

        let up_bid_depth = up_bid * book.best_bid_size().unwrap_or(Decimal::ZERO);
        let up_ask_depth = up_ask * book.best_ask_size().unwrap_or(Decimal::ZERO);

        Some(Tick {
            timestamp: now,
            crypto,
            window_epoch: market.window_epoch,
            time_remaining_secs: time_remaining_secs(market.end_time, now),
            spot_price: spot.price,
            up_bid,
            up_ask,
            up_mid,
            down_bid,
            down_ask,
            down_mid,
            up_bid_depth,
            up_ask_depth,
            spread,
            spread_pct,
            market,
        })
    }
}

impl Default for TickSynth {
    fn default() -> Self {
        Self::new()
    }
}
