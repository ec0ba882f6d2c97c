//! Market definitions and window arithmetic
//!
//! A market is one 15-minute up/down cycle for one crypto, identified by the
//! floor-aligned unix timestamp of its window start.

mod discovery;

pub use discovery::{DiscoveryClient, DiscoveryConfig};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Window length in seconds
pub const WINDOW_SECS: i64 = 900;

/// An active 15-minute up/down market for one crypto
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDef {
    /// Market slug (e.g. "btc-updown-15m-1767638700")
    pub slug: String,
    /// Crypto the market tracks (e.g. "BTC")
    pub crypto: String,
    /// Outcome token paying out if price finishes up
    pub up_token_id: String,
    /// Outcome token paying out if price finishes down
    pub down_token_id: String,
    /// Floor-aligned window start (unix seconds)
    pub window_epoch: i64,
    /// Settlement time
    pub end_time: DateTime<Utc>,
}

/// Floor-align a timestamp to its window start epoch
pub fn window_epoch(ts: DateTime<Utc>) -> i64 {
    ts.timestamp().div_euclid(WINDOW_SECS) * WINDOW_SECS
}

/// Settlement time for a window epoch
pub fn window_end(epoch: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(epoch + WINDOW_SECS, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Seconds until settlement, clamped at zero
pub fn time_remaining_secs(end_time: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (end_time - now).num_seconds().max(0)
}
