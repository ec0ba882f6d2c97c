//! Open position tracking
//!
//! At most one open position exists per crypto per window. Created when an
//! entry order fills; destroyed, with P&L realized, when the matching exit
//! fills.

use crate::order::{OrderId, TokenSide};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An open position in one window's outcome token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub crypto: String,
    pub window_epoch: i64,
    pub token_side: TokenSide,
    /// Actual filled size; partial entry fills form a partial position
    pub size: Decimal,
    /// Size-weighted entry price
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    /// The entry order that opened this position
    pub entry_order_id: OrderId,
}

impl Position {
    /// Map key: one position per crypto per window
    pub fn key(&self) -> (String, i64) {
        (self.crypto.clone(), self.window_epoch)
    }
}
