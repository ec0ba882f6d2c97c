//! Session-wide counters
//!
//! Aggregated over the process lifetime; reset only on restart.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Counters and P&L for the current session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub started_at: DateTime<Utc>,
    pub ticks_processed: u64,
    pub orders_placed: u64,
    pub orders_filled: u64,
    pub orders_rejected: u64,
    pub orders_failed: u64,
    pub orders_cancelled: u64,
    /// Completed entry/exit round trips
    pub trades_executed: u64,
    /// Signals dropped by the risk gate
    pub risk_blocks: u64,
    /// Realized P&L before fees
    pub gross_pnl: Decimal,
    /// Total fees paid
    pub fees_paid: Decimal,
    /// Realized P&L after fees
    pub net_pnl: Decimal,
}

impl SessionStats {
    /// Fresh counters for a new session
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            ticks_processed: 0,
            orders_placed: 0,
            orders_filled: 0,
            orders_rejected: 0,
            orders_failed: 0,
            orders_cancelled: 0,
            trades_executed: 0,
            risk_blocks: 0,
            gross_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
            net_pnl: Decimal::ZERO,
        }
    }

    /// Record a completed round trip
    pub fn record_trade(&mut self, gross_pnl: Decimal, fees: Decimal) {
        self.trades_executed += 1;
        self.gross_pnl += gross_pnl;
        self.fees_paid += fees;
        self.net_pnl += gross_pnl - fees;
    }
}
