//! Order lifecycle module
//!
//! A single order moves forward through a fixed state graph and reaches
//! exactly one terminal state. The [`OrderLedger`] owns every order record;
//! the rest of the engine holds only ids.

mod ledger;

pub use ledger::OrderLedger;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Order identifier
pub type OrderId = Uuid;

/// Trade side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// Which outcome token the order trades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSide {
    /// Price finishes above the window open
    Up,
    /// Price finishes at or below the window open
    Down,
}

impl TokenSide {
    /// The complementary outcome
    pub fn opposite(self) -> Self {
        match self {
            TokenSide::Up => TokenSide::Down,
            TokenSide::Down => TokenSide::Up,
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Fill-or-kill: executes fully and immediately or not at all
    Fok,
    /// Good-til-cancelled: rests on the book until filled or cancelled
    Gtc,
}

/// Order lifecycle state
///
/// `Created → Submitted → {Open, Filled, Rejected, Failed}`,
/// `Open → {Filled, Cancelled, Failed}`. Filled, Rejected, Cancelled and
/// Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Created,
    Submitted,
    Open,
    Filled,
    Rejected,
    Cancelled,
    Failed,
}

impl OrderState {
    /// Whether this state is terminal
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Rejected | OrderState::Cancelled | OrderState::Failed
        )
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderState::Created => "created",
            OrderState::Submitted => "submitted",
            OrderState::Open => "open",
            OrderState::Filled => "filled",
            OrderState::Rejected => "rejected",
            OrderState::Cancelled => "cancelled",
            OrderState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A single execution applied to an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// Execution price
    pub price: Decimal,
    /// Executed size
    pub size: Decimal,
    /// Fee charged for this execution
    pub fee: Decimal,
}

/// Parameters for creating a new order
#[derive(Debug, Clone)]
pub struct OrderParams {
    /// Token the order trades
    pub token_id: String,
    /// Market slug
    pub market_slug: String,
    /// Crypto the market tracks (e.g. "BTC")
    pub crypto: String,
    /// Floor-aligned window start epoch (unix seconds)
    pub window_epoch: i64,
    /// Buy or sell
    pub side: Side,
    /// Up or down outcome token
    pub token_side: TokenSide,
    /// Requested limit price
    pub price: Decimal,
    /// Requested size
    pub size: Decimal,
    /// FOK or GTC
    pub order_type: OrderType,
    /// For exit orders, the entry order this closes
    pub parent_order_id: Option<OrderId>,
    /// Strategy that produced the signal
    pub strategy: String,
    /// Originating signal description
    pub signal: String,
}

/// A tracked order record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub token_id: String,
    pub market_slug: String,
    pub crypto: String,
    pub window_epoch: i64,
    pub side: Side,
    pub token_side: TokenSide,
    pub requested_price: Decimal,
    pub requested_size: Decimal,
    pub order_type: OrderType,
    pub state: OrderState,
    /// Assigned by the exchange after submission
    pub exchange_order_id: Option<String>,
    /// Cumulative filled size, never exceeds `requested_size`
    pub filled_size: Decimal,
    /// Cumulative filled notional, kept so the weighted mean survives export/import
    pub filled_notional: Decimal,
    /// Size-weighted mean price over all applied fills
    pub filled_price: Option<Decimal>,
    /// Total fees across fills
    pub fees: Decimal,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub filled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Reason recorded on rejection, failure or cancellation
    pub terminal_reason: Option<String>,
    pub parent_order_id: Option<OrderId>,
    pub strategy: String,
    pub signal: String,
}

impl Order {
    /// Remaining unfilled size
    pub fn remaining_size(&self) -> Decimal {
        self.requested_size - self.filled_size
    }

    /// Whether the order has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Order lifecycle errors
#[derive(Debug, Error)]
pub enum OrderError {
    /// No order with this id is tracked
    #[error("unknown order {0}")]
    Unknown(OrderId),
    /// The requested edge does not exist in the state graph
    #[error("illegal transition for order {id}: {from} -> {to}")]
    IllegalTransition {
        id: OrderId,
        from: OrderState,
        to: OrderState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(OrderState::Filled.is_terminal());
        assert!(OrderState::Rejected.is_terminal());
        assert!(OrderState::Cancelled.is_terminal());
        assert!(OrderState::Failed.is_terminal());
        assert!(!OrderState::Created.is_terminal());
        assert!(!OrderState::Submitted.is_terminal());
        assert!(!OrderState::Open.is_terminal());
    }

    #[test]
    fn test_token_side_opposite() {
        assert_eq!(TokenSide::Up.opposite(), TokenSide::Down);
        assert_eq!(TokenSide::Down.opposite(), TokenSide::Up);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(OrderState::Submitted.to_string(), "submitted");
        assert_eq!(OrderState::Cancelled.to_string(), "cancelled");
    }
}
