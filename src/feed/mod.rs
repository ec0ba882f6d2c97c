//! Spot price feed module
//!
//! Streams reference prices for the cryptos being traded. Feeds reconnect on
//! their own; connection state flows to the engine over a status channel so
//! feed exhaustion degrades the engine instead of leaving it blind.

mod binance;
mod types;

pub use binance::{BinanceFeed, FeedReconnect};
pub use types::{FeedStatus, PriceTick};

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Channels handed to the engine by a running feed
pub struct FeedSubscription {
    /// Price ticks in arrival order
    pub ticks: mpsc::Receiver<PriceTick>,
    /// Connection status changes
    pub status: mpsc::Receiver<FeedStatus>,
}

/// Trait for spot price feed implementations
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Start streaming and return the subscription channels
    async fn subscribe(&self) -> anyhow::Result<FeedSubscription>;
}
