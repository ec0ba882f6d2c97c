//! Binance WebSocket spot price feed

use super::types::{FeedStatus, PriceTick};
use super::{FeedSubscription, PriceFeed};
use crate::ws::{WsClient, WsConfig, WsEvent};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;

/// Binance WebSocket base URL
const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Binance trade stream message
#[derive(Debug, Deserialize)]
struct BinanceTradeMessage {
    /// Event type
    #[serde(rename = "e")]
    event_type: String,
    /// Symbol
    #[serde(rename = "s")]
    symbol: String,
    /// Price
    #[serde(rename = "p")]
    price: String,
    /// Trade time (milliseconds)
    #[serde(rename = "T")]
    trade_time: i64,
}

/// Reconnection tuning for the feed
#[derive(Debug, Clone)]
pub struct FeedReconnect {
    pub max_failures: u32,
    pub delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for FeedReconnect {
    fn default() -> Self {
        Self {
            max_failures: 10,
            delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Spot price feed over Binance's trade stream
pub struct BinanceFeed {
    crypto: String,
    symbol: String,
    reconnect: FeedReconnect,
}

impl BinanceFeed {
    /// Create a feed mapping `symbol` trades onto `crypto` spot prices
    pub fn new(crypto: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            crypto: crypto.into(),
            symbol: symbol.into().to_lowercase(),
            reconnect: FeedReconnect::default(),
        }
    }

    /// Override reconnection behavior
    pub fn with_reconnect(mut self, reconnect: FeedReconnect) -> Self {
        self.reconnect = reconnect;
        self
    }

    fn build_ws_url(&self) -> String {
        format!("{}/{}@trade", BINANCE_WS_URL, self.symbol)
    }

    fn parse_message(crypto: &str, msg: &str) -> Option<PriceTick> {
        let trade: BinanceTradeMessage = serde_json::from_str(msg).ok()?;
        if trade.event_type != "trade" {
            return None;
        }

        let price = Decimal::from_str(&trade.price).ok()?;
        let exchange_ts = Utc.timestamp_millis_opt(trade.trade_time).single()?;

        Some(PriceTick {
            crypto: crypto.to_string(),
            symbol: trade.symbol,
            price,
            timestamp: Utc::now(),
            exchange_ts,
        })
    }

    async fn run_message_loop(
        crypto: String,
        mut ws_rx: mpsc::Receiver<WsEvent>,
        tick_tx: mpsc::Sender<PriceTick>,
        status_tx: mpsc::Sender<FeedStatus>,
    ) {
        while let Some(event) = ws_rx.recv().await {
            match event {
                WsEvent::Text(text) => {
                    if let Some(tick) = Self::parse_message(&crypto, &text) {
                        if tick_tx.send(tick).await.is_err() {
                            tracing::debug!("Tick receiver dropped, stopping feed");
                            break;
                        }
                    }
                }
                WsEvent::Connected => {
                    tracing::info!(crypto = %crypto, "Spot feed connected");
                    let _ = status_tx.send(FeedStatus::Connected).await;
                }
                WsEvent::Reconnecting { attempt } => {
                    tracing::warn!(crypto = %crypto, attempt, "Spot feed reconnecting");
                    let _ = status_tx.send(FeedStatus::Reconnecting { attempt }).await;
                }
                WsEvent::Exhausted => {
                    tracing::error!(crypto = %crypto, "Spot feed exhausted reconnect budget");
                    let _ = status_tx.send(FeedStatus::Exhausted).await;
                    break;
                }
                WsEvent::Binary(_) => {
                    // Binance trade streams are text only
                }
            }
        }
    }
}

#[async_trait]
impl PriceFeed for BinanceFeed {
    async fn subscribe(&self) -> anyhow::Result<FeedSubscription> {
        let (tick_tx, tick_rx) = mpsc::channel(1024);
        let (status_tx, status_rx) = mpsc::channel(64);
        let url = self.build_ws_url();

        tracing::info!(crypto = %self.crypto, symbol = %self.symbol, "Subscribing to spot feed");

        let config = WsConfig::new(url)
            .max_failures(self.reconnect.max_failures)
            .reconnect_delay(self.reconnect.delay)
            .connect_timeout(self.reconnect.connect_timeout)
            .ping_interval(Duration::from_secs(30));

        let client = WsClient::new(config);
        let (ws_rx, send_tx) = client.connect();

        let crypto = self.crypto.clone();
        tokio::spawn(async move {
            // Hold the sender: dropping it would close the connection
            let _outbound = send_tx;
            Self::run_message_loop(crypto, ws_rx, tick_tx, status_tx).await;
        });

        Ok(FeedSubscription {
            ticks: tick_rx,
            status: status_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_lowercases_symbol() {
        let feed = BinanceFeed::new("BTC", "BTCUSDT");
        assert_eq!(feed.symbol, "btcusdt");
        assert_eq!(feed.crypto, "BTC");
    }

    #[test]
    fn test_build_ws_url() {
        let feed = BinanceFeed::new("BTC", "btcusdt");
        assert_eq!(
            feed.build_ws_url(),
            "wss://stream.binance.com:9443/ws/btcusdt@trade"
        );
    }

    #[test]
    fn test_parse_valid_trade_message() {
        let msg = r#"{
            "e": "trade",
            "E": 1704067200000,
            "s": "BTCUSDT",
            "t": 123456789,
            "p": "42500.50",
            "q": "0.001",
            "T": 1704067200123
        }"#;

        let tick = BinanceFeed::parse_message("BTC", msg).unwrap();
        assert_eq!(tick.crypto, "BTC");
        assert_eq!(tick.symbol, "BTCUSDT");
        assert_eq!(tick.price, Decimal::from_str("42500.50").unwrap());
    }

    #[test]
    fn test_parse_ignores_other_event_types() {
        let msg = r#"{"e":"aggTrade","s":"BTCUSDT","p":"42500.50","T":1704067200123}"#;
        assert!(BinanceFeed::parse_message("BTC", msg).is_none());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(BinanceFeed::parse_message("BTC", "not valid json").is_none());
    }

    #[test]
    fn test_parse_invalid_price() {
        let msg = r#"{"e":"trade","s":"BTCUSDT","p":"not_a_number","T":1704067200123}"#;
        assert!(BinanceFeed::parse_message("BTC", msg).is_none());
    }

    #[tokio::test]
    async fn test_message_loop_forwards_ticks_and_status() {
        let (ws_tx, ws_rx) = mpsc::channel(10);
        let (tick_tx, mut tick_rx) = mpsc::channel(10);
        let (status_tx, mut status_rx) = mpsc::channel(10);

        let handle = tokio::spawn(async move {
            BinanceFeed::run_message_loop("BTC".to_string(), ws_rx, tick_tx, status_tx).await;
        });

        ws_tx.send(WsEvent::Connected).await.unwrap();
        assert_eq!(status_rx.recv().await.unwrap(), FeedStatus::Connected);

        let msg = r#"{"e":"trade","s":"BTCUSDT","p":"100.00","T":1704067200123}"#;
        ws_tx.send(WsEvent::Text(msg.to_string())).await.unwrap();
        let tick = tick_rx.recv().await.unwrap();
        assert_eq!(tick.price, Decimal::from_str("100.00").unwrap());

        ws_tx.send(WsEvent::Exhausted).await.unwrap();
        assert_eq!(status_rx.recv().await.unwrap(), FeedStatus::Exhausted);
        handle.await.unwrap();
    }
}
