//! Polymarket CLOB WebSocket feed for order book updates
//!
//! Streams book snapshots and deltas for subscribed outcome tokens. The
//! subscription set can be replaced at runtime (window rollover swaps token
//! ids); the active set is re-sent automatically after every reconnect.

use super::{BookUpdate, OrderBook, PriceLevel};
use crate::feed::FeedStatus;
use crate::ws::{WsClient, WsConfig, WsEvent};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;

/// Polymarket CLOB WebSocket URL for market data
pub const CLOB_WS_URL: &str = "wss://ws-subscriptions-clob.polymarket.com/ws/market";

/// Configuration for the book feed
#[derive(Debug, Clone)]
pub struct ClobConfig {
    /// WebSocket URL
    pub ws_url: String,
    /// Consecutive failed attempts before giving up (0 = retry forever)
    pub max_failures: u32,
    /// Fixed reconnection delay
    pub reconnect_delay: Duration,
    /// Bound on each connection attempt
    pub connect_timeout: Duration,
    /// Channel buffer for book updates
    pub buffer_size: usize,
}

impl Default for ClobConfig {
    fn default() -> Self {
        Self {
            ws_url: CLOB_WS_URL.to_string(),
            max_failures: 10,
            reconnect_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            buffer_size: 256,
        }
    }
}

/// Channels handed to the engine by a running book feed
pub struct BookFeedHandle {
    /// Tagged book snapshots and deltas in arrival order
    pub books: mpsc::Receiver<BookUpdate>,
    /// Connection status changes
    pub status: mpsc::Receiver<FeedStatus>,
    /// Replace the subscribed token set (used on window rollover)
    pub subscribe: mpsc::Sender<Vec<String>>,
}

/// Order book feed over the CLOB market WebSocket
pub struct ClobFeed {
    config: ClobConfig,
}

impl ClobFeed {
    /// Create a feed with default configuration
    pub fn new() -> Self {
        Self {
            config: ClobConfig::default(),
        }
    }

    /// Create a feed with custom configuration
    pub fn with_config(config: ClobConfig) -> Self {
        Self { config }
    }

    /// Start the feed with an initial token subscription
    pub fn start(&self, token_ids: Vec<String>) -> BookFeedHandle {
        let (book_tx, book_rx) = mpsc::channel(self.config.buffer_size);
        let (status_tx, status_rx) = mpsc::channel(64);
        let (sub_tx, sub_rx) = mpsc::channel(16);
        let config = self.config.clone();

        tokio::spawn(async move {
            run_subscription_loop(config, token_ids, book_tx, status_tx, sub_rx).await;
        });

        BookFeedHandle {
            books: book_rx,
            status: status_rx,
            subscribe: sub_tx,
        }
    }
}

impl Default for ClobFeed {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_subscription_loop(
    config: ClobConfig,
    mut token_ids: Vec<String>,
    book_tx: mpsc::Sender<BookUpdate>,
    status_tx: mpsc::Sender<FeedStatus>,
    mut sub_rx: mpsc::Receiver<Vec<String>>,
) {
    let ws_config = WsConfig::new(&config.ws_url)
        .max_failures(config.max_failures)
        .reconnect_delay(config.reconnect_delay)
        .connect_timeout(config.connect_timeout);

    let client = WsClient::new(ws_config);
    let (mut ws_rx, ws_tx) = client.connect();
    let mut connected = false;

    loop {
        tokio::select! {
            event = ws_rx.recv() => {
                match event {
                    Some(WsEvent::Connected) => {
                        tracing::info!(tokens = token_ids.len(), "Book feed connected");
                        connected = true;
                        let _ = status_tx.send(FeedStatus::Connected).await;
                        if !send_subscription(&ws_tx, &token_ids).await {
                            break;
                        }
                    }
                    Some(WsEvent::Text(text)) => {
                        if !connected {
                            continue;
                        }
                        for update in parse_market_message(&text) {
                            if book_tx.send(update).await.is_err() {
                                tracing::debug!("Book receiver dropped, stopping feed");
                                return;
                            }
                        }
                    }
                    Some(WsEvent::Reconnecting { attempt }) => {
                        tracing::warn!(attempt, "Book feed reconnecting");
                        connected = false;
                        let _ = status_tx.send(FeedStatus::Reconnecting { attempt }).await;
                    }
                    Some(WsEvent::Exhausted) => {
                        tracing::error!("Book feed exhausted reconnect budget");
                        let _ = status_tx.send(FeedStatus::Exhausted).await;
                        break;
                    }
                    Some(WsEvent::Binary(_)) => {}
                    None => {
                        tracing::info!("Book feed channel closed");
                        break;
                    }
                }
            }

            new_tokens = sub_rx.recv() => {
                match new_tokens {
                    Some(tokens) => {
                        tracing::info!(tokens = tokens.len(), "Replacing book subscription");
                        token_ids = tokens;
                        if connected && !send_subscription(&ws_tx, &token_ids).await {
                            break;
                        }
                    }
                    None => {
                        // Engine dropped the handle, shut down
                        break;
                    }
                }
            }
        }
    }
}

async fn send_subscription(ws_tx: &mpsc::Sender<String>, token_ids: &[String]) -> bool {
    if token_ids.is_empty() {
        return true;
    }
    let msg = SubscriptionMessage {
        assets_ids: token_ids.to_vec(),
        msg_type: "market".to_string(),
    };
    match serde_json::to_string(&msg) {
        Ok(json) => {
            if ws_tx.send(json).await.is_err() {
                tracing::error!("Failed to send subscription message");
                return false;
            }
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize subscription");
            true
        }
    }
}

/// Subscription message for the CLOB market channel
#[derive(Debug, Serialize)]
struct SubscriptionMessage {
    assets_ids: Vec<String>,
    #[serde(rename = "type")]
    msg_type: String,
}

/// Full book snapshot event
#[derive(Debug, Deserialize)]
struct BookEvent {
    asset_id: String,
    #[serde(default)]
    bids: Vec<WireLevel>,
    #[serde(default)]
    asks: Vec<WireLevel>,
    #[serde(default)]
    timestamp: String,
}

/// Price level as transmitted on the wire
#[derive(Debug, Deserialize)]
struct WireLevel {
    price: String,
    size: String,
}

/// Incremental price change event
#[derive(Debug, Deserialize)]
struct PriceChangesEvent {
    price_changes: Vec<PriceChange>,
}

#[derive(Debug, Deserialize)]
struct PriceChange {
    asset_id: String,
    price: String,
    /// New size at this price; zero removes the level
    size: String,
    /// "BUY" or "SELL"
    side: String,
}

/// Parse a market channel message into zero or more tagged book updates
fn parse_market_message(text: &str) -> Vec<BookUpdate> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return vec![],
    };

    match value {
        serde_json::Value::Array(events) => {
            events.iter().flat_map(parse_single_event).collect()
        }
        event => parse_single_event(&event),
    }
}

fn parse_single_event(event: &serde_json::Value) -> Vec<BookUpdate> {
    let event_type = event
        .get("event_type")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    match event_type {
        "book" => serde_json::from_value::<BookEvent>(event.clone())
            .ok()
            .map(|e| vec![BookUpdate::Snapshot(book_event_to_orderbook(e))])
            .unwrap_or_default(),
        "price_change" => serde_json::from_value::<PriceChangesEvent>(event.clone())
            .ok()
            .map(price_changes_to_deltas)
            .unwrap_or_default(),
        "last_trade_price" | "tick_size_change" => vec![],
        "" => {
            // Some messages omit event_type; infer from shape
            if event.get("asset_id").is_some()
                && (event.get("bids").is_some() || event.get("asks").is_some())
            {
                serde_json::from_value::<BookEvent>(event.clone())
                    .ok()
                    .map(|e| vec![BookUpdate::Snapshot(book_event_to_orderbook(e))])
                    .unwrap_or_default()
            } else if event.get("price_changes").is_some() {
                serde_json::from_value::<PriceChangesEvent>(event.clone())
                    .ok()
                    .map(price_changes_to_deltas)
                    .unwrap_or_default()
            } else {
                vec![]
            }
        }
        other => {
            tracing::trace!(event_type = other, "Ignoring unknown event type");
            vec![]
        }
    }
}

fn parse_levels(levels: Vec<WireLevel>) -> Vec<PriceLevel> {
    levels
        .into_iter()
        .filter_map(|l| {
            let price = Decimal::from_str(&l.price).ok()?;
            let size = Decimal::from_str(&l.size).ok()?;
            Some(PriceLevel { price, size })
        })
        .collect()
}

fn book_event_to_orderbook(event: BookEvent) -> OrderBook {
    let updated_at = event
        .timestamp
        .parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);

    OrderBook {
        token_id: event.asset_id,
        bids: parse_levels(event.bids),
        asks: parse_levels(event.asks),
        updated_at,
    }
}

/// Convert a batched price_changes event into one delta per asset
///
/// Changes are grouped by asset in first-seen order so no token's levels are
/// dropped. Zero sizes are kept: the cache interprets them as removals.
fn price_changes_to_deltas(event: PriceChangesEvent) -> Vec<BookUpdate> {
    let mut deltas: Vec<OrderBook> = vec![];

    for change in event.price_changes {
        let price = match Decimal::from_str(&change.price) {
            Ok(p) => p,
            Err(_) => continue,
        };
        let size = match Decimal::from_str(&change.size) {
            Ok(s) => s,
            Err(_) => continue,
        };
        let level = PriceLevel { price, size };

        let idx = match deltas.iter().position(|b| b.token_id == change.asset_id) {
            Some(idx) => idx,
            None => {
                deltas.push(OrderBook::new(change.asset_id.clone()));
                deltas.len() - 1
            }
        };
        match change.side.as_str() {
            "BUY" => deltas[idx].bids.push(level),
            "SELL" => deltas[idx].asks.push(level),
            _ => {}
        }
    }

    deltas.retain(|b| !b.bids.is_empty() || !b.asks.is_empty());
    deltas.into_iter().map(BookUpdate::Delta).collect()
}
