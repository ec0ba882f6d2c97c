//! WebSocket client with automatic reconnection
//!
//! Reconnects after a fixed delay, bounds every connection attempt with a
//! timeout, and gives up after a configured number of consecutive failures.
//! Exhaustion is reported to the consumer as an event rather than silently
//! ending the stream, so the engine can degrade instead of trading on stale
//! data.

use super::types::{WsConfig, WsError, WsEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Reusable WebSocket client with reconnection and ping/pong keepalive
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    /// Create a new client with the given configuration
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Get the configured URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Connect and return a receiver for events and a sender for outbound text
    ///
    /// Spawns a background task that owns the connection. The sender can be
    /// used for subscription messages; pending outbound messages are dropped
    /// across reconnects, so the consumer resubscribes on `Connected`.
    pub fn connect(&self) -> (mpsc::Receiver<WsEvent>, mpsc::Sender<String>) {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (send_tx, send_rx) = mpsc::channel(64);
        let config = self.config.clone();

        tokio::spawn(async move {
            Self::run_connection_loop(config, event_tx, send_rx).await;
        });

        (event_rx, send_tx)
    }

    async fn run_connection_loop(
        config: WsConfig,
        tx: mpsc::Sender<WsEvent>,
        mut send_rx: mpsc::Receiver<String>,
    ) {
        let mut failures = 0u32;

        loop {
            match Self::connect_and_stream(&config, &tx, &mut send_rx, &mut failures).await {
                Ok(()) => {
                    // Clean close or receiver dropped; stop without reconnecting
                    tracing::info!(url = %config.url, "WebSocket closed");
                    return;
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        url = %config.url,
                        error = %e,
                        attempt = failures,
                        "WebSocket connection error"
                    );

                    if config.max_failures > 0 && failures >= config.max_failures {
                        tracing::error!(
                            url = %config.url,
                            failures,
                            "Reconnect budget exhausted, giving up"
                        );
                        let _ = tx.send(WsEvent::Exhausted).await;
                        return;
                    }

                    if tx.is_closed() {
                        return;
                    }

                    let _ = tx.send(WsEvent::Reconnecting { attempt: failures }).await;
                    sleep(config.reconnect_delay).await;
                }
            }
        }
    }

    async fn connect_and_stream(
        config: &WsConfig,
        tx: &mpsc::Sender<WsEvent>,
        send_rx: &mut mpsc::Receiver<String>,
        failures: &mut u32,
    ) -> Result<(), WsError> {
        tracing::info!(url = %config.url, "Connecting to WebSocket");

        let connect = connect_async(&config.url);
        let (ws_stream, _response) = match timeout(config.connect_timeout, connect).await {
            Ok(Ok(ok)) => ok,
            Ok(Err(e)) => return Err(WsError::ConnectionFailed(e.to_string())),
            Err(_) => return Err(WsError::ConnectTimeout),
        };

        let (mut write, mut read) = ws_stream.split();
        tracing::info!(url = %config.url, "WebSocket connected");

        if tx.send(WsEvent::Connected).await.is_err() {
            return Ok(());
        }
        // The budget counts consecutive failures; a live connection clears it
        *failures = 0;

        let mut ping_interval = tokio::time::interval(config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick fires immediately; consume it so the ping cadence is even
        ping_interval.tick().await;
        let mut awaiting_pong = false;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if tx.send(WsEvent::Text(text)).await.is_err() {
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if tx.send(WsEvent::Binary(data)).await.is_err() {
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            awaiting_pong = false;
                        }
                        Some(Ok(Message::Close(_))) => {
                            return Err(WsError::ConnectionFailed("server closed".into()));
                        }
                        Some(Err(e)) => {
                            return Err(WsError::ConnectionFailed(e.to_string()));
                        }
                        None => {
                            return Err(WsError::ConnectionFailed("stream ended".into()));
                        }
                        _ => {}
                    }
                }

                outbound = send_rx.recv() => {
                    match outbound {
                        Some(text) => {
                            write.send(Message::Text(text)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        None => {
                            // Sender dropped, close cleanly
                            return Ok(());
                        }
                    }
                }

                _ = ping_interval.tick() => {
                    if awaiting_pong {
                        return Err(WsError::ConnectionFailed("pong timeout".into()));
                    }
                    write.send(Message::Ping(vec![])).await
                        .map_err(|e| WsError::SendFailed(e.to_string()))?;
                    awaiting_pong = true;
                }
            }
        }
    }
}
