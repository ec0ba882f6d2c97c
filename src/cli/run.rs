//! Run command: wire feeds, exchange, strategy and engine together

use crate::config::{Config, ExecutionMode};
use crate::engine::{Engine, FeedChannels};
use crate::events::EventBus;
use crate::exchange::{ExchangeClient, PaperExchange};
use crate::feed::{BinanceFeed, FeedReconnect, PriceFeed};
use crate::market::DiscoveryClient;
use crate::orderbook::{ClobConfig, ClobFeed};
use crate::persist::FileSnapshotStore;
use crate::strategy;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let events = EventBus::new();
        spawn_event_logger(&events);

        let exchange: Arc<dyn ExchangeClient> = match config.execution.mode {
            ExecutionMode::Paper => Arc::new(
                PaperExchange::new(config.execution.fee_rate)
                    .with_discovery(DiscoveryClient::new()),
            ),
            ExecutionMode::Live => {
                anyhow::bail!("live execution requires an exchange adapter; use paper mode")
            }
        };

        let strategy = strategy::build(&config.strategy)?;
        let store = Box::new(FileSnapshotStore::new(&config.persistence.snapshot_path));

        // One spot feed per asset, merged into a single channel pair
        let (spot_tx, spot_rx) = mpsc::channel(1024);
        let (spot_status_tx, spot_status_rx) = mpsc::channel(64);
        let reconnect = FeedReconnect {
            max_failures: config.feed.max_reconnect_attempts,
            delay: Duration::from_secs(config.feed.reconnect_delay_secs),
            connect_timeout: Duration::from_secs(config.feed.connect_timeout_secs),
        };
        for asset in &config.engine.assets {
            let symbol = config
                .feed
                .spot_symbols
                .get(asset)
                .cloned()
                .unwrap_or_else(|| format!("{}USDT", asset));
            let feed = BinanceFeed::new(asset, symbol).with_reconnect(reconnect.clone());
            let mut sub = feed.subscribe().await?;
            let tick_tx = spot_tx.clone();
            let status_tx = spot_status_tx.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        tick = sub.ticks.recv() => match tick {
                            Some(tick) => {
                                if tick_tx.send(tick).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        },
                        status = sub.status.recv() => match status {
                            Some(status) => {
                                if status_tx.send(status).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        },
                    }
                }
            });
        }
        drop(spot_tx);
        drop(spot_status_tx);

        // Book feed starts empty; the engine subscribes token ids once it has
        // refreshed market definitions
        let book_feed = ClobFeed::with_config(ClobConfig {
            max_failures: config.feed.max_reconnect_attempts,
            reconnect_delay: Duration::from_secs(config.feed.reconnect_delay_secs),
            connect_timeout: Duration::from_secs(config.feed.connect_timeout_secs),
            ..ClobConfig::default()
        });
        let book_handle = book_feed.start(vec![]);

        let (engine, handle) = Engine::new(config, exchange, strategy, store, events);

        // Ctrl-C triggers the graceful shutdown sequence
        let stop_handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, stopping engine");
                stop_handle.stop().await;
            }
        });

        engine
            .run(FeedChannels {
                books: book_handle.books,
                book_status: book_handle.status,
                spots: spot_rx,
                spot_status: spot_status_rx,
                resubscribe: Some(book_handle.subscribe),
            })
            .await
    }
}

fn spawn_event_logger(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => tracing::debug!(event = ?event, "Engine event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
