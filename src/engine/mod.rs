//! Execution engine (orchestrator)
//!
//! Owns all core state and drives the per-tick decision pipeline from a
//! single cooperative loop: feed messages, control commands and periodic
//! tasks are multiplexed through one `select!`, so the order map, position
//! map, risk counters and engine state are only ever mutated between arms.
//! The only suspension points are network operations; every continuation
//! re-checks engine state before triggering new work.

mod position;
mod stats;

pub use position::Position;
pub use stats::SessionStats;

use crate::config::Config;
use crate::events::{EngineEvent, EventBus, HealthDimension};
use crate::exchange::{AckStatus, ExchangeClient, ExchangeError, PlaceOrderRequest};
use crate::feed::{FeedStatus, PriceTick};
use crate::market::window_epoch;
use crate::order::{Order, OrderId, OrderLedger, OrderParams, OrderState, OrderType, Side};
use crate::orderbook::BookUpdate;
use crate::persist::{Snapshot, SnapshotStore};
use crate::risk::{MarketView, OpenTrade, RiskGate, TradeRequest};
use crate::strategy::{Action, Strategy};
use crate::telemetry::metrics;
use crate::tick::{Tick, TickSynth};
use anyhow::Context;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Engine lifecycle state
///
/// `Stopped → Starting → Running`, `Running ⇄ Paused`, any → `Error`,
/// `Running/Paused → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Paused,
    Error,
    Stopping,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EngineState::Stopped => "stopped",
            EngineState::Starting => "starting",
            EngineState::Running => "running",
            EngineState::Paused => "paused",
            EngineState::Error => "error",
            EngineState::Stopping => "stopping",
        };
        write!(f, "{}", s)
    }
}

/// Control commands delivered to the engine loop
#[derive(Debug, Clone, Copy)]
pub enum EngineCommand {
    Pause,
    Resume,
    Stop,
}

/// Clonable handle for controlling a running engine
///
/// Commands take effect at the engine's next loop iteration, never
/// pre-emptively; in-flight submissions are not aborted.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Request a pause; ticks are dropped until resumed
    pub async fn pause(&self) {
        let _ = self.tx.send(EngineCommand::Pause).await;
    }

    /// Request a resume; refused while the kill switch condition holds
    pub async fn resume(&self) {
        let _ = self.tx.send(EngineCommand::Resume).await;
    }

    /// Request a graceful shutdown; idempotent
    pub async fn stop(&self) {
        let _ = self.tx.send(EngineCommand::Stop).await;
    }
}

/// Channels connecting the engine to its two market data feeds
pub struct FeedChannels {
    /// Tagged order book snapshots and deltas
    pub books: mpsc::Receiver<BookUpdate>,
    /// Book feed connection status
    pub book_status: mpsc::Receiver<FeedStatus>,
    /// Spot price ticks
    pub spots: mpsc::Receiver<PriceTick>,
    /// Spot feed connection status
    pub spot_status: mpsc::Receiver<FeedStatus>,
    /// Replaces the book feed's token subscription on rollover, if supported
    pub resubscribe: Option<mpsc::Sender<Vec<String>>>,
}

/// Last known state of both feeds plus the tick heartbeat
struct FeedBoard {
    spot: FeedStatus,
    book: FeedStatus,
    last_tick_at: Option<DateTime<Utc>>,
}

impl FeedBoard {
    fn new() -> Self {
        Self {
            spot: FeedStatus::Reconnecting { attempt: 0 },
            book: FeedStatus::Reconnecting { attempt: 0 },
            last_tick_at: None,
        }
    }
}

/// The execution engine
pub struct Engine {
    config: Config,
    state: EngineState,
    exchange: Arc<dyn ExchangeClient>,
    strategy: Box<dyn Strategy>,
    store: Box<dyn SnapshotStore>,
    events: EventBus,
    ledger: OrderLedger,
    gate: RiskGate,
    synth: TickSynth,
    positions: HashMap<(String, i64), Position>,
    stats: SessionStats,
    board: FeedBoard,
    cmd_rx: Option<mpsc::Receiver<EngineCommand>>,
    resubscribe: Option<mpsc::Sender<Vec<String>>>,
    shutdown_done: bool,
}

impl Engine {
    /// Construct an engine and its control handle
    pub fn new(
        config: Config,
        exchange: Arc<dyn ExchangeClient>,
        strategy: Box<dyn Strategy>,
        store: Box<dyn SnapshotStore>,
        events: EventBus,
    ) -> (Self, EngineHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let gate = RiskGate::new(config.risk.clone(), events.clone());
        let ledger = OrderLedger::new(events.clone());

        let engine = Self {
            config,
            state: EngineState::Stopped,
            exchange,
            strategy,
            store,
            events,
            ledger,
            gate,
            synth: TickSynth::new(),
            positions: HashMap::new(),
            stats: SessionStats::new(Utc::now()),
            board: FeedBoard::new(),
            cmd_rx: Some(cmd_rx),
            resubscribe: None,
            shutdown_done: false,
        };

        (engine, EngineHandle { tx: cmd_tx })
    }

    /// Current engine state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run the engine to completion
    ///
    /// Starts up, processes feed data until stopped, then runs the graceful
    /// shutdown sequence. A startup failure still shuts down cleanly so no
    /// order is left unresolved.
    pub async fn run(mut self, feeds: FeedChannels) -> anyhow::Result<()> {
        let FeedChannels {
            mut books,
            mut book_status,
            mut spots,
            mut spot_status,
            resubscribe,
        } = feeds;
        self.resubscribe = resubscribe;
        let mut cmd_rx = self
            .cmd_rx
            .take()
            .context("engine control channel already taken")?;

        if let Err(e) = self.start().await {
            tracing::error!(error = %e, "Engine startup failed");
            self.set_state(EngineState::Error);
            self.events.emit(EngineEvent::Error {
                context: format!("startup failed: {}", e),
            });
            self.shutdown().await;
            return Err(e);
        }

        let cfg = &self.config.engine;
        let mut snapshot_interval = make_interval(cfg.snapshot_interval_secs);
        let mut health_interval = make_interval(cfg.health_interval_secs);
        let mut rollover_interval = make_interval(cfg.rollover_check_interval_secs);
        let mut status_interval = make_interval(cfg.status_interval_secs);

        loop {
            if self.state == EngineState::Stopping {
                break;
            }

            tokio::select! {
                Some(cmd) = cmd_rx.recv() => self.handle_command(cmd),
                Some(update) = books.recv() => self.on_book(update).await,
                Some(spot) = spots.recv() => self.on_spot(spot),
                Some(status) = book_status.recv() => {
                    self.on_feed_status(HealthDimension::BookFeed, status);
                }
                Some(status) = spot_status.recv() => {
                    self.on_feed_status(HealthDimension::SpotFeed, status);
                }
                _ = snapshot_interval.tick() => self.persist_snapshot().await,
                _ = health_interval.tick() => self.health_check(),
                _ = rollover_interval.tick() => self.check_rollovers().await,
                _ = status_interval.tick() => self.log_status(),
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn start(&mut self) -> anyhow::Result<()> {
        self.set_state(EngineState::Starting);

        let server_time = self
            .exchange
            .get_time()
            .await
            .context("exchange connectivity check failed")?;
        let key_info = self
            .exchange
            .get_api_key_info()
            .await
            .context("api key check failed")?;
        if !key_info.can_trade {
            anyhow::bail!("api key {} is not enabled for trading", key_info.key_id);
        }
        tracing::info!(server_time = %server_time, key_id = %key_info.key_id, "Exchange reachable");

        match self.exchange.get_balances().await {
            Ok(balances) => {
                for balance in balances {
                    tracing::info!(asset = %balance.asset, available = %balance.available, "Balance");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Could not fetch balances"),
        }

        self.restore_state().await?;
        self.refresh_markets().await;

        let now = Utc::now();
        self.board.last_tick_at = Some(now);
        self.set_state(EngineState::Running);
        self.events.emit(EngineEvent::Started);
        tracing::info!("Engine running");
        Ok(())
    }

    /// Restore a persisted snapshot if it is fresh enough, then reconcile
    ///
    /// A stale snapshot is discarded entirely: acting on stale order and
    /// position assumptions is worse than acting with none. Recovered
    /// non-terminal orders are unknown until reconciled; the exchange is
    /// authoritative, so resting orders are cancelled there and closed out
    /// locally.
    async fn restore_state(&mut self) -> anyhow::Result<()> {
        let snapshot = match self.store.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::info!("No snapshot found, starting cold");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Snapshot unreadable, starting cold");
                return Ok(());
            }
        };

        let now = Utc::now();
        let age = snapshot.age_secs(now);
        if age > self.config.engine.snapshot_max_age_secs {
            tracing::warn!(
                age_secs = age,
                max_age_secs = self.config.engine.snapshot_max_age_secs,
                "Snapshot too stale, starting cold"
            );
            return Ok(());
        }

        tracing::info!(
            age_secs = age,
            orders = snapshot.orders.len(),
            positions = snapshot.positions.len(),
            prior_net_pnl = %snapshot.session_stats.net_pnl,
            "Restoring snapshot"
        );

        // Orders, positions and risk state restore; session counters always
        // start fresh on a process restart
        self.ledger.import(snapshot.orders);
        let mut trades = vec![];
        for position in snapshot.positions {
            trades.push(OpenTrade {
                order_id: position.entry_order_id,
                crypto: position.crypto.clone(),
                window_epoch: position.window_epoch,
                size: position.size,
            });
            self.positions.insert(position.key(), position);
        }
        self.gate.restore(&snapshot.risk_status, trades, now);

        let unresolved: Vec<(OrderId, OrderState)> = self
            .ledger
            .open_orders()
            .iter()
            .map(|o| (o.id, o.state))
            .collect();
        if !unresolved.is_empty() {
            tracing::warn!(
                count = unresolved.len(),
                "Recovered unresolved orders, reconciling against exchange"
            );
            if let Err(e) = self.exchange.cancel_all_orders().await {
                tracing::warn!(error = %e, "cancel_all_orders failed during reconciliation");
            }
            for (id, state) in unresolved {
                let result = match state {
                    OrderState::Open => self.ledger.mark_cancelled(id, "restart reconciliation"),
                    _ => self.ledger.mark_failed(id, "unresolved across restart"),
                };
                if let Err(e) = result {
                    tracing::warn!(order_id = %id, error = %e, "Reconciliation transition failed");
                }
            }
        }

        Ok(())
    }

    /// Fetch the active market definition for every configured crypto
    async fn refresh_markets(&mut self) {
        for crypto in self.config.engine.assets.clone() {
            match self.exchange.get_current_market(&crypto).await {
                Ok(Some(market)) => {
                    tracing::info!(
                        crypto = %crypto,
                        slug = %market.slug,
                        window_epoch = market.window_epoch,
                        "Active market"
                    );
                    self.synth.set_market(market);
                }
                Ok(None) => {
                    tracing::warn!(crypto = %crypto, "No active market listed");
                }
                Err(e) => {
                    tracing::warn!(crypto = %crypto, error = %e, "Market refresh failed");
                }
            }
        }
        self.resubscribe_books().await;
    }

    async fn resubscribe_books(&mut self) {
        if let Some(tx) = &self.resubscribe {
            let tokens: Vec<String> = self
                .synth
                .markets()
                .map(|m| m.up_token_id.clone())
                .collect();
            if !tokens.is_empty() && tx.send(tokens).await.is_err() {
                tracing::warn!("Book feed subscription channel closed");
            }
        }
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Pause => {
                if self.state == EngineState::Running {
                    tracing::info!("Engine paused");
                    self.set_state(EngineState::Paused);
                    self.events.emit(EngineEvent::Paused);
                }
            }
            EngineCommand::Resume => {
                if self.state == EngineState::Paused {
                    if self.gate.resume(Utc::now()) {
                        tracing::info!("Engine resumed");
                        self.set_state(EngineState::Running);
                        self.events.emit(EngineEvent::Resumed);
                    } else {
                        tracing::warn!("Resume refused, loss limit still exceeded");
                    }
                }
            }
            EngineCommand::Stop => {
                if self.state != EngineState::Stopping && self.state != EngineState::Stopped {
                    tracing::info!("Stop requested");
                    self.set_state(EngineState::Stopping);
                }
            }
        }
    }

    fn on_spot(&mut self, tick: PriceTick) {
        self.synth.on_spot(tick);
    }

    async fn on_book(&mut self, update: BookUpdate) {
        let now = Utc::now();
        let tick = match self.synth.on_book(update, now) {
            Some(tick) => tick,
            None => return,
        };

        self.board.last_tick_at = Some(now);
        self.stats.ticks_processed += 1;
        metrics::record_tick(&tick.crypto);

        // Rollover is evaluated on every tick; a tick for an expired window
        // must not reach the strategy.
        if self.maybe_rollover(&tick.crypto, now).await {
            return;
        }

        if self.state != EngineState::Running {
            tracing::trace!(state = %self.state, "Dropping tick, engine not running");
            return;
        }

        if let Err(e) = self.process_tick(&tick).await {
            tracing::error!(error = %e, crypto = %tick.crypto, "Tick pipeline error");
            self.events.emit(EngineEvent::Error {
                context: format!("tick pipeline: {}", e),
            });
        }
    }

    async fn process_tick(&mut self, tick: &Tick) -> anyhow::Result<()> {
        let key = (tick.crypto.clone(), tick.window_epoch);
        let position = self.positions.get(&key).cloned();
        let action = self.strategy.on_tick(tick, position.as_ref());

        match action {
            Action::Hold => Ok(()),
            Action::Buy {
                token_side,
                size,
                reason,
            } => self.submit_entry(tick, token_side, size, reason).await,
            Action::Sell { reason } => self.submit_exit(tick, reason).await,
        }
    }

    async fn submit_entry(
        &mut self,
        tick: &Tick,
        token_side: crate::order::TokenSide,
        size: rust_decimal::Decimal,
        reason: String,
    ) -> anyhow::Result<()> {
        let key = (tick.crypto.clone(), tick.window_epoch);
        if self.positions.contains_key(&key) {
            tracing::debug!(crypto = %tick.crypto, "Buy dropped, position already open");
            return Ok(());
        }

        let now = Utc::now();
        let request = TradeRequest {
            crypto: tick.crypto.clone(),
            window_epoch: tick.window_epoch,
            size,
        };
        let view = MarketView {
            time_remaining_secs: tick.time_remaining_secs,
            spread_pct: tick.spread_pct,
        };
        let decision = self.gate.validate_trade(&request, &view, now);
        if !decision.allowed {
            // Blocked signals are dropped, never queued or retried
            self.stats.risk_blocks += 1;
            metrics::record_risk_block();
            for violation in &decision.violations {
                tracing::warn!(
                    crypto = %tick.crypto,
                    size = %size,
                    violation = %violation,
                    "Entry blocked by risk gate"
                );
            }
            return Ok(());
        }

        let order_type = self.config.execution.entry_order_type;
        let price = match order_type {
            OrderType::Fok => tick.ask(token_side),
            OrderType::Gtc => tick.bid(token_side),
        };
        let params = OrderParams {
            token_id: tick.token_id(token_side).to_string(),
            market_slug: tick.market.slug.clone(),
            crypto: tick.crypto.clone(),
            window_epoch: tick.window_epoch,
            side: Side::Buy,
            token_side,
            price,
            size,
            order_type,
            parent_order_id: None,
            strategy: self.strategy.name().to_string(),
            signal: reason,
        };
        let order = self.ledger.create(params);
        self.stats.orders_placed += 1;
        metrics::record_order_placed();
        self.submit_order(order.id).await;
        Ok(())
    }

    async fn submit_exit(&mut self, tick: &Tick, reason: String) -> anyhow::Result<()> {
        let key = (tick.crypto.clone(), tick.window_epoch);
        let position = match self.positions.get(&key).cloned() {
            Some(position) => position,
            None => {
                tracing::debug!(crypto = %tick.crypto, "Sell dropped, no open position");
                return Ok(());
            }
        };

        // Exits reduce exposure and therefore bypass admission control;
        // they are always fill-or-kill at the current bid.
        let params = OrderParams {
            token_id: tick.token_id(position.token_side).to_string(),
            market_slug: tick.market.slug.clone(),
            crypto: tick.crypto.clone(),
            window_epoch: tick.window_epoch,
            side: Side::Sell,
            token_side: position.token_side,
            price: tick.bid(position.token_side),
            size: position.size,
            order_type: OrderType::Fok,
            parent_order_id: Some(position.entry_order_id),
            strategy: self.strategy.name().to_string(),
            signal: reason,
        };
        let order = self.ledger.create(params);
        self.stats.orders_placed += 1;
        metrics::record_order_placed();
        self.submit_order(order.id).await;
        Ok(())
    }

    /// Submit a created order and apply the outcome
    ///
    /// The await is a yield point: a pause or stop may land while the
    /// submission is in flight. The result is still applied so the order is
    /// never left unresolved, but nothing here creates further orders.
    async fn submit_order(&mut self, id: OrderId) {
        let order = match self.ledger.get(id).cloned() {
            Some(order) => order,
            None => return,
        };

        let request = PlaceOrderRequest {
            token_id: order.token_id.clone(),
            price: order.requested_price,
            size: order.requested_size,
            side: order.side,
            order_type: order.order_type,
        };

        tracing::info!(
            order_id = %id,
            token_id = %order.token_id,
            side = ?order.side,
            price = %order.requested_price,
            size = %order.requested_size,
            "Submitting order"
        );

        let result = self.exchange.place_order(request).await;

        match result {
            Ok(response) => {
                if let Err(e) = self.ledger.mark_submitted(id, &response.order_id) {
                    tracing::error!(order_id = %id, error = %e, "Submission bookkeeping failed");
                    return;
                }
                match response.status {
                    AckStatus::Filled => {
                        for fill in response.fills {
                            if let Err(e) = self.ledger.add_fill(id, fill) {
                                tracing::error!(order_id = %id, error = %e, "Fill apply failed");
                            }
                        }
                        self.settle_filled_order(id);
                        metrics::record_order_outcome("filled");
                    }
                    AckStatus::Open => {
                        if let Err(e) = self.ledger.mark_open(id) {
                            tracing::error!(order_id = %id, error = %e, "Open transition failed");
                        }
                        metrics::record_order_outcome("open");
                    }
                }
            }
            Err(ExchangeError::Rejected(reason)) => {
                // Exchange-level rejection is permanent for this order id
                tracing::warn!(order_id = %id, reason = %reason, "Order rejected");
                if let Err(e) = self.ledger.mark_rejected(id, &reason) {
                    tracing::error!(order_id = %id, error = %e, "Reject transition failed");
                }
                self.stats.orders_rejected += 1;
                metrics::record_order_outcome("rejected");
            }
            Err(e) => {
                // System error: terminal for this id, flagged for the
                // operator; a retry needs a fresh order id
                tracing::error!(
                    order_id = %id,
                    error = %e,
                    "Order submission failed, operator attention required"
                );
                if let Err(e) = self.ledger.mark_failed(id, e.to_string()) {
                    tracing::error!(order_id = %id, error = %e, "Fail transition failed");
                }
                self.stats.orders_failed += 1;
                metrics::record_order_outcome("failed");
            }
        }

        // Persist immediately after every order completion
        self.persist_snapshot().await;
    }

    /// Position and risk bookkeeping once an order reaches FILLED
    fn settle_filled_order(&mut self, id: OrderId) {
        let order = match self.ledger.get(id) {
            Some(order) if order.state == OrderState::Filled => order.clone(),
            _ => return,
        };
        self.stats.orders_filled += 1;
        let now = Utc::now();
        let key = (order.crypto.clone(), order.window_epoch);
        let fill_price = order.filled_price.unwrap_or(order.requested_price);

        match order.parent_order_id {
            None => {
                // Entry: open a position at the actual filled size
                let position = Position {
                    crypto: order.crypto.clone(),
                    window_epoch: order.window_epoch,
                    token_side: order.token_side,
                    size: order.filled_size,
                    entry_price: fill_price,
                    entry_time: now,
                    entry_order_id: order.id,
                };
                self.gate.record_trade_open(OpenTrade {
                    order_id: order.id,
                    crypto: order.crypto.clone(),
                    window_epoch: order.window_epoch,
                    size: order.filled_size,
                });
                tracing::info!(
                    crypto = %order.crypto,
                    window_epoch = order.window_epoch,
                    token_side = ?order.token_side,
                    size = %position.size,
                    entry_price = %position.entry_price,
                    "Position opened"
                );
                self.positions.insert(key, position);
            }
            Some(entry_order_id) => {
                // Exit: realize P&L and destroy the position
                let position = match self.positions.remove(&key) {
                    Some(position) => position,
                    None => {
                        tracing::warn!(order_id = %id, "Exit filled with no tracked position");
                        return;
                    }
                };
                let gross = (fill_price - position.entry_price) * position.size;
                let entry_fees = self
                    .ledger
                    .get(entry_order_id)
                    .map(|o| o.fees)
                    .unwrap_or_default();
                let fees = entry_fees + order.fees;
                let net = gross - fees;
                self.gate.record_trade_close(entry_order_id, net, now);
                self.stats.record_trade(gross, fees);
                metrics::set_net_pnl(self.stats.net_pnl.to_f64().unwrap_or(0.0));
                tracing::info!(
                    crypto = %order.crypto,
                    window_epoch = order.window_epoch,
                    entry_price = %position.entry_price,
                    exit_price = %fill_price,
                    gross_pnl = %gross,
                    net_pnl = %net,
                    "Position closed"
                );
            }
        }
        metrics::set_exposure(self.gate.exposure().to_f64().unwrap_or(0.0));
    }

    /// Periodic rollover sweep for quiet markets with no book deltas
    async fn check_rollovers(&mut self) {
        let now = Utc::now();
        for crypto in self.config.engine.assets.clone() {
            self.maybe_rollover(&crypto, now).await;
        }
    }

    /// Roll the market definition forward when the window boundary passes
    ///
    /// A position still open for the expired window is logged as an
    /// unresolved expiry and left in place; settlement is an external
    /// collaborator's job.
    async fn maybe_rollover(&mut self, crypto: &str, now: DateTime<Utc>) -> bool {
        let market_epoch = match self.synth.market(crypto) {
            Some(market) => market.window_epoch,
            None => return false,
        };
        let current_epoch = window_epoch(now);
        if current_epoch == market_epoch {
            return false;
        }

        tracing::info!(
            crypto = %crypto,
            old_epoch = market_epoch,
            new_epoch = current_epoch,
            "Window rolled over"
        );

        if let Some(position) = self.positions.get(&(crypto.to_string(), market_epoch)) {
            tracing::warn!(
                crypto = %crypto,
                window_epoch = market_epoch,
                size = %position.size,
                token_side = ?position.token_side,
                "Unresolved expiry: position open past window end, awaiting settlement"
            );
        }

        match self.exchange.get_current_market(crypto).await {
            Ok(Some(market)) => {
                self.synth.set_market(market);
                self.resubscribe_books().await;
            }
            Ok(None) => {
                tracing::warn!(crypto = %crypto, "No market listed for new window");
            }
            Err(e) => {
                tracing::warn!(crypto = %crypto, error = %e, "Market refresh failed on rollover");
            }
        }
        true
    }

    fn on_feed_status(&mut self, dimension: HealthDimension, status: FeedStatus) {
        match dimension {
            HealthDimension::SpotFeed => self.board.spot = status,
            HealthDimension::BookFeed => self.board.book = status,
            _ => {}
        }

        if status == FeedStatus::Exhausted {
            tracing::error!(dimension = %dimension, "Feed gave up reconnecting");
            self.events.emit(EngineEvent::HealthWarning {
                dimension,
                detail: "feed exhausted its reconnect budget".to_string(),
            });
            // Degrade rather than trade against stale or absent data
            if self.state == EngineState::Running {
                self.set_state(EngineState::Paused);
                self.events.emit(EngineEvent::Paused);
            }
        }
    }

    /// Evaluate each health dimension independently
    fn health_check(&mut self) {
        let now = Utc::now();
        let mut failing: Vec<(HealthDimension, String)> = vec![];

        let heartbeat_ok = self
            .board
            .last_tick_at
            .map(|t| (now - t).num_seconds() <= self.config.engine.heartbeat_timeout_secs)
            .unwrap_or(false);
        if !heartbeat_ok {
            failing.push((
                HealthDimension::Heartbeat,
                "no tick data within the heartbeat window".to_string(),
            ));
        }
        if !self.board.spot.is_connected() {
            failing.push((
                HealthDimension::SpotFeed,
                format!("spot feed {:?}", self.board.spot),
            ));
        }
        if !self.board.book.is_connected() {
            failing.push((
                HealthDimension::BookFeed,
                format!("book feed {:?}", self.board.book),
            ));
        }
        if !self.gate.is_trading_allowed(now) {
            failing.push((
                HealthDimension::Risk,
                "trading halted by kill switch or circuit breaker".to_string(),
            ));
        }

        for (dimension, detail) in &failing {
            tracing::warn!(dimension = %dimension, detail = %detail, "Health warning");
            self.events.emit(EngineEvent::HealthWarning {
                dimension: *dimension,
                detail: detail.clone(),
            });
        }

        let healthy = failing.is_empty();
        self.events.emit(EngineEvent::HealthCheck { healthy });
        metrics::set_healthy(healthy);
    }

    async fn persist_snapshot(&mut self) {
        let now = Utc::now();
        let snapshot = Snapshot {
            timestamp: now,
            engine_state: self.state,
            session_stats: self.stats.clone(),
            orders: self.ledger.export(),
            positions: self.positions.values().cloned().collect(),
            risk_status: self.gate.status(now),
        };
        if let Err(e) = self.store.save(&snapshot).await {
            tracing::error!(error = %e, "Snapshot write failed");
        }
    }

    fn log_status(&mut self) {
        let now = Utc::now();
        let uptime = (now - self.stats.started_at).num_seconds();
        tracing::info!(
            state = %self.state,
            uptime_secs = uptime,
            ticks = self.stats.ticks_processed,
            open_orders = self.ledger.open_orders().len(),
            positions = self.positions.len(),
            exposure = %self.gate.exposure(),
            net_pnl = %self.stats.net_pnl,
            "Status"
        );
    }

    /// Graceful shutdown: cancel, persist, summarize; idempotent
    async fn shutdown(&mut self) {
        if self.shutdown_done {
            return;
        }
        self.shutdown_done = true;
        self.set_state(EngineState::Stopping);
        tracing::info!("Shutting down");

        let open: Vec<Order> = self
            .ledger
            .open_orders()
            .into_iter()
            .cloned()
            .collect();
        for order in open {
            if order.state == OrderState::Open {
                if let Some(exchange_id) = &order.exchange_order_id {
                    // Best-effort: one failed cancel must not abort the sweep
                    if let Err(e) = self.exchange.cancel_order(exchange_id).await {
                        tracing::warn!(
                            order_id = %order.id,
                            error = %e,
                            "Cancel failed during shutdown, continuing"
                        );
                    }
                }
                if self.ledger.mark_cancelled(order.id, "engine shutdown").is_ok() {
                    self.stats.orders_cancelled += 1;
                }
            } else if self
                .ledger
                .mark_failed(order.id, "unresolved at shutdown")
                .is_ok()
            {
                self.stats.orders_failed += 1;
            }
        }

        self.persist_snapshot().await;
        self.log_session_summary();
        self.set_state(EngineState::Stopped);
        self.events.emit(EngineEvent::Stopped);
    }

    fn log_session_summary(&self) {
        tracing::info!(
            orders_placed = self.stats.orders_placed,
            orders_filled = self.stats.orders_filled,
            orders_rejected = self.stats.orders_rejected,
            orders_failed = self.stats.orders_failed,
            orders_cancelled = self.stats.orders_cancelled,
            trades_executed = self.stats.trades_executed,
            risk_blocks = self.stats.risk_blocks,
            gross_pnl = %self.stats.gross_pnl,
            fees_paid = %self.stats.fees_paid,
            net_pnl = %self.stats.net_pnl,
            "Session summary"
        );
    }

    fn set_state(&mut self, state: EngineState) {
        if self.state != state {
            tracing::info!(from = %self.state, to = %state, "Engine state");
            self.state = state;
            metrics::set_engine_state(state as u8 as f64);
        }
    }
}

fn make_interval(secs: u64) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately; consume it so periodic work starts
    // one full period after startup
    interval.reset();
    interval
}
