//! poly-updown: autonomous execution engine for 15-minute crypto up/down markets
//!
//! This library provides the core components for:
//! - Real-time spot prices from Binance
//! - Order book streaming from the Polymarket CLOB WebSocket
//! - Market discovery via the Gamma API
//! - Tick synthesis combining book and spot state
//! - Order lifecycle tracking with exactly-once terminal semantics
//! - Risk gating with kill switch and circuit breaker
//! - Crash-recoverable engine orchestration
//! - Full observability stack

pub mod cli;
pub mod config;
pub mod engine;
pub mod events;
pub mod exchange;
pub mod feed;
pub mod market;
pub mod order;
pub mod orderbook;
pub mod persist;
pub mod risk;
pub mod strategy;
pub mod telemetry;
pub mod tick;
pub mod ws;
