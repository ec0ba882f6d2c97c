//! Reusable WebSocket client with automatic reconnection

mod client;
mod types;

pub use client::WsClient;
pub use types::{WsConfig, WsError, WsEvent};
