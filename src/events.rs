//! Engine event bus
//!
//! Components publish lifecycle events to an explicit bus instead of mutating
//! shared observer state. Delivery uses a bounded broadcast channel: an event
//! is placed in every current subscriber's buffer within the loop iteration
//! that produced it, so subscribers observe events in emission order.

use crate::order::{Fill, Order};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default buffer size per subscriber
const DEFAULT_CAPACITY: usize = 256;

/// A health dimension evaluated independently by the engine health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthDimension {
    /// Tick data recency
    Heartbeat,
    /// Spot price feed connection
    SpotFeed,
    /// Order book feed connection
    BookFeed,
    /// Risk gate status
    Risk,
}

impl std::fmt::Display for HealthDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthDimension::Heartbeat => "heartbeat",
            HealthDimension::SpotFeed => "spot_feed",
            HealthDimension::BookFeed => "book_feed",
            HealthDimension::Risk => "risk",
        };
        write!(f, "{}", s)
    }
}

/// Events emitted by the engine and its components
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Engine reached RUNNING
    Started,
    /// Engine reached STOPPED
    Stopped,
    /// Engine transitioned to PAUSED
    Paused,
    /// Engine resumed RUNNING
    Resumed,
    /// An order was created in the ledger
    OrderCreated(Order),
    /// A fill was applied to an order
    OrderFill { order: Order, fill: Fill },
    /// An order reached a terminal state
    OrderComplete(Order),
    /// The kill switch tripped; trading halts until operator resume
    KillSwitch { reason: String },
    /// The circuit breaker changed state
    CircuitBreaker { tripped: bool, reason: String },
    /// Periodic health evaluation completed
    HealthCheck { healthy: bool },
    /// One health dimension is failing
    HealthWarning {
        dimension: HealthDimension,
        detail: String,
    },
    /// A recoverable error was caught and logged
    Error { context: String },
}

/// Bounded pub/sub bus for engine events
///
/// Cloning the bus shares the underlying channel; `emit` never blocks and
/// silently drops events when nobody is subscribed.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus with the default subscriber buffer size
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with a custom subscriber buffer size
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers
    pub fn emit(&self, event: EngineEvent) {
        // Err means no active subscribers, which is fine
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
