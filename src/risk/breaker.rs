//! Circuit breaker
//!
//! A second trading halt, independent of the kill switch. It is tripped by
//! external failure signals (invariant violations, connectivity trouble) and,
//! unlike the kill switch, clears itself once the cooldown elapses.

use chrono::{DateTime, Duration, Utc};

/// Auto-clearing trading halt
#[derive(Debug)]
pub struct CircuitBreaker {
    cooldown: Duration,
    tripped_at: Option<DateTime<Utc>>,
    reason: Option<String>,
    total_trips: u64,
}

impl CircuitBreaker {
    /// Create a breaker with the given cooldown
    pub fn new(cooldown_secs: u64) -> Self {
        Self {
            cooldown: Duration::seconds(cooldown_secs as i64),
            tripped_at: None,
            reason: None,
            total_trips: 0,
        }
    }

    /// Trip the breaker; restarts the cooldown if already tripped
    pub fn trip(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        let reason = reason.into();
        tracing::warn!(reason = %reason, "Circuit breaker tripped");
        self.tripped_at = Some(now);
        self.reason = Some(reason);
        self.total_trips += 1;
    }

    /// Whether the breaker currently blocks trading
    ///
    /// Once the cooldown has elapsed the breaker reads as clear without an
    /// explicit reset.
    pub fn is_tripped(&self, now: DateTime<Utc>) -> bool {
        match self.tripped_at {
            Some(at) => now - at < self.cooldown,
            None => false,
        }
    }

    /// Explicitly clear the breaker before the cooldown elapses
    pub fn clear(&mut self) {
        if self.tripped_at.is_some() {
            tracing::info!("Circuit breaker cleared");
        }
        self.tripped_at = None;
        self.reason = None;
    }

    /// Last trip reason, if the breaker has ever tripped
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Total number of trips this session
    pub fn total_trips(&self) -> u64 {
        self.total_trips
    }
}
