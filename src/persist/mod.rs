//! Crash persistence port
//!
//! The engine writes a compact snapshot on a fixed interval and after every
//! order completion. The storage medium is an implementation detail behind
//! [`SnapshotStore`]; only the snapshot schema is part of the contract.

mod file;

pub use file::FileSnapshotStore;

use crate::engine::{EngineState, Position, SessionStats};
use crate::order::Order;
use crate::risk::RiskStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything needed to recover engine state after an uncontrolled restart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub engine_state: EngineState,
    pub session_stats: SessionStats,
    pub orders: Vec<Order>,
    pub positions: Vec<Position>,
    pub risk_status: RiskStatus,
}

impl Snapshot {
    /// Age of the snapshot relative to `now`
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_seconds()
    }
}

/// Storage port for engine snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot, replacing any previous one
    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()>;
    /// Load the last snapshot, if one exists
    async fn load(&self) -> anyhow::Result<Option<Snapshot>>;
}
