//! JSON file snapshot store
//!
//! Writes to a temporary file and renames it into place so a crash mid-write
//! never corrupts the previous snapshot.

use super::{Snapshot, SnapshotStore};
use async_trait::async_trait;
use std::path::PathBuf;

/// Snapshot store backed by a single JSON file
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store writing to the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        tmp
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(
            path = %self.path.display(),
            orders = snapshot.orders.len(),
            positions = snapshot.positions.len(),
            "Snapshot written"
        );
        Ok(())
    }

    async fn load(&self) -> anyhow::Result<Option<Snapshot>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let snapshot = serde_json::from_slice(&bytes)?;
                Ok(Some(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineState, SessionStats};
    use crate::risk::RiskStatus;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn snapshot() -> Snapshot {
        Snapshot {
            timestamp: Utc::now(),
            engine_state: EngineState::Running,
            session_stats: SessionStats::new(Utc::now()),
            orders: vec![],
            positions: vec![],
            risk_status: RiskStatus {
                trading_allowed: true,
                halt: None,
                breaker_tripped: false,
                exposure: Decimal::ZERO,
                hourly_loss: Decimal::ZERO,
                daily_loss: Decimal::ZERO,
                open_trades: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("engine.json"));

        let snap = snapshot();
        store.save(&snap).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.timestamp, snap.timestamp);
        assert_eq!(loaded.engine_state, EngineState::Running);
        assert!(loaded.risk_status.trading_allowed);
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("missing.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("engine.json"));

        let mut first = snapshot();
        first.session_stats.orders_placed = 1;
        store.save(&first).await.unwrap();

        let mut second = snapshot();
        second.session_stats.orders_placed = 2;
        store.save(&second).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.session_stats.orders_placed, 2);
    }

    #[tokio::test]
    async fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested/state/engine.json"));
        store.save(&snapshot()).await.unwrap();
        assert!(store.load().await.unwrap().is_some());
    }
}
