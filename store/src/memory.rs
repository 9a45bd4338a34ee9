use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use corelib::Snapshot;
use tokio::sync::Mutex;

use super::{SnapshotStore, StoreError};

/// In-memory snapshot log with the same ordering and monotonicity rules as
/// the SQLite store.
#[derive(Default, Clone)]
pub struct MemorySnapshotStore {
    map: Arc<Mutex<HashMap<String, Vec<Snapshot>>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn append(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut map = self.map.lock().await;
        let series = map.entry(snapshot.asset.clone()).or_default();

        if let Some(last) = series.last()
            && last.ts_ms >= snapshot.ts_ms
        {
            return Err(StoreError::NonMonotonic {
                asset: snapshot.asset.clone(),
                last_ms: last.ts_ms,
                ts_ms: snapshot.ts_ms,
            });
        }

        series.push(snapshot.clone());
        Ok(())
    }

    async fn query(&self, asset: &str, from_ms: u64, to_ms: u64) -> Result<Vec<Snapshot>, StoreError> {
        let map = self.map.lock().await;
        Ok(map
            .get(asset)
            .map(|series| {
                series
                    .iter()
                    .filter(|s| s.ts_ms >= from_ms && s.ts_ms <= to_ms)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn latest(&self, asset: &str, n: usize) -> Result<Vec<Snapshot>, StoreError> {
        let map = self.map.lock().await;
        Ok(map
            .get(asset)
            .map(|series| series[series.len().saturating_sub(n)..].to_vec())
            .unwrap_or_default())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let map = self.map.lock().await;
        Ok(map.values().map(|s| s.len() as u64).sum())
    }

    async fn latest_timestamp(&self) -> Result<Option<u64>, StoreError> {
        let map = self.map.lock().await;
        Ok(map.values().filter_map(|s| s.last().map(|x| x.ts_ms)).max())
    }

    async fn prune_before(&self, ts_ms: u64) -> Result<u64, StoreError> {
        let mut map = self.map.lock().await;
        let mut removed = 0u64;
        for series in map.values_mut() {
            let before = series.len();
            series.retain(|s| s.ts_ms >= ts_ms);
            removed += (before - series.len()) as u64;
        }
        Ok(removed)
    }
}
