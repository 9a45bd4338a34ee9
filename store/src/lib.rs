//! Append-only snapshot log.
//!
//! The analysis core only ever sees the [`SnapshotStore`] trait; the SQLite
//! backend is what the collector and cli wire in, the in-memory one backs
//! tests and dry experiments.

pub mod memory;
pub mod sqlite_store;

use async_trait::async_trait;
use corelib::Snapshot;
use thiserror::Error;

pub use memory::MemorySnapshotStore;
pub use sqlite_store::SqliteSnapshotStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("non-monotonic timestamp for {asset}: {ts_ms} <= last stored {last_ms}")]
    NonMonotonic {
        asset: String,
        last_ms: u64,
        ts_ms: u64,
    },

    #[error("value out of range: {0}")]
    OutOfRange(String),
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Appends one snapshot. Rejects timestamps that do not strictly increase per asset.
    async fn append(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Snapshots for `asset` with `from_ms <= ts_ms <= to_ms`, ascending by timestamp.
    async fn query(&self, asset: &str, from_ms: u64, to_ms: u64) -> Result<Vec<Snapshot>, StoreError>;

    /// The most recent `n` snapshots for `asset`, ascending by timestamp.
    async fn latest(&self, asset: &str, n: usize) -> Result<Vec<Snapshot>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Newest timestamp across all assets.
    async fn latest_timestamp(&self) -> Result<Option<u64>, StoreError>;

    /// Removes every snapshot older than `ts_ms`; returns how many were removed.
    async fn prune_before(&self, ts_ms: u64) -> Result<u64, StoreError>;
}
