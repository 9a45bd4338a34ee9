//! SqliteSnapshotStore
//! --------------------
//! SQLite-backed implementation of [`SnapshotStore`]. Each row holds one
//! asset's snapshot serialized as JSON next to the indexed `(asset, ts_ms)`
//! pair, so range queries never need to decode rows outside the window.
use std::str::FromStr;

use async_trait::async_trait;
use corelib::Snapshot;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use super::{SnapshotStore, StoreError};

pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// Wraps an existing pool. The caller is responsible for calling [`Self::migrate`].
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the database at `url` and ensures the schema exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. A single connection keeps every query on
    /// the same database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS snapshots (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  asset TEXT NOT NULL,
  ts_ms INTEGER NOT NULL,
  data TEXT NOT NULL,
  UNIQUE (asset, ts_ms) -- also serves the (asset, ts_ms) range reads
);
"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn append(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let ts = u64_to_i64(snapshot.ts_ms)?;
        let data = serde_json::to_string(snapshot)?;

        let mut tx = self.pool.begin().await?;

        let last: Option<i64> =
            sqlx::query_scalar("SELECT MAX(ts_ms) FROM snapshots WHERE asset = ?;")
                .bind(&snapshot.asset)
                .fetch_one(&mut *tx)
                .await?;

        if let Some(last) = last
            && last >= ts
        {
            return Err(StoreError::NonMonotonic {
                asset: snapshot.asset.clone(),
                last_ms: i64_to_u64(last)?,
                ts_ms: snapshot.ts_ms,
            });
        }

        sqlx::query("INSERT INTO snapshots (asset, ts_ms, data) VALUES (?, ?, ?);")
            .bind(&snapshot.asset)
            .bind(ts)
            .bind(data)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, asset: &str, from_ms: u64, to_ms: u64) -> Result<Vec<Snapshot>, StoreError> {
        let rows = sqlx::query(
            r#"
SELECT data FROM snapshots
WHERE asset = ? AND ts_ms >= ? AND ts_ms <= ?
ORDER BY ts_ms ASC;
"#,
        )
        .bind(asset)
        .bind(u64_to_i64(from_ms)?)
        .bind(u64_to_i64(to_ms)?)
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows(rows))
    }

    async fn latest(&self, asset: &str, n: usize) -> Result<Vec<Snapshot>, StoreError> {
        let limit = i64::try_from(n).map_err(|_| StoreError::OutOfRange(format!("limit {n}")))?;

        let rows = sqlx::query(
            r#"
SELECT data FROM (
  SELECT data, ts_ms FROM snapshots
  WHERE asset = ?
  ORDER BY ts_ms DESC
  LIMIT ?
) ORDER BY ts_ms ASC;
"#,
        )
        .bind(asset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows(rows))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM snapshots;")
            .fetch_one(&self.pool)
            .await?;
        i64_to_u64(n)
    }

    async fn latest_timestamp(&self) -> Result<Option<u64>, StoreError> {
        let ts: Option<i64> = sqlx::query_scalar("SELECT MAX(ts_ms) FROM snapshots;")
            .fetch_one(&self.pool)
            .await?;
        ts.map(i64_to_u64).transpose()
    }

    async fn prune_before(&self, ts_ms: u64) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM snapshots WHERE ts_ms < ?;")
            .bind(u64_to_i64(ts_ms)?)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}

fn decode_rows(rows: Vec<sqlx::sqlite::SqliteRow>) -> Vec<Snapshot> {
    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        let data: String = r.get("data");
        match serde_json::from_str::<Snapshot>(&data) {
            Ok(s) => out.push(s),
            Err(e) => {
                // poison-row resilience: skip but don't fail the window
                tracing::warn!(error = %e, "skipping malformed snapshot row");
            }
        }
    }
    out
}

/* =========================
Numeric safety helpers
========================= */

fn u64_to_i64(v: u64) -> Result<i64, StoreError> {
    i64::try_from(v).map_err(|_| StoreError::OutOfRange(format!("u64 too large for i64: {v}")))
}

fn i64_to_u64(v: i64) -> Result<u64, StoreError> {
    u64::try_from(v).map_err(|_| StoreError::OutOfRange(format!("negative i64 where u64 expected: {v}")))
}
