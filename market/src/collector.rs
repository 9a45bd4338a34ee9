//! Snapshot collector
//!
//! Ticks on a fixed cadence, fetches every configured asset from a
//! [`MarketFeed`] and appends the snapshots to a [`SnapshotStore`].
//!
//! Data flow:
//! Exchange → MarketFeed → Collector → SnapshotStore

use std::time::Duration;

use common::logger::{TraceId, annotate_span, child_span, root_span};
use store::SnapshotStore;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{Instrument, info, warn};

use crate::MarketFeed;

/// Result of one collection cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub stored: usize,
    pub failed: usize,
}

/// Fetches and stores one snapshot per asset. Failures are logged per asset
/// and counted, never propagated.
pub async fn collect_once(feed: &dyn MarketFeed, store: &dyn SnapshotStore, assets: &[String]) -> CycleReport {
    let mut report = CycleReport::default();

    for asset in assets {
        let span = child_span("collect_asset");
        let stored = async {
            annotate_span(Some(asset), None);

            let snapshot = match feed.fetch_snapshot(asset).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(asset = %asset, error = %e, "snapshot fetch failed");
                    return false;
                }
            };

            match store.append(&snapshot).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(asset = %asset, ts_ms = snapshot.ts_ms, error = %e, "snapshot append failed");
                    false
                }
            }
        }
        .instrument(span)
        .await;

        if stored {
            report.stored += 1;
        } else {
            report.failed += 1;
        }
    }

    report
}

/// Shortest tick the loop accepts; `interval` panics on a zero period.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Runs the collector loop until `shutdown` flips to `true` (or its sender is
/// dropped). Returns the number of completed cycles.
pub async fn run_collector(
    feed: &dyn MarketFeed,
    store: &dyn SnapshotStore,
    assets: &[String],
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let trace_id = TraceId::new();
    let span = root_span("collect", &trace_id);

    let every = every.max(MIN_TICK);

    async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            assets = ?assets,
            every_ms = every.as_millis() as u64,
            "collector started"
        );

        let mut cycles = 0u64;
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let report = collect_once(feed, store, assets).await;
            cycles += 1;

            if report.failed == 0 {
                info!(cycle = cycles, stored = report.stored, "collection cycle complete");
            } else {
                warn!(
                    cycle = cycles,
                    stored = report.stored,
                    failed = report.failed,
                    "collection cycle incomplete"
                );
            }
        }

        info!(cycles, "collector stopped");
        cycles
    }
    .instrument(span)
    .await
}
