use std::collections::VecDeque;

use corelib::Snapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum WindowError {
    #[error("snapshot for {got} pushed into window for {expected}")]
    AssetMismatch { expected: String, got: String },

    #[error("timestamp {ts_ms} does not follow {last_ms}")]
    NonIncreasing { last_ms: u64, ts_ms: u64 },
}

/// Bounds of a feature window: last `max_snapshots` observations no older
/// than `max_age_ms` relative to the newest one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub max_snapshots: usize,
    pub max_age_ms: u64,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            max_snapshots: 60,
            max_age_ms: 90 * 60 * 1_000,
        }
    }
}

/// Ordered, time-bounded run of snapshots for one asset.
///
/// Timestamps strictly increase front to back. Pushing evicts from the
/// front by count and by age.
#[derive(Clone, Debug)]
pub struct FeatureWindow {
    asset: String,
    spec: WindowSpec,
    snapshots: VecDeque<Snapshot>,
}

impl FeatureWindow {
    pub fn new(asset: impl Into<String>, spec: WindowSpec) -> Self {
        Self {
            asset: asset.into(),
            spec,
            snapshots: VecDeque::with_capacity(spec.max_snapshots),
        }
    }

    /// Builds a window from snapshots in ascending timestamp order.
    pub fn from_snapshots<I>(asset: impl Into<String>, spec: WindowSpec, snapshots: I) -> Result<Self, WindowError>
    where
        I: IntoIterator<Item = Snapshot>,
    {
        let mut window = Self::new(asset, spec);
        for s in snapshots {
            window.push(s)?;
        }
        Ok(window)
    }

    pub fn push(&mut self, snapshot: Snapshot) -> Result<(), WindowError> {
        if snapshot.asset != self.asset {
            return Err(WindowError::AssetMismatch {
                expected: self.asset.clone(),
                got: snapshot.asset,
            });
        }
        if let Some(last) = self.snapshots.back()
            && last.ts_ms >= snapshot.ts_ms
        {
            return Err(WindowError::NonIncreasing {
                last_ms: last.ts_ms,
                ts_ms: snapshot.ts_ms,
            });
        }

        let now_ms = snapshot.ts_ms;
        self.snapshots.push_back(snapshot);

        while self.snapshots.len() > self.spec.max_snapshots {
            self.snapshots.pop_front();
        }
        self.evict_old(now_ms);
        Ok(())
    }

    fn evict_old(&mut self, now_ms: u64) {
        while let Some(front) = self.snapshots.front() {
            if now_ms.saturating_sub(front.ts_ms) > self.spec.max_age_ms {
                self.snapshots.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Snapshot> + ExactSizeIterator {
        self.snapshots.iter()
    }

    pub fn first(&self) -> Option<&Snapshot> {
        self.snapshots.front()
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    /// Mid prices of snapshots with a sane top of book, in window order.
    pub fn mids(&self) -> Vec<f64> {
        self.snapshots.iter().filter_map(Snapshot::mid).collect()
    }
}
