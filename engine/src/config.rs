use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("cluster distance must be a non-negative percentage, got {0}")]
    ClusterPct(f64),

    #[error("recency decay must be in (0, 1], got {0}")]
    RecencyDecay(f64),

    #[error("top-k levels must be at least 1")]
    TopK,

    #[error("single-snapshot strength floor must be in [0, 1], got {0}")]
    SingleSnapshotFloor(f64),

    #[error("short volatility lookback must be at least 1")]
    ShortLookback,

    #[error("periods per year must be positive, got {0}")]
    PeriodsPerYear(f64),

    #[error("regime thresholds must satisfy 0 <= compressed ({0}) <= expanding ({1})")]
    RegimeThresholds(f64, f64),
}

/// Level clustering knobs. The distance threshold and decay are product
/// tuning parameters and always come from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Cluster distance as a percentage of the window's final mid price.
    pub cluster_pct: f64,

    /// Per-snapshot recency weight: the newest snapshot weighs 1, the one
    /// before it `decay`, then `decay^2`, and so on.
    pub recency_decay: f64,

    /// Clusters kept per side (support / resistance).
    pub top_k: usize,

    /// Levels weaker than this are dropped.
    pub min_strength: f64,

    /// A one-snapshot window has no recency history to separate real levels
    /// from passing size, so clusters weaker than this fraction of its
    /// strongest cluster are dropped as well.
    pub single_snapshot_floor: f64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            cluster_pct: 0.1,
            recency_decay: 0.95,
            top_k: 3,
            min_strength: 0.0,
            single_snapshot_floor: 0.25,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolatilityConfig {
    /// Number of trailing returns in the short sub-window.
    pub short_lookback: usize,

    /// Snapshot periods per year; 525 600 for a one-minute cadence.
    pub periods_per_year: f64,

    /// short/long ratio below which the regime is compressed.
    pub compressed_below: f64,

    /// short/long ratio above which the regime is expanding.
    pub expanding_above: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            short_lookback: 10,
            periods_per_year: 525_600.0,
            compressed_below: 0.75,
            expanding_above: 1.25,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub levels: LevelConfig,
    pub volatility: VolatilityConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.levels;
        if !(l.cluster_pct >= 0.0 && l.cluster_pct.is_finite()) {
            return Err(ConfigError::ClusterPct(l.cluster_pct));
        }
        if !(l.recency_decay > 0.0 && l.recency_decay <= 1.0) {
            return Err(ConfigError::RecencyDecay(l.recency_decay));
        }
        if l.top_k == 0 {
            return Err(ConfigError::TopK);
        }
        if !(0.0..=1.0).contains(&l.single_snapshot_floor) {
            return Err(ConfigError::SingleSnapshotFloor(l.single_snapshot_floor));
        }

        let v = &self.volatility;
        if v.short_lookback == 0 {
            return Err(ConfigError::ShortLookback);
        }
        if !(v.periods_per_year > 0.0 && v.periods_per_year.is_finite()) {
            return Err(ConfigError::PeriodsPerYear(v.periods_per_year));
        }
        if !(v.compressed_below >= 0.0 && v.compressed_below <= v.expanding_above) {
            return Err(ConfigError::RegimeThresholds(
                v.compressed_below,
                v.expanding_above,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_decay_and_thresholds() {
        let mut cfg = EngineConfig::default();
        cfg.levels.recency_decay = 0.0;
        assert_eq!(cfg.validate(), Err(ConfigError::RecencyDecay(0.0)));

        let mut cfg = EngineConfig::default();
        cfg.volatility.compressed_below = 2.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::RegimeThresholds(..))));

        let mut cfg = EngineConfig::default();
        cfg.levels.top_k = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::TopK));

        let mut cfg = EngineConfig::default();
        cfg.levels.single_snapshot_floor = 1.5;
        assert_eq!(cfg.validate(), Err(ConfigError::SingleSnapshotFloor(1.5)));
    }
}
