//! Per-asset feature derivation.
//!
//! Each feature is a pure function over a [`FeatureWindow`]. The
//! [`FeatureEngine`] runs all of them and decides whether the window is
//! good enough to describe the asset.

pub mod context;
pub mod depth;
pub mod flow;
pub mod key_levels;
pub mod levels;
pub mod volatility;

use corelib::{BookDepth, FlowMetric, KeyLevels, LevelSet, VolatilityMetric};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::window::FeatureWindow;

pub use context::{ContextExtractor, MarketContext};
pub use depth::DepthGauge;
pub use flow::FlowMeter;
pub use key_levels::KeyLevelExtractor;
pub use levels::LevelDetector;
pub use volatility::VolatilityEstimator;

/// Minimum snapshots for volatility and flow.
pub const MIN_SNAPSHOTS: usize = 2;

pub trait Feature: Send + Sync {
    type Output;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn derive(&self, window: &FeatureWindow) -> Self::Output;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetFeatures {
    pub asset: String,
    pub levels: LevelSet,
    pub volatility: VolatilityMetric,
    pub flow: FlowMetric,
    pub depth: BookDepth,
    pub key_levels: KeyLevels,
    pub context: MarketContext,
    pub snapshots: usize,
    pub window_start_ms: u64,
    pub window_end_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsufficientReason {
    EmptyWindow,
    NoValidMid,
    TooFewSnapshots { required: usize, valid: usize },
}

impl std::fmt::Display for InsufficientReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyWindow => write!(f, "no snapshots in window"),
            Self::NoValidMid => write!(f, "no snapshot with a valid mid price"),
            Self::TooFewSnapshots { required, valid } => {
                write!(f, "need {required} snapshots with a valid mid, have {valid}")
            }
        }
    }
}

/// The window cannot support volatility and flow. Levels are still
/// reported when any ladder was usable.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("insufficient data for {asset}: {reason}")]
pub struct InsufficientData {
    pub asset: String,
    pub snapshots: usize,
    pub reason: InsufficientReason,
    pub levels: LevelSet,
}

impl InsufficientData {
    pub fn to_model(&self) -> corelib::InsufficientAsset {
        corelib::InsufficientAsset {
            asset: self.asset.clone(),
            snapshots: self.snapshots,
            reason: self.reason.to_string(),
            levels: self.levels.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureEngine {
    levels: LevelDetector,
    volatility: VolatilityEstimator,
    flow: FlowMeter,
    depth: DepthGauge,
    key_levels: KeyLevelExtractor,
    context: ContextExtractor,
}

impl FeatureEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            levels: LevelDetector::new(config.levels),
            volatility: VolatilityEstimator::new(config.volatility),
            flow: FlowMeter,
            depth: DepthGauge,
            key_levels: KeyLevelExtractor,
            context: ContextExtractor,
        }
    }

    pub fn derive(&self, window: &FeatureWindow) -> Result<AssetFeatures, InsufficientData> {
        let asset = window.asset().to_string();
        let snapshots = window.len();

        let insufficient = |reason, levels| InsufficientData {
            asset: asset.clone(),
            snapshots,
            reason,
            levels,
        };

        if window.is_empty() {
            return Err(insufficient(InsufficientReason::EmptyWindow, LevelSet::default()));
        }

        let levels = self.levels.derive(window);
        let valid = window.mids().len();
        if valid == 0 {
            return Err(insufficient(InsufficientReason::NoValidMid, levels));
        }

        let (Some(volatility), Some(flow), Some(depth), Some(context)) = (
            self.volatility.derive(window),
            self.flow.derive(window),
            self.depth.derive(window),
            self.context.derive(window),
        ) else {
            return Err(insufficient(
                InsufficientReason::TooFewSnapshots {
                    required: MIN_SNAPSHOTS,
                    valid,
                },
                levels,
            ));
        };

        let (window_start_ms, window_end_ms) = match (window.first(), window.last()) {
            (Some(first), Some(last)) => (first.ts_ms, last.ts_ms),
            _ => (0, 0),
        };

        let key_levels = self.key_levels.derive(window);

        tracing::debug!(
            asset = %asset,
            snapshots,
            levels = levels.len(),
            atr_15m = ?key_levels.atr_15m,
            realized = volatility.realized,
            regime = ?volatility.regime,
            imbalance = flow.book_imbalance,
            bias = flow.trade_flow_bias,
            "derived features"
        );

        Ok(AssetFeatures {
            asset,
            levels,
            volatility,
            flow,
            depth,
            key_levels,
            context,
            snapshots,
            window_start_ms,
            window_end_ms,
        })
    }
}

/// `(a − b) / (a + b)` clamped to [-1, 1], 0 when the denominator is not positive.
pub(crate) fn normalized_difference(a: f64, b: f64) -> f64 {
    let total = a + b;
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    ((a - b) / total).clamp(-1.0, 1.0)
}
