//! Feature outputs derived from a window of snapshots.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    /// Below the window's final mid price.
    Support,
    /// At or above the window's final mid price.
    Resistance,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    /// Recency-weighted resting size observed at or near `price`.
    pub strength: f64,
    pub kind: LevelKind,
    /// Number of snapshots whose ladder contributed to this level.
    pub touches: u32,
}

/// Deduplicated support/resistance levels, ordered by ascending price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelSet {
    pub levels: Vec<PriceLevel>,
}

impl LevelSet {
    pub fn supports(&self) -> impl Iterator<Item = &PriceLevel> {
        self.levels.iter().filter(|l| l.kind == LevelKind::Support)
    }

    pub fn resistances(&self) -> impl Iterator<Item = &PriceLevel> {
        self.levels.iter().filter(|l| l.kind == LevelKind::Resistance)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRegime {
    Compressed,
    Normal,
    Expanding,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityMetric {
    /// Annualised standard deviation of log mid returns over the full window.
    pub realized: f64,
    /// Same measure over the short lookback at the end of the window.
    pub short_realized: f64,
    /// `short_realized / realized`, 0 when the window is flat.
    pub ratio: f64,
    pub regime: VolatilityRegime,
    pub returns_used: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowMetric {
    /// (bid size − ask size) / (bid size + ask size) at the final snapshot, in [-1, 1].
    pub book_imbalance: f64,
    /// (buy volume − sell volume) / total volume over the window, in [-1, 1].
    pub trade_flow_bias: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub total_volume: f64,
}

/// Resting notional close to the touch at the final snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BookDepth {
    /// Bid notional (price × size) within 0.1% of the best bid.
    pub bid_notional_near: f64,
    pub ask_notional_near: f64,
    /// Bid notional within 0.5% of the best bid.
    pub bid_notional_wide: f64,
    pub ask_notional_wide: f64,
    /// Normalized difference of the two near notionals, in [-1, 1].
    pub near_imbalance: f64,
}

/// Reference prices from candles and the exchange's daily context.
/// Every value is `None` when the data behind it was not collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyLevels {
    /// Mean true range of recent 15-minute bars.
    pub atr_15m: Option<f64>,
    /// Volume-weighted typical price over the 15-minute bars.
    pub vwap: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub prior_day_high: Option<f64>,
    pub prior_day_low: Option<f64>,
    pub prior_day_close: Option<f64>,
    /// Exchange reference price 24 hours back.
    pub prev_day_price: Option<f64>,
}
