//! Market State document: the bounded, versioned summary handed to the model.
//!
//! The shape is fixed. Optional values serialize as `null` rather than being
//! omitted, so consumers never special-case a missing key, and assets keep
//! the configured order so the rendered document is reproducible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::features::{BookDepth, FlowMetric, KeyLevels, LevelSet, VolatilityMetric};

pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskContext {
    pub equity_usd: f64,
    pub max_loss_per_trade_usd: f64,
    pub max_total_risk_usd: f64,
    pub min_leverage: u32,
    pub max_leverage: u32,
}

impl RiskContext {
    pub fn from_percentages(
        equity_usd: f64,
        max_risk_per_trade_pct: f64,
        max_total_risk_pct: f64,
        min_leverage: u32,
        max_leverage: u32,
    ) -> Self {
        Self {
            equity_usd,
            max_loss_per_trade_usd: equity_usd * max_risk_per_trade_pct / 100.0,
            max_total_risk_usd: equity_usd * max_total_risk_pct / 100.0,
            min_leverage,
            max_leverage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceContext {
    pub mid: f64,
    pub mark: Option<f64>,
}

/// Percentage change of mid versus N snapshots back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Returns {
    pub pct_1: Option<f64>,
    pub pct_5: Option<f64>,
    pub pct_15: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetState {
    pub asset: String,
    pub last_price: f64,
    pub price: PriceContext,
    pub spread_bps: f64,
    pub returns: Returns,
    pub levels: LevelSet,
    pub volatility: VolatilityMetric,
    pub flow: FlowMetric,
    pub depth: BookDepth,
    pub key_levels: KeyLevels,
    pub funding_rate: Option<f64>,
    pub open_interest: Option<f64>,
    pub open_interest_delta: Option<f64>,
    pub snapshots: usize,
    pub window_start_ms: u64,
    pub window_end_ms: u64,
}

/// An asset whose window could not support the full feature set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsufficientAsset {
    pub asset: String,
    pub snapshots: usize,
    pub reason: String,
    /// Levels still derivable from a single ladder, if any.
    pub levels: LevelSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub risk_context: RiskContext,
    pub assets: Vec<AssetState>,
    pub insufficient_data: Vec<InsufficientAsset>,
}

impl MarketState {
    /// The exact text embedded in the model prompt and printed by dry runs.
    pub fn to_canonical_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn usable_assets(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(|a| a.asset.as_str())
    }

    pub fn asset(&self, symbol: &str) -> Option<&AssetState> {
        self.assets.iter().find(|a| a.asset == symbol)
    }
}
