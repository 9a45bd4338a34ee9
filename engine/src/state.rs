use std::collections::HashMap;

use chrono::{DateTime, Utc};
use corelib::{AssetState, InsufficientAsset, MarketState, RiskContext, SCHEMA_VERSION};
use rayon::prelude::*;
use thiserror::Error;

use crate::features::{AssetFeatures, FeatureEngine, InsufficientData, InsufficientReason};
use crate::window::FeatureWindow;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("no configured asset has usable features ({} insufficient)", insufficient.len())]
    NoUsableData { insufficient: Vec<InsufficientAsset> },
}

/// Assembles one [`MarketState`] per analysis run.
///
/// Assets are derived in parallel and collected in configured order, so the
/// rendered document depends only on the windows and `generated_at`.
#[derive(Debug, Clone)]
pub struct MarketStateBuilder {
    engine: FeatureEngine,
    assets: Vec<String>,
    risk: RiskContext,
}

impl MarketStateBuilder {
    pub fn new(engine: FeatureEngine, assets: Vec<String>, risk: RiskContext) -> Self {
        Self { engine, assets, risk }
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn build(
        &self,
        windows: &HashMap<String, FeatureWindow>,
        generated_at: DateTime<Utc>,
    ) -> Result<MarketState, BuildError> {
        let results: Vec<Result<AssetFeatures, InsufficientData>> = self
            .assets
            .par_iter()
            .map(|asset| match windows.get(asset) {
                Some(window) => self.engine.derive(window),
                None => Err(InsufficientData {
                    asset: asset.clone(),
                    snapshots: 0,
                    reason: InsufficientReason::EmptyWindow,
                    levels: Default::default(),
                }),
            })
            .collect();

        let mut assets = Vec::new();
        let mut insufficient_data = Vec::new();
        for result in results {
            match result {
                Ok(features) => assets.push(asset_state(features)),
                Err(e) => {
                    tracing::warn!(asset = %e.asset, snapshots = e.snapshots, reason = %e.reason, "asset omitted");
                    insufficient_data.push(e.to_model());
                }
            }
        }

        if assets.is_empty() {
            return Err(BuildError::NoUsableData {
                insufficient: insufficient_data,
            });
        }

        Ok(MarketState {
            schema_version: SCHEMA_VERSION,
            generated_at,
            risk_context: self.risk,
            assets,
            insufficient_data,
        })
    }
}

fn asset_state(f: AssetFeatures) -> AssetState {
    let c = f.context;
    AssetState {
        asset: f.asset,
        last_price: c.last_price,
        price: c.price,
        spread_bps: c.spread_bps,
        returns: c.returns,
        levels: f.levels,
        volatility: f.volatility,
        flow: f.flow,
        depth: f.depth,
        key_levels: f.key_levels,
        funding_rate: c.funding_rate,
        open_interest: c.open_interest,
        open_interest_delta: c.open_interest_delta,
        snapshots: f.snapshots,
        window_start_ms: f.window_start_ms,
        window_end_ms: f.window_end_ms,
    }
}
