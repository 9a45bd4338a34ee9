//! One analysis run: load windows, build the Market State, ask the model,
//! validate, rank and size.
//!
//! Everything a run needs travels in [`AnalysisRun`]; nothing is shared
//! between runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::logger::{TraceId, child_span, root_span};
use corelib::{InsufficientAsset, MarketState, PlaybookMenu, PositionPlan, RankedResult, RiskContext};
use engine::{BuildError, EngineConfig, FeatureEngine, FeatureWindow, MarketStateBuilder, WindowSpec};
use serde::{Deserialize, Serialize};
use store::{SnapshotStore, StoreError};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{Instrument, Level, debug, info, warn};

use crate::backend::ModelBackend;
use crate::confidence::ConfidenceWeights;
use crate::prompt::{PromptComposer, SamplingParams};
use crate::ranker::SetupRanker;
use crate::sizing::PositionSizer;
use crate::validator::{ResponseValidator, RetryPolicy, ValidationOutcome};

#[derive(Error, Debug)]
pub enum RunError {
    #[error("snapshot store: {0}")]
    Store(#[from] StoreError),

    #[error("encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("analysis log: {0}")]
    Log(#[from] std::io::Error),
}

/// Window bounds: a default snapshot count with per-asset overrides, and a
/// maximum age.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSettings {
    pub snapshots: usize,
    pub per_asset: HashMap<String, usize>,
    pub minutes: u64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            snapshots: 60,
            per_asset: HashMap::new(),
            minutes: 90,
        }
    }
}

impl WindowSettings {
    pub fn spec_for(&self, asset: &str) -> WindowSpec {
        WindowSpec {
            max_snapshots: self.per_asset.get(asset).copied().unwrap_or(self.snapshots),
            max_age_ms: self.minutes.saturating_mul(60_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub assets: Vec<String>,
    pub windows: WindowSettings,
    pub engine: EngineConfig,
    pub risk: RiskContext,
    pub menu: PlaybookMenu,
    pub sampling: SamplingParams,
    pub retry: RetryPolicy,
    pub confidence_weights: ConfidenceWeights,
    /// Accepted reports are appended here as JSON lines.
    pub analysis_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Build the Market State and stop; the backend is never called.
    DryRun,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub trace_id: String,
    pub generated_at: DateTime<Utc>,
    pub backend: String,
    pub attempts: u32,
    pub ranked: RankedResult,
    /// One plan per ranked setup, same order.
    pub plans: Vec<PositionPlan>,
    pub insufficient_data: Vec<InsufficientAsset>,
}

#[derive(Debug)]
pub enum AnalysisOutcome {
    DryRun(MarketState),
    Ranked(AnalysisReport),
    NoUsableData(Vec<InsufficientAsset>),
    Unavailable { attempts: u32, last_failure: String },
    Aborted,
}

pub struct AnalysisRun<'a> {
    trace_id: TraceId,
    as_of: DateTime<Utc>,
    config: &'a AnalysisConfig,
}

impl<'a> AnalysisRun<'a> {
    pub fn new(config: &'a AnalysisConfig, as_of: DateTime<Utc>) -> Self {
        Self {
            trace_id: TraceId::new(),
            as_of,
            config,
        }
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub async fn execute(
        &self,
        store: &dyn SnapshotStore,
        backend: &dyn ModelBackend,
        mode: AnalysisMode,
        abort: watch::Receiver<bool>,
    ) -> Result<AnalysisOutcome, RunError> {
        let span = root_span("analyze", &self.trace_id);
        self.execute_inner(store, backend, mode, abort).instrument(span).await
    }

    async fn execute_inner(
        &self,
        store: &dyn SnapshotStore,
        backend: &dyn ModelBackend,
        mode: AnalysisMode,
        abort: watch::Receiver<bool>,
    ) -> Result<AnalysisOutcome, RunError> {
        let started = Instant::now();
        let windows = self.load_windows(store).await?;

        let state = match self.build_state(&windows) {
            Ok(state) => state,
            Err(BuildError::NoUsableData { insufficient }) => {
                warn!(assets = insufficient.len(), "no usable data; model not called");
                return Ok(AnalysisOutcome::NoUsableData(insufficient));
            }
        };

        if tracing::enabled!(Level::DEBUG) {
            let document = state.to_canonical_json()?;
            debug!(document = %document, "market state");
        }

        if mode == AnalysisMode::DryRun {
            return Ok(AnalysisOutcome::DryRun(state));
        }

        let request = PromptComposer::new(self.config.sampling)
            .with_weights(self.config.confidence_weights)
            .compose(&state, &self.config.menu)?;
        let validator = ResponseValidator::new(&self.config.menu, state.usable_assets(), self.config.retry)
            .with_weights(self.config.confidence_weights);
        let run = validator.run(backend, &request, &abort).await;
        debug!(trace = ?run.trace, "validator finished");

        let (batch, attempts) = match run.outcome {
            ValidationOutcome::Accepted { batch, attempts } => (batch, attempts),
            ValidationOutcome::Unavailable { attempts, last_failure } => {
                return Ok(AnalysisOutcome::Unavailable {
                    attempts,
                    last_failure: last_failure.to_string(),
                });
            }
            ValidationOutcome::Aborted { .. } => return Ok(AnalysisOutcome::Aborted),
        };

        let rejected = batch.rejected();
        let ranked = SetupRanker::default().rank(batch.setups, rejected);
        let plans = PositionSizer::new(state.risk_context).plan(&ranked.setups);

        for s in ranked.setups.iter().filter(|s| s.risk_reward() < 1.5) {
            warn!(asset = %s.asset, rr = s.risk_reward(), "setup below 1.5R to first target");
        }

        let report = AnalysisReport {
            trace_id: self.trace_id.to_string(),
            generated_at: state.generated_at,
            backend: backend.name().to_string(),
            attempts,
            ranked,
            plans,
            insufficient_data: state.insufficient_data,
        };

        if let Some(path) = &self.config.analysis_log {
            append_report(path, &report).await?;
        }

        info!(
            setups = report.ranked.setups.len(),
            rejected = report.ranked.rejected,
            attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );
        Ok(AnalysisOutcome::Ranked(report))
    }

    /// One window per configured asset, newest `as_of`, bounded by age and count.
    async fn load_windows(&self, store: &dyn SnapshotStore) -> Result<HashMap<String, FeatureWindow>, RunError> {
        let to_ms = u64::try_from(self.as_of.timestamp_millis()).unwrap_or_default();
        let mut windows = HashMap::new();

        for asset in &self.config.assets {
            let spec = self.config.windows.spec_for(asset);
            let from_ms = to_ms.saturating_sub(spec.max_age_ms);

            let mut snapshots = store.query(asset, from_ms, to_ms).await?;
            let excess = snapshots.len().saturating_sub(spec.max_snapshots);
            snapshots.drain(..excess);

            match FeatureWindow::from_snapshots(asset.clone(), spec, snapshots) {
                Ok(w) => {
                    debug!(asset = %asset, snapshots = w.len(), "window loaded");
                    windows.insert(asset.clone(), w);
                }
                Err(e) => warn!(asset = %asset, error = %e, "window rejected"),
            }
        }
        Ok(windows)
    }

    fn build_state(&self, windows: &HashMap<String, FeatureWindow>) -> Result<MarketState, BuildError> {
        let _g = child_span("build_state").entered();
        MarketStateBuilder::new(
            FeatureEngine::new(self.config.engine),
            self.config.assets.clone(),
            self.config.risk,
        )
        .build(windows, self.as_of)
    }
}

async fn append_report(path: &Path, report: &AnalysisReport) -> Result<(), RunError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut line = serde_json::to_string(report)?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
