//! Response validation as an explicit retry state machine.
//!
//! ```text
//! Requesting -> Parsing -> Validating -> Accepted
//!      ^           |            |
//!      |           v            v
//!      +---- RetryableFailure --+--> TerminalFailure (attempts exhausted)
//! ```
//!
//! Attempts are strictly sequential. Every backend call has its own timeout,
//! and the abort signal is checked before each state is entered.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use corelib::{Direction, EntryPlan, PlaybookMenu, TradeSetup};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{Instrument, debug, info, warn};

use crate::backend::ModelBackend;
use crate::confidence::{self, ConfidenceWeights, CriterionScore};
use crate::error::{ResponseFailure, SchemaViolation};
use crate::prompt::ModelRequest;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `retries + 1`.
    pub retries: u32,
    pub call_timeout: Duration,
    /// Added to the temperature on every retry.
    pub temperature_step: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            call_timeout: Duration::from_secs(60),
            temperature_step: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Observable state names, recorded in order for every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Requesting,
    Parsing,
    Validating,
    Accepted,
    RetryableFailure,
    TerminalFailure,
}

enum State {
    Requesting { attempt: u32 },
    Parsing { attempt: u32, raw: String },
    Validating { attempt: u32, candidates: Vec<Value> },
    Accepted { attempt: u32, batch: ValidatedBatch },
    RetryableFailure { attempt: u32, failure: ResponseFailure },
    TerminalFailure { attempts: u32, failure: ResponseFailure },
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            State::Requesting { .. } => Phase::Requesting,
            State::Parsing { .. } => Phase::Parsing,
            State::Validating { .. } => Phase::Validating,
            State::Accepted { .. } => Phase::Accepted,
            State::RetryableFailure { .. } => Phase::RetryableFailure,
            State::TerminalFailure { .. } => Phase::TerminalFailure,
        }
    }
}

/// Setups that passed validation plus what was dropped on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedBatch {
    pub setups: Vec<TradeSetup>,
    pub violations: Vec<SchemaViolation>,
}

impl ValidatedBatch {
    pub fn rejected(&self) -> usize {
        self.violations.len()
    }
}

#[derive(Debug)]
pub enum ValidationOutcome {
    Accepted { batch: ValidatedBatch, attempts: u32 },
    Unavailable { attempts: u32, last_failure: ResponseFailure },
    /// The run was cancelled. Nothing from it is surfaced.
    Aborted { attempts: u32 },
}

#[derive(Debug)]
pub struct ValidationRun {
    pub outcome: ValidationOutcome,
    pub trace: Vec<Phase>,
}

/// One state machine per analysis run; holds nothing shared across runs.
pub struct ResponseValidator<'a> {
    menu: &'a PlaybookMenu,
    assets: HashSet<String>,
    policy: RetryPolicy,
    weights: ConfidenceWeights,
}

impl<'a> ResponseValidator<'a> {
    pub fn new<I, S>(menu: &'a PlaybookMenu, usable_assets: I, policy: RetryPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            menu,
            assets: usable_assets.into_iter().map(Into::into).collect(),
            policy,
            weights: ConfidenceWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: ConfidenceWeights) -> Self {
        self.weights = weights;
        self
    }

    pub async fn run(
        &self,
        backend: &dyn ModelBackend,
        request: &ModelRequest,
        abort: &watch::Receiver<bool>,
    ) -> ValidationRun {
        let mut trace = Vec::new();
        let mut state = State::Requesting { attempt: 1 };
        let max_attempts = self.policy.max_attempts();

        loop {
            if *abort.borrow() {
                let attempts = match &state {
                    State::Requesting { attempt } => attempt - 1,
                    State::Parsing { attempt, .. }
                    | State::Validating { attempt, .. }
                    | State::Accepted { attempt, .. }
                    | State::RetryableFailure { attempt, .. } => *attempt,
                    State::TerminalFailure { attempts, .. } => *attempts,
                };
                warn!(attempts, phase = ?state.phase(), "validation aborted");
                return ValidationRun {
                    outcome: ValidationOutcome::Aborted { attempts },
                    trace,
                };
            }

            trace.push(state.phase());
            debug!(phase = ?state.phase(), "validator state");

            state = match state {
                State::Requesting { attempt } => {
                    let req = request.for_attempt(attempt, self.temperature(request.temperature, attempt));
                    let span = common::logger::child_span("model_call");
                    match self.call(backend, &req).instrument(span).await {
                        Ok(raw) => State::Parsing { attempt, raw },
                        Err(failure) => State::RetryableFailure { attempt, failure },
                    }
                }

                State::Parsing { attempt, raw } => match parse_document(&raw) {
                    Ok(candidates) => State::Validating { attempt, candidates },
                    Err(failure) => State::RetryableFailure { attempt, failure },
                },

                State::Validating { attempt, candidates } => {
                    let batch = self.validate_candidates(candidates);
                    if batch.setups.is_empty() {
                        State::RetryableFailure {
                            attempt,
                            failure: ResponseFailure::NoValidSetups {
                                rejected: batch.rejected(),
                            },
                        }
                    } else {
                        State::Accepted { attempt, batch }
                    }
                }

                State::Accepted { attempt, batch } => {
                    info!(attempt, accepted = batch.setups.len(), rejected = batch.rejected(), "model response accepted");
                    return ValidationRun {
                        outcome: ValidationOutcome::Accepted {
                            batch,
                            attempts: attempt,
                        },
                        trace,
                    };
                }

                State::RetryableFailure { attempt, failure } => {
                    warn!(attempt, kind = failure.kind(), error = %failure, "attempt failed");
                    if attempt >= max_attempts {
                        State::TerminalFailure {
                            attempts: attempt,
                            failure,
                        }
                    } else {
                        State::Requesting { attempt: attempt + 1 }
                    }
                }

                State::TerminalFailure { attempts, failure } => {
                    warn!(attempts, kind = failure.kind(), "analysis unavailable");
                    return ValidationRun {
                        outcome: ValidationOutcome::Unavailable {
                            attempts,
                            last_failure: failure,
                        },
                        trace,
                    };
                }
            };
        }
    }

    fn temperature(&self, base: f64, attempt: u32) -> f64 {
        base + self.policy.temperature_step * f64::from(attempt.saturating_sub(1))
    }

    async fn call(&self, backend: &dyn ModelBackend, req: &ModelRequest) -> Result<String, ResponseFailure> {
        common::logger::annotate_span(None, Some(req.attempt));
        let started = Instant::now();
        let limit = self.policy.call_timeout;

        let result = common::logger::warn_if_slow(
            "model_call",
            limit / 2,
            tokio::time::timeout(limit, backend.send(req)),
        )
        .await;

        debug!(
            backend = backend.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model call finished"
        );

        match result {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => Err(ResponseFailure::Transport(e)),
            Err(_) => Err(ResponseFailure::Timeout {
                after_ms: limit.as_millis() as u64,
            }),
        }
    }

    fn validate_candidates(&self, candidates: Vec<Value>) -> ValidatedBatch {
        let mut batch = ValidatedBatch::default();
        for (index, value) in candidates.into_iter().enumerate() {
            match self.validate_setup(index, value) {
                Ok(setup) => batch.setups.push(setup),
                Err(v) => {
                    warn!(violation = %v, "setup rejected");
                    batch.violations.push(v);
                }
            }
        }
        batch
    }

    /// Checks one setup object field by field. Never repairs.
    pub fn validate_setup(&self, index: usize, value: Value) -> Result<TradeSetup, SchemaViolation> {
        let raw: RawSetup = serde_json::from_value(value).map_err(|e| SchemaViolation::Shape {
            index,
            reason: e.to_string(),
        })?;

        let asset = raw.asset.trim().to_string();
        if !self.assets.contains(&asset) {
            return Err(SchemaViolation::UnknownAsset { index, asset });
        }
        if !self.menu.contains(&raw.playbook) {
            return Err(SchemaViolation::UnknownPlaybook {
                index,
                playbook: raw.playbook,
            });
        }
        if !(0..=100).contains(&raw.confidence) {
            return Err(SchemaViolation::Confidence {
                index,
                value: raw.confidence,
            });
        }
        self.check_breakdown(index, raw.confidence, &raw.confidence_breakdown)?;

        check_price(index, "entry", raw.entry.price)?;
        check_price(index, "stop", raw.stop)?;
        if raw.take_profits.is_empty() || raw.take_profits.len() > 3 {
            return Err(SchemaViolation::TakeProfitCount {
                index,
                count: raw.take_profits.len(),
            });
        }
        for tp in &raw.take_profits {
            check_price(index, "take_profit", *tp)?;
        }

        let setup = TradeSetup {
            asset,
            direction: raw.direction,
            entry: raw.entry,
            stop: raw.stop,
            take_profits: raw.take_profits,
            playbook: raw.playbook,
            confidence: raw.confidence as u8,
            rationale: raw.rationale,
        };

        if !setup.stop_on_loss_side() {
            return Err(SchemaViolation::StopOnProfitSide {
                index,
                entry: setup.entry.price,
                stop: setup.stop,
            });
        }
        if setup.profit_side_targets().next().is_none() {
            return Err(SchemaViolation::NoProfitTarget { index });
        }
        Ok(setup)
    }

    fn check_breakdown(&self, index: usize, confidence: i64, breakdown: &[CriterionScore]) -> Result<(), SchemaViolation> {
        let expected = confidence::CRITERIA.len();
        if breakdown.len() != expected {
            return Err(SchemaViolation::BreakdownCount {
                index,
                expected,
                count: breakdown.len(),
            });
        }
        if let Some(c) = breakdown.iter().find(|c| !(0..=confidence::MAX_SCORE).contains(&c.score)) {
            return Err(SchemaViolation::BreakdownScore {
                index,
                criterion: c.criterion.clone(),
                score: c.score,
            });
        }

        let scores: Vec<i64> = breakdown.iter().map(|c| c.score).collect();
        if !self.weights.agrees(confidence, &scores) {
            return Err(SchemaViolation::ConfidenceMismatch {
                index,
                stated: confidence,
                weighted: self.weights.weighted(&scores),
            });
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawSetup {
    asset: String,
    direction: Direction,
    entry: EntryPlan,
    stop: f64,
    take_profits: Vec<f64>,
    playbook: String,
    confidence: i64,
    confidence_breakdown: Vec<CriterionScore>,
    #[serde(default)]
    rationale: String,
}

fn check_price(index: usize, field: &'static str, value: f64) -> Result<(), SchemaViolation> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SchemaViolation::BadPrice { index, field, value })
    }
}

/// Decodes `{"setups": [...]}`, tolerating a surrounding markdown code fence.
pub fn parse_document(raw: &str) -> Result<Vec<Value>, ResponseFailure> {
    let text = strip_code_fence(raw);
    let doc: Value = serde_json::from_str(text).map_err(|e| ResponseFailure::Malformed(e.to_string()))?;
    match doc.get("setups") {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(ResponseFailure::Malformed("`setups` is not a list".into())),
        None => Err(ResponseFailure::Malformed("missing `setups` list".into())),
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let t = raw.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    // drop the info string (e.g. `json`) on the opening line
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
