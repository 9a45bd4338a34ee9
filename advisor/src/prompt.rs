use corelib::{MarketState, PlaybookMenu};
use serde::{Deserialize, Serialize};

use crate::confidence::{self, ConfidenceWeights};

/// Sampling knobs. Retries may raise the temperature; nothing else varies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 4_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub system: String,
    pub user: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// 1-based attempt number within one validation run.
    pub attempt: u32,
}

impl ModelRequest {
    /// Same content, different attempt and temperature.
    pub fn for_attempt(&self, attempt: u32, temperature: f64) -> Self {
        Self {
            attempt,
            temperature,
            ..self.clone()
        }
    }
}

const MAX_SETUPS: usize = 3;

/// Renders a Market State and the playbook menu into a model request.
///
/// Output depends only on the inputs. The Market State is embedded exactly
/// as [`MarketState::to_canonical_json`] renders it.
#[derive(Debug, Clone, Default)]
pub struct PromptComposer {
    sampling: SamplingParams,
    weights: ConfidenceWeights,
}

impl PromptComposer {
    pub fn new(sampling: SamplingParams) -> Self {
        Self {
            sampling,
            weights: ConfidenceWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: ConfidenceWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn compose(&self, state: &MarketState, menu: &PlaybookMenu) -> serde_json::Result<ModelRequest> {
        let document = state.to_canonical_json()?;
        Ok(ModelRequest {
            system: system_prompt(menu, &self.weights),
            user: format!(
                "Market State (schema v{}):\n\n{document}\n\nReturn your trade plan as a single JSON object.",
                state.schema_version
            ),
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
            attempt: 1,
        })
    }
}

fn system_prompt(menu: &PlaybookMenu, weights: &ConfidenceWeights) -> String {
    let mut criteria = String::new();
    for (i, (name, w)) in confidence::CRITERIA.iter().zip(weights.as_slice()).enumerate() {
        criteria.push_str(&format!("{}. {name} (weight {w})\n", i + 1));
    }

    let mut playbooks = String::new();
    for p in menu.entries() {
        if p.description.is_empty() {
            playbooks.push_str(&format!("- {}\n", p.tag));
        } else {
            playbooks.push_str(&format!("- {}: {}\n", p.tag, p.description));
        }
    }

    format!(
        r#"You analyze perpetual futures markets for a short-term discretionary trader.

You receive a Market State document: per asset, support and resistance levels
with strengths, realized volatility and its regime, order-book imbalance,
trade-flow bias, order-book depth near the touch, price context with ATR,
VWAP and prior-day levels, and funding. Assets listed under
insufficient_data have no usable features; never propose setups for them.

Allowed playbooks (use the tag exactly):
{playbooks}
Rules:
- Propose at most {MAX_SETUPS} setups. Propose none you would not take.
- Longs keep the stop below entry, shorts keep it above.
- Give one to three take-profit prices; the first one on the profit side sets the reward.
- Use only prices supported by the levels and context in the Market State.
- The position size is computed separately from risk_context; do not size trades.
- Score every criterion below from 0 to 10, in this order, as confidence_breakdown.
- confidence is the weighted sum of those scores, rounded to an integer.

Confidence criteria:
{criteria}
Respond with JSON only, no commentary, in exactly this shape:
{{
  "setups": [
    {{
      "asset": "BTC",
      "direction": "long | short",
      "entry": {{ "price": 0.0, "condition": "what must happen before entering" }},
      "stop": 0.0,
      "take_profits": [0.0],
      "playbook": "one of the tags above",
      "confidence": 0,
      "confidence_breakdown": [{{ "criterion": "regime alignment with playbook", "score": 0 }}],
      "rationale": "one or two sentences"
    }}
  ]
}}"#
    )
}
