//! Weighted confidence over a fixed list of scoring criteria.
//!
//! Every setup carries one 0..=10 score per criterion. The stated confidence
//! must sit within [`TOLERANCE`] of the weighted sum of those scores.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Scoring criteria, in the order the model must report them.
pub const CRITERIA: [&str; 10] = [
    "regime alignment with playbook",
    "level proximity and quality",
    "volatility suits targets and stop",
    "order-book health",
    "order-book signal",
    "flow confirmation",
    "funding and open interest not against the trade",
    "timeframe alignment",
    "risk/reward quality",
    "no obvious landmines",
];

pub const MAX_SCORE: i64 = 10;

/// Largest accepted gap between stated confidence and the weighted sum.
pub const TOLERANCE: i64 = 2;

const DEFAULT_WEIGHTS: [f64; CRITERIA.len()] = [2.0, 1.5, 1.5, 1.5, 1.0, 0.5, 0.5, 0.25, 0.25, 1.0];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeightsError {
    #[error("expected {expected} weights, got {0}", expected = CRITERIA.len())]
    Count(usize),

    #[error("weight {0:?} is not a finite non-negative number")]
    Invalid(String),
}

/// Per-criterion multipliers applied to the breakdown scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceWeights([f64; CRITERIA.len()]);

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self(DEFAULT_WEIGHTS)
    }
}

impl ConfidenceWeights {
    pub fn new(weights: [f64; CRITERIA.len()]) -> Result<Self, WeightsError> {
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(WeightsError::Invalid(bad.to_string()));
        }
        Ok(Self(weights))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Rounded weighted sum; ties go to the even integer.
    pub fn weighted(&self, scores: &[i64]) -> i64 {
        let sum: f64 = scores.iter().zip(self.0.iter()).map(|(s, w)| *s as f64 * w).sum();
        sum.round_ties_even() as i64
    }

    pub fn agrees(&self, confidence: i64, scores: &[i64]) -> bool {
        (confidence - self.weighted(scores)).abs() <= TOLERANCE
    }
}

impl FromStr for ConfidenceWeights {
    type Err = WeightsError;

    /// Comma-separated list, one weight per criterion.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = s
            .split(',')
            .map(str::trim)
            .map(|w| w.parse::<f64>().map_err(|_| WeightsError::Invalid(w.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        let weights: [f64; CRITERIA.len()] = parsed
            .as_slice()
            .try_into()
            .map_err(|_| WeightsError::Count(parsed.len()))?;
        Self::new(weights)
    }
}

impl fmt::Display for ConfidenceWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, w) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{w}")?;
        }
        Ok(())
    }
}

/// One entry of a setup's `confidence_breakdown`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CriterionScore {
    #[serde(default)]
    pub criterion: String,
    pub score: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_top_out_at_ninety() {
        let w = ConfidenceWeights::default();
        assert_eq!(w.weighted(&[10; 10]), 90);
        assert_eq!(w.weighted(&[0; 10]), 0);
    }

    #[test]
    fn weighted_sum_follows_each_weight() {
        let w = ConfidenceWeights::default();
        // 2.0*5 + 1.5*4*3 + 1.0*6 + 0.5*2*2 + 0.25*1*2 + 1.0*8 = 44.5 -> 44
        assert_eq!(w.weighted(&[5, 4, 4, 4, 6, 2, 2, 1, 1, 8]), 44);
        assert!(w.agrees(46, &[5, 4, 4, 4, 6, 2, 2, 1, 1, 8]));
        assert!(!w.agrees(47, &[5, 4, 4, 4, 6, 2, 2, 1, 1, 8]));
    }

    #[test]
    fn parses_comma_separated_weights() {
        let w: ConfidenceWeights = "1, 1, 1, 1, 1, 1, 1, 1, 1, 1".parse().unwrap();
        assert_eq!(w.weighted(&[7; 10]), 70);
        assert_eq!(w.to_string().parse::<ConfidenceWeights>().unwrap(), w);
    }

    #[test]
    fn rejects_bad_weight_lists() {
        assert_eq!("1,2,3".parse::<ConfidenceWeights>(), Err(WeightsError::Count(3)));
        assert!(matches!(
            "1,1,1,1,1,1,1,1,1,x".parse::<ConfidenceWeights>(),
            Err(WeightsError::Invalid(_))
        ));
        assert!(matches!(
            "1,1,1,1,1,1,1,1,1,-1".parse::<ConfidenceWeights>(),
            Err(WeightsError::Invalid(_))
        ));
    }
}
