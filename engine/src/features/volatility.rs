use corelib::{VolatilityMetric, VolatilityRegime};

use super::Feature;
use crate::config::VolatilityConfig;
use crate::window::FeatureWindow;

/// Realized volatility of log mid returns plus a short/long regime ratio.
#[derive(Debug, Clone, Default)]
pub struct VolatilityEstimator {
    config: VolatilityConfig,
}

impl VolatilityEstimator {
    pub fn new(config: VolatilityConfig) -> Self {
        Self { config }
    }

    fn annualized(&self, returns: &[f64]) -> f64 {
        population_std(returns) * self.config.periods_per_year.sqrt()
    }

    fn regime(&self, ratio: f64) -> VolatilityRegime {
        if ratio < self.config.compressed_below {
            VolatilityRegime::Compressed
        } else if ratio > self.config.expanding_above {
            VolatilityRegime::Expanding
        } else {
            VolatilityRegime::Normal
        }
    }
}

pub fn log_returns(mids: &[f64]) -> Vec<f64> {
    mids.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

fn population_std(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    var.max(0.0).sqrt()
}

impl Feature for VolatilityEstimator {
    type Output = Option<VolatilityMetric>;

    fn name(&self) -> &'static str {
        "volatility"
    }

    fn derive(&self, window: &FeatureWindow) -> Option<VolatilityMetric> {
        let mids = window.mids();
        if mids.len() < super::MIN_SNAPSHOTS {
            return None;
        }

        let returns = log_returns(&mids);
        let realized = self.annualized(&returns);

        let short_start = returns.len().saturating_sub(self.config.short_lookback);
        let short_realized = self.annualized(&returns[short_start..]);

        let ratio = if realized > 0.0 {
            short_realized / realized
        } else {
            0.0
        };

        Some(VolatilityMetric {
            realized,
            short_realized,
            ratio,
            regime: self.regime(ratio),
            returns_used: returns.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn estimator(short_lookback: usize) -> VolatilityEstimator {
        VolatilityEstimator::new(VolatilityConfig {
            short_lookback,
            periods_per_year: 1.0,
            ..VolatilityConfig::default()
        })
    }

    #[test]
    fn single_mid_yields_none() {
        assert!(estimator(2).derive(&window(vec![snapshot(0, 100.0)])).is_none());
    }

    #[test]
    fn one_return_has_zero_dispersion() {
        let m = estimator(2)
            .derive(&window(vec![snapshot(0, 100.0), snapshot(1, 110.0)]))
            .unwrap();
        assert_eq!(m.realized, 0.0);
        assert_eq!(m.returns_used, 1);
        assert_eq!(m.regime, VolatilityRegime::Compressed);
    }

    #[test]
    fn quiet_then_busy_window_is_expanding() {
        let mids = [100.0, 100.01, 100.0, 100.01, 100.0, 103.0, 99.0, 104.0];
        let snaps = mids.iter().enumerate().map(|(i, m)| snapshot(i as u64, *m)).collect();
        let m = estimator(3).derive(&window(snaps)).unwrap();
        assert!(m.short_realized > m.realized);
        assert!(m.ratio > 1.25);
        assert_eq!(m.regime, VolatilityRegime::Expanding);
    }

    #[test]
    fn busy_then_quiet_window_is_compressed() {
        let mids = [100.0, 104.0, 98.0, 103.0, 100.0, 100.01, 100.0, 100.01];
        let snaps = mids.iter().enumerate().map(|(i, m)| snapshot(i as u64, *m)).collect();
        let m = estimator(3).derive(&window(snaps)).unwrap();
        assert_eq!(m.regime, VolatilityRegime::Compressed);
    }

    #[test]
    fn annualization_scales_by_sqrt_periods() {
        let snaps = vec![snapshot(0, 100.0), snapshot(1, 101.0), snapshot(2, 100.0)];
        let base = estimator(10).derive(&window(snaps.clone())).unwrap();
        let scaled = VolatilityEstimator::new(VolatilityConfig {
            periods_per_year: 4.0,
            ..VolatilityConfig::default()
        })
        .derive(&window(snaps))
        .unwrap();
        assert!((scaled.realized - 2.0 * base.realized).abs() < 1e-12);
    }
}
