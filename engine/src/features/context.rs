use corelib::{PriceContext, Returns};

use super::Feature;
use crate::window::FeatureWindow;

/// Price, spread, returns and derivatives context at the end of a window.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketContext {
    pub last_price: f64,
    pub price: PriceContext,
    pub spread_bps: f64,
    pub returns: Returns,
    pub funding_rate: Option<f64>,
    pub open_interest: Option<f64>,
    pub open_interest_delta: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextExtractor;

/// Percentage change of the final mid versus `back` valid mids earlier.
fn pct_change(mids: &[f64], back: usize) -> Option<f64> {
    let n = mids.len();
    if n <= back {
        return None;
    }
    let then = mids[n - 1 - back];
    let now = mids[n - 1];
    (then > 0.0).then(|| (now - then) / then * 100.0)
}

impl Feature for ContextExtractor {
    type Output = Option<MarketContext>;

    fn name(&self) -> &'static str {
        "context"
    }

    fn derive(&self, window: &FeatureWindow) -> Option<MarketContext> {
        let last = window.iter().rev().find(|s| s.mid().is_some())?;
        let mid = last.mid()?;
        let mids = window.mids();

        let last_price = last
            .last_trade
            .as_ref()
            .map(|t| t.price)
            .filter(|p| p.is_finite() && *p > 0.0)
            .unwrap_or(mid);

        let first_oi = window.iter().find_map(|s| s.open_interest);
        let last_oi = window.iter().rev().find_map(|s| s.open_interest);

        Some(MarketContext {
            last_price,
            price: PriceContext {
                mid,
                mark: last.mark_price,
            },
            spread_bps: (last.best_ask.price - last.best_bid.price) / mid * 10_000.0,
            returns: Returns {
                pct_1: pct_change(&mids, 1),
                pct_5: pct_change(&mids, 5),
                pct_15: pct_change(&mids, 15),
            },
            funding_rate: last.funding_rate,
            open_interest: last_oi,
            open_interest_delta: first_oi.zip(last_oi).map(|(a, b)| b - a),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn returns_absent_when_window_is_short() {
        let snaps = (0..6).map(|i| snapshot(i, 100.0 + i as f64)).collect();
        let c = ContextExtractor.derive(&window(snaps)).unwrap();
        assert_eq!(c.price.mid, 105.0);
        assert!((c.returns.pct_1.unwrap() - (1.0 / 104.0 * 100.0)).abs() < 1e-9);
        assert_eq!(c.returns.pct_5, Some(5.0));
        assert_eq!(c.returns.pct_15, None);
    }

    #[test]
    fn spread_and_last_price() {
        let w = window(vec![with_trade(snapshot(0, 100.0), 100.25, 1.0)]);
        let c = ContextExtractor.derive(&w).unwrap();
        assert_eq!(c.spread_bps, 100.0);
        assert_eq!(c.last_price, 100.25);
    }

    #[test]
    fn open_interest_delta_spans_window() {
        let mut a = snapshot(0, 100.0);
        a.open_interest = Some(1_000.0);
        let mut b = snapshot(1, 100.0);
        b.open_interest = Some(1_250.0);
        b.funding_rate = Some(0.0001);
        let c = ContextExtractor.derive(&window(vec![a, b])).unwrap();
        assert_eq!(c.open_interest, Some(1_250.0));
        assert_eq!(c.open_interest_delta, Some(250.0));
        assert_eq!(c.funding_rate, Some(0.0001));
    }
}
