use corelib::{BookDepth, BookLevel};

use super::{Feature, normalized_difference};
use crate::window::FeatureWindow;

/// Band around the touch counted as near depth, in percent.
pub const NEAR_PCT: f64 = 0.1;
/// Band around the touch counted as wide depth, in percent.
pub const WIDE_PCT: f64 = 0.5;

/// Resting notional within fixed percentage bands of each side's best
/// price, read from the last snapshot with a valid mid.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthGauge;

/// Sum of `price × size` over ladder entries within `pct` percent of `touch`.
fn notional_within(ladder: &[BookLevel], touch: f64, pct: f64) -> f64 {
    if !(touch > 0.0 && touch.is_finite()) {
        return 0.0;
    }
    ladder
        .iter()
        .filter(|l| l.price.is_finite() && l.size.is_finite() && l.size > 0.0)
        .filter(|l| (l.price - touch).abs() / touch <= pct / 100.0)
        .map(|l| l.price * l.size)
        .sum()
}

impl Feature for DepthGauge {
    type Output = Option<BookDepth>;

    fn name(&self) -> &'static str {
        "depth"
    }

    fn derive(&self, window: &FeatureWindow) -> Option<BookDepth> {
        let last = window.iter().rev().find(|s| s.mid().is_some())?;
        let (bid, ask) = (last.best_bid.price, last.best_ask.price);

        let bid_notional_near = notional_within(&last.bids, bid, NEAR_PCT);
        let ask_notional_near = notional_within(&last.asks, ask, NEAR_PCT);

        Some(BookDepth {
            bid_notional_near,
            ask_notional_near,
            bid_notional_wide: notional_within(&last.bids, bid, WIDE_PCT),
            ask_notional_wide: notional_within(&last.asks, ask, WIDE_PCT),
            near_imbalance: normalized_difference(bid_notional_near, ask_notional_near),
        })
    }
}
