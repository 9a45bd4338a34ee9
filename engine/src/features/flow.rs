use corelib::{FlowMetric, Snapshot, TradeSide};

use super::{normalized_difference, Feature};
use crate::window::FeatureWindow;

/// Book imbalance at the final snapshot plus trade-flow bias over the window.
///
/// Volume traded between two snapshots is the positive change in the
/// exchange's cumulative volume. Its side is inferred from the last trade
/// price against the mid prevailing before the trade.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowMeter;

fn infer_side(prev: &Snapshot, cur: &Snapshot) -> Option<TradeSide> {
    let trade = cur.last_trade.as_ref()?;
    let mid = prev.mid().or_else(|| cur.mid())?;
    if trade.price > mid {
        Some(TradeSide::Buy)
    } else if trade.price < mid {
        Some(TradeSide::Sell)
    } else {
        None
    }
}

impl Feature for FlowMeter {
    type Output = Option<FlowMetric>;

    fn name(&self) -> &'static str {
        "flow"
    }

    fn derive(&self, window: &FeatureWindow) -> Option<FlowMetric> {
        if window.mids().len() < super::MIN_SNAPSHOTS {
            return None;
        }
        let last = window.last()?;

        let (mut buy, mut sell, mut total) = (0.0, 0.0, 0.0);
        let snapshots: Vec<&Snapshot> = window.iter().collect();
        for pair in snapshots.windows(2) {
            let (prev, cur) = (pair[0], pair[1]);
            let delta = cur.cumulative_volume - prev.cumulative_volume;
            // negative delta is a session reset
            if !(delta.is_finite() && delta > 0.0) {
                continue;
            }
            total += delta;
            match infer_side(prev, cur) {
                Some(TradeSide::Buy) => buy += delta,
                Some(TradeSide::Sell) => sell += delta,
                None => {}
            }
        }

        let trade_flow_bias = if total > 0.0 {
            ((buy - sell) / total).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        Some(FlowMetric {
            book_imbalance: normalized_difference(last.bid_volume(), last.ask_volume()),
            trade_flow_bias,
            buy_volume: buy,
            sell_volume: sell,
            total_volume: total,
        })
    }
}
