use std::cmp::Ordering;

use corelib::{RankedResult, TradeSetup};
use tracing::info;

pub const MAX_RANKED: usize = 3;

/// Orders validated setups and keeps the best three.
///
/// Confidence descending, then risk:reward descending, then asset symbol.
/// Every remaining field follows, so only identical setups compare equal
/// and the result never depends on input order.
#[derive(Debug, Clone, Copy)]
pub struct SetupRanker {
    limit: usize,
}

impl Default for SetupRanker {
    fn default() -> Self {
        Self { limit: MAX_RANKED }
    }
}

impl SetupRanker {
    pub fn rank(&self, mut setups: Vec<TradeSetup>, rejected: usize) -> RankedResult {
        let received = setups.len();
        setups.sort_by(compare);
        setups.truncate(self.limit);

        info!(received, kept = setups.len(), rejected, "setups ranked");

        RankedResult { setups, rejected }
    }
}

pub fn compare(a: &TradeSetup, b: &TradeSetup) -> Ordering {
    b.confidence
        .cmp(&a.confidence)
        .then_with(|| b.risk_reward().total_cmp(&a.risk_reward()))
        .then_with(|| a.asset.cmp(&b.asset))
        .then_with(|| a.playbook.cmp(&b.playbook))
        .then_with(|| a.direction.cmp(&b.direction))
        .then_with(|| a.entry.price.total_cmp(&b.entry.price))
        .then_with(|| a.stop.total_cmp(&b.stop))
        .then_with(|| cmp_prices(&a.take_profits, &b.take_profits))
        .then_with(|| a.entry.condition.cmp(&b.entry.condition))
        .then_with(|| a.rationale.cmp(&b.rationale))
}

/// Lexicographic over `total_cmp`; a prefix sorts first.
fn cmp_prices(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::{Direction, EntryPlan};

    fn setup(asset: &str, confidence: u8, stop: f64) -> TradeSetup {
        TradeSetup {
            asset: asset.into(),
            direction: Direction::Long,
            entry: EntryPlan {
                price: 100.0,
                condition: "break".into(),
            },
            stop,
            take_profits: vec![110.0],
            playbook: "breakout_long".into(),
            confidence,
            rationale: String::new(),
        }
    }

    fn assets(r: &RankedResult) -> Vec<(&str, u8)> {
        r.setups.iter().map(|s| (s.asset.as_str(), s.confidence)).collect()
    }

    #[test]
    fn confidence_dominates() {
        let r = SetupRanker::default().rank(
            vec![setup("A", 50, 99.0), setup("B", 80, 90.0), setup("C", 65, 95.0)],
            0,
        );
        assert_eq!(assets(&r), vec![("B", 80), ("C", 65), ("A", 50)]);
    }

    #[test]
    fn ties_break_on_risk_reward_then_asset() {
        // rr: stop 95 -> 2.0, stop 98 -> 5.0
        let r = SetupRanker::default().rank(
            vec![setup("ETH", 60, 95.0), setup("BTC", 60, 95.0), setup("SOL", 60, 98.0)],
            2,
        );
        assert_eq!(assets(&r), vec![("SOL", 60), ("BTC", 60), ("ETH", 60)]);
        assert_eq!(r.rejected, 2);
    }

    #[test]
    fn truncates_to_three_and_is_order_independent() {
        let input = vec![
            setup("A", 10, 95.0),
            setup("B", 20, 95.0),
            setup("C", 30, 95.0),
            setup("D", 40, 95.0),
        ];
        let mut reversed = input.clone();
        reversed.reverse();

        let a = SetupRanker::default().rank(input, 0);
        let b = SetupRanker::default().rank(reversed, 0);
        assert_eq!(a, b);
        assert_eq!(assets(&a), vec![("D", 40), ("C", 30), ("B", 20)]);
    }

    #[test]
    fn setups_differing_only_past_the_stop_keep_one_order() {
        let one_target = setup("BTC", 60, 95.0);
        let mut two_targets = setup("BTC", 60, 95.0);
        two_targets.take_profits = vec![110.0, 120.0];
        let mut other_condition = setup("BTC", 60, 95.0);
        other_condition.entry.condition = "retest".into();
        let mut other_rationale = setup("BTC", 60, 95.0);
        other_rationale.rationale = "volume".into();

        let input = vec![other_rationale, two_targets, other_condition, one_target];
        let mut reversed = input.clone();
        reversed.reverse();

        let forward = SetupRanker { limit: 4 }.rank(input, 0);
        let backward = SetupRanker { limit: 4 }.rank(reversed, 0);
        assert_eq!(forward, backward);
        assert_eq!(forward.setups[0].take_profits, vec![110.0]);
        assert_eq!(forward.setups[0].entry.condition, "break");
        assert!(forward.setups[0].rationale.is_empty());
        assert_eq!(forward.setups[1].rationale, "volume");
        assert_eq!(forward.setups[2].entry.condition, "retest");
        assert_eq!(forward.setups[3].take_profits, vec![110.0, 120.0]);
    }

    #[test]
    fn price_lists_compare_element_wise() {
        assert_eq!(cmp_prices(&[110.0], &[110.0, 120.0]), Ordering::Less);
        assert_eq!(cmp_prices(&[111.0], &[110.0, 120.0]), Ordering::Greater);
        assert_eq!(cmp_prices(&[110.0, 120.0], &[110.0, 120.0]), Ordering::Equal);
    }
}
