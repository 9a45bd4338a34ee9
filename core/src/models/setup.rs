use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short: the sign of a profitable price move.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPlan {
    pub price: f64,
    pub condition: String,
}

/// A validated trade proposal.
///
/// Only the advisor's validator constructs these from model output; a value
/// of this type always has its stop on the loss side of entry, at least one
/// take-profit on the profit side, and a playbook tag from the menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSetup {
    pub asset: String,
    pub direction: Direction,
    pub entry: EntryPlan,
    pub stop: f64,
    pub take_profits: Vec<f64>,
    pub playbook: String,
    /// 0..=100
    pub confidence: u8,
    pub rationale: String,
}

impl TradeSetup {
    /// Signed distance from entry in the profitable direction.
    fn favorable_move(&self, price: f64) -> f64 {
        (price - self.entry.price) * self.direction.sign()
    }

    pub fn stop_on_loss_side(&self) -> bool {
        self.favorable_move(self.stop) < 0.0
    }

    /// Take-profits that lie on the profit side of entry, in listed order.
    pub fn profit_side_targets(&self) -> impl Iterator<Item = f64> + '_ {
        self.take_profits
            .iter()
            .copied()
            .filter(|tp| self.favorable_move(*tp) > 0.0)
    }

    pub fn stop_distance(&self) -> f64 {
        (self.entry.price - self.stop).abs()
    }

    /// Reward to the first profit-side target over stop distance.
    /// Zero when the setup has no usable target or no risk distance.
    pub fn risk_reward(&self) -> f64 {
        let risk = self.stop_distance();
        match self.profit_side_targets().next() {
            Some(tp) if risk > 0.0 => self.favorable_move(tp) / risk,
            _ => 0.0,
        }
    }
}

/// Deterministic sizing derived from the risk context for one ranked setup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionPlan {
    pub risk_pct_equity: f64,
    pub max_loss_usd: f64,
    pub notional_usd: f64,
    pub leverage: u32,
    pub margin_used_usd: f64,
    pub stop_distance_pct: f64,
}

/// Up to three setups in rank order plus the number dropped by validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub setups: Vec<TradeSetup>,
    pub rejected: usize,
}
