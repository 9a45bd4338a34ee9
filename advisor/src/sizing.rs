use corelib::{PositionPlan, RiskContext, TradeSetup};
use tracing::{Span, debug, field, instrument};

/// Share of equity usable as margin across a plan.
const MARGIN_BUDGET_FRACTION: f64 = 0.5;

/// Deterministic position plans from the run's risk context.
///
/// Applies:
/// - per-trade loss cap (`max_loss_per_trade_usd`)
/// - leverage within [min, max]; notional shrinks when max is not enough
/// - total-risk cap, scaling every plan down by the same factor
///
/// Plans annotate setups; the setups themselves are never modified.
#[derive(Debug, Clone, Copy)]
pub struct PositionSizer {
    risk: RiskContext,
}

impl PositionSizer {
    pub fn new(risk: RiskContext) -> Self {
        Self { risk }
    }

    #[instrument(
        target = "sizing",
        skip(self, setups),
        fields(setups = setups.len(), total_risk_usd = field::Empty)
    )]
    pub fn plan(&self, setups: &[TradeSetup]) -> Vec<PositionPlan> {
        let mut plans: Vec<PositionPlan> = setups.iter().map(|s| self.plan_one(s)).collect();

        let total: f64 = plans.iter().map(|p| p.max_loss_usd).sum();
        if total > self.risk.max_total_risk_usd && total > 0.0 {
            let scale = self.risk.max_total_risk_usd / total;
            debug!(total, cap = self.risk.max_total_risk_usd, scale, "scaling plans to total risk cap");
            for p in &mut plans {
                p.max_loss_usd *= scale;
                p.notional_usd *= scale;
                p.margin_used_usd *= scale;
                p.risk_pct_equity *= scale;
            }
        }

        Span::current().record("total_risk_usd", plans.iter().map(|p| p.max_loss_usd).sum::<f64>());
        plans
    }

    fn plan_one(&self, setup: &TradeSetup) -> PositionPlan {
        let equity = self.risk.equity_usd;
        let entry = setup.entry.price;
        let stop_fraction = if entry > 0.0 {
            setup.stop_distance() / entry
        } else {
            0.0
        };

        if stop_fraction <= 0.0 || equity <= 0.0 {
            return PositionPlan {
                risk_pct_equity: 0.0,
                max_loss_usd: 0.0,
                notional_usd: 0.0,
                leverage: self.risk.min_leverage.max(1),
                margin_used_usd: 0.0,
                stop_distance_pct: stop_fraction * 100.0,
            };
        }

        let min_lev = self.risk.min_leverage.max(1);
        let max_lev = self.risk.max_leverage.max(min_lev);
        let margin_budget = equity * MARGIN_BUDGET_FRACTION;

        let mut max_loss = self.risk.max_loss_per_trade_usd.max(0.0);
        let mut notional = max_loss / stop_fraction;

        let needed = notional / margin_budget;
        if needed > f64::from(max_lev) {
            notional = margin_budget * f64::from(max_lev);
            max_loss = notional * stop_fraction;
            debug!(asset = %setup.asset, needed, max_lev, "leverage capped, notional reduced");
        }
        // tolerance keeps an exact fit from rounding up a whole step
        let leverage = ((needed - 1e-9).ceil().max(0.0) as u32).clamp(min_lev, max_lev);

        PositionPlan {
            risk_pct_equity: max_loss / equity * 100.0,
            max_loss_usd: max_loss,
            notional_usd: notional,
            leverage,
            margin_used_usd: notional / f64::from(leverage),
            stop_distance_pct: stop_fraction * 100.0,
        }
    }
}
