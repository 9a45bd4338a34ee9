use serde::{Deserialize, Serialize};

use super::candle::CandleSet;

/// One resting price level of the order book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

impl BookLevel {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

/// Aggressor side of a trade as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LastTrade {
    pub price: f64,
    pub size: f64,
    pub side: Option<TradeSide>,
}

/// One observation of one asset at one instant.
///
/// Snapshots are written once and never mutated. For a given asset,
/// `ts_ms` is strictly increasing in storage order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Milliseconds since the Unix epoch, UTC.
    pub ts_ms: u64,
    pub asset: String,

    pub best_bid: BookLevel,
    pub best_ask: BookLevel,

    /// Bid ladder, best (highest) price first.
    pub bids: Vec<BookLevel>,
    /// Ask ladder, best (lowest) price first.
    pub asks: Vec<BookLevel>,

    pub last_trade: Option<LastTrade>,

    /// Traded base volume since the start of the exchange's day session.
    pub cumulative_volume: f64,

    pub mark_price: Option<f64>,
    pub funding_rate: Option<f64>,
    pub open_interest: Option<f64>,

    /// Exchange reference price from 24 hours earlier.
    #[serde(default)]
    pub prev_day_price: Option<f64>,

    #[serde(default)]
    pub candles: CandleSet,
}

impl Snapshot {
    /// Average of best bid and best ask, if both sides are sane.
    pub fn mid(&self) -> Option<f64> {
        let bid = self.best_bid.price;
        let ask = self.best_ask.price;
        if bid > 0.0 && ask > 0.0 && bid.is_finite() && ask.is_finite() {
            Some((bid + ask) / 2.0)
        } else {
            None
        }
    }

    /// Drops ladder entries beyond `depth` on each side.
    pub fn truncate_depth(&mut self, depth: usize) {
        self.bids.truncate(depth);
        self.asks.truncate(depth);
    }

    pub fn bid_volume(&self) -> f64 {
        self.bids.iter().map(|l| l.size.max(0.0)).sum()
    }

    pub fn ask_volume(&self) -> f64 {
        self.asks.iter().map(|l| l.size.max(0.0)).sum()
    }
}
