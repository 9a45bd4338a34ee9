use serde::{Deserialize, Serialize};

/// Candle widths collected alongside each snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl CandleInterval {
    pub const ALL: [CandleInterval; 4] = [Self::M15, Self::H1, Self::H4, Self::D1];

    /// Exchange spelling of the interval.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
        }
    }

    pub fn duration_ms(&self) -> u64 {
        const MINUTE: u64 = 60_000;
        match self {
            Self::M15 => 15 * MINUTE,
            Self::H1 => 60 * MINUTE,
            Self::H4 => 240 * MINUTE,
            Self::D1 => 1_440 * MINUTE,
        }
    }

    /// Bars requested per snapshot.
    pub fn lookback(&self) -> usize {
        match self {
            Self::M15 => 20,
            Self::H1 => 24,
            Self::H4 => 30,
            Self::D1 => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, milliseconds since the Unix epoch.
    pub open_ms: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// `(high + low + close) / 3`.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Recent bars per interval, oldest first. A set that could not be fetched
/// stays empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleSet {
    #[serde(default)]
    pub m15: Vec<Candle>,
    #[serde(default)]
    pub h1: Vec<Candle>,
    #[serde(default)]
    pub h4: Vec<Candle>,
    #[serde(default)]
    pub d1: Vec<Candle>,
}

impl CandleSet {
    pub fn get(&self, interval: CandleInterval) -> &[Candle] {
        match interval {
            CandleInterval::M15 => &self.m15,
            CandleInterval::H1 => &self.h1,
            CandleInterval::H4 => &self.h4,
            CandleInterval::D1 => &self.d1,
        }
    }

    pub fn set(&mut self, interval: CandleInterval, candles: Vec<Candle>) {
        match interval {
            CandleInterval::M15 => self.m15 = candles,
            CandleInterval::H1 => self.h1 = candles,
            CandleInterval::H4 => self.h4 = candles,
            CandleInterval::D1 => self.d1 = candles,
        }
    }

    pub fn is_empty(&self) -> bool {
        CandleInterval::ALL.iter().all(|i| self.get(*i).is_empty())
    }
}
