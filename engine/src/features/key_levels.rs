//! Candle-derived reference prices: ATR, VWAP, session and prior-day range.
//!
//! Only the newest snapshot carrying candles is read; older bar sets are
//! subsets of it.

use corelib::{Candle, KeyLevels};

use super::Feature;
use crate::window::FeatureWindow;

/// Bars averaged for the true-range estimate.
pub const ATR_PERIOD: usize = 14;
/// Fewer 15-minute bars than this yield no ATR.
pub const ATR_MIN_BARS: usize = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct KeyLevelExtractor;

fn sane(bar: &Candle) -> bool {
    bar.high.is_finite() && bar.low.is_finite() && bar.low > 0.0 && bar.high >= bar.low
}

/// Mean high-low range of the last [`ATR_PERIOD`] bars.
pub fn average_range(bars: &[Candle]) -> Option<f64> {
    if bars.len() < ATR_MIN_BARS {
        return None;
    }
    let start = bars.len().saturating_sub(ATR_PERIOD);
    let ranges: Vec<f64> = bars[start..].iter().filter(|b| sane(b)).map(|b| b.high - b.low).collect();
    if ranges.is_empty() {
        return None;
    }
    Some(ranges.iter().sum::<f64>() / ranges.len() as f64)
}

/// Typical price weighted by bar volume. Bars without volume are skipped.
pub fn vwap(bars: &[Candle]) -> Option<f64> {
    let (weighted, volume) = bars
        .iter()
        .filter(|b| sane(b) && b.close > 0.0 && b.volume > 0.0 && b.volume.is_finite())
        .fold((0.0, 0.0), |(pv, v), b| (pv + b.typical_price() * b.volume, v + b.volume));
    (volume > 0.0).then(|| weighted / volume)
}

impl Feature for KeyLevelExtractor {
    type Output = KeyLevels;

    fn name(&self) -> &'static str {
        "key_levels"
    }

    fn derive(&self, window: &FeatureWindow) -> KeyLevels {
        let prev_day_price = window
            .iter()
            .rev()
            .find_map(|s| s.prev_day_price)
            .filter(|p| p.is_finite() && *p > 0.0);

        let Some(candles) = window.iter().rev().map(|s| &s.candles).find(|c| !c.is_empty()) else {
            return KeyLevels {
                prev_day_price,
                ..KeyLevels::default()
            };
        };

        let daily: Vec<&Candle> = candles.d1.iter().filter(|b| sane(b)).collect();
        let (day_high, day_low) = match daily.last() {
            Some(today) => (Some(today.high), Some(today.low)),
            None => {
                let intraday = candles.m15.iter().filter(|b| sane(b));
                (
                    intraday.clone().map(|b| b.high).reduce(f64::max),
                    intraday.map(|b| b.low).reduce(f64::min),
                )
            }
        };
        let prior = daily.len().checked_sub(2).map(|i| daily[i]);

        KeyLevels {
            atr_15m: average_range(&candles.m15),
            vwap: vwap(&candles.m15),
            day_high,
            day_low,
            prior_day_high: prior.map(|b| b.high),
            prior_day_low: prior.map(|b| b.low),
            prior_day_close: prior.map(|b| b.close).filter(|c| c.is_finite() && *c > 0.0),
            prev_day_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn bar(open_ms: u64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            open_ms,
            open: low,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn atr_needs_five_bars_and_uses_the_last_fourteen() {
        let four: Vec<Candle> = (0..4).map(|i| bar(i, 102.0, 100.0, 101.0, 1.0)).collect();
        assert_eq!(average_range(&four), None);

        // six wide bars followed by fourteen bars two wide
        let mut bars: Vec<Candle> = (0..6).map(|i| bar(i, 110.0, 100.0, 105.0, 1.0)).collect();
        bars.extend((6..20).map(|i| bar(i, 102.0, 100.0, 101.0, 1.0)));
        assert_eq!(average_range(&bars), Some(2.0));
    }

    #[test]
    fn vwap_weights_typical_price_by_volume() {
        let bars = vec![
            bar(0, 103.0, 97.0, 100.0, 1.0),  // typical 100
            bar(1, 112.0, 108.0, 110.0, 3.0), // typical 110
            bar(2, 500.0, 400.0, 450.0, 0.0), // no volume
        ];
        assert_eq!(vwap(&bars), Some(107.5));
        assert_eq!(vwap(&[]), None);
    }

    #[test]
    fn daily_bars_give_session_and_prior_day() {
        let mut s = snapshot(0, 100.0);
        s.candles.d1 = vec![
            bar(0, 96.0, 90.0, 95.0, 10.0),
            bar(1, 104.0, 98.0, 103.0, 10.0),
            bar(2, 101.0, 99.0, 100.0, 4.0),
        ];
        s.candles.m15 = (0..6).map(|i| bar(i, 101.0, 99.5, 100.0, 2.0)).collect();
        s.prev_day_price = Some(97.5);

        let k = KeyLevelExtractor.derive(&window(vec![s]));
        assert_eq!((k.day_high, k.day_low), (Some(101.0), Some(99.0)));
        assert_eq!(
            (k.prior_day_high, k.prior_day_low, k.prior_day_close),
            (Some(104.0), Some(98.0), Some(103.0))
        );
        assert_eq!(k.atr_15m, Some(1.5));
        assert!((k.vwap.unwrap() - 300.5 / 3.0).abs() < 1e-9);
        assert_eq!(k.prev_day_price, Some(97.5));
    }

    #[test]
    fn intraday_bars_stand_in_for_a_missing_daily_set() {
        let mut s = snapshot(0, 100.0);
        s.candles.m15 = vec![bar(0, 101.0, 99.0, 100.0, 1.0), bar(1, 103.0, 100.0, 102.0, 1.0)];

        let k = KeyLevelExtractor.derive(&window(vec![s]));
        assert_eq!((k.day_high, k.day_low), (Some(103.0), Some(99.0)));
        assert_eq!(k.prior_day_high, None);
        assert_eq!(k.atr_15m, None);
    }

    #[test]
    fn falls_back_to_the_last_snapshot_with_candles() {
        let mut older = snapshot(0, 100.0);
        older.candles.m15 = vec![bar(0, 150.0, 50.0, 100.0, 1.0)];
        older.prev_day_price = Some(90.0);
        let newer = snapshot(1, 100.0);

        let k = KeyLevelExtractor.derive(&window(vec![older, newer]));
        assert_eq!(k.day_high, Some(150.0));
        assert_eq!(k.prev_day_price, Some(90.0));
    }

    #[test]
    fn nothing_collected_means_all_none() {
        let k = KeyLevelExtractor.derive(&window(vec![snapshot(0, 100.0)]));
        assert_eq!(k, KeyLevels::default());
    }
}
