use std::time::Duration;

use async_trait::async_trait;
use corelib::{BookLevel, Candle, CandleInterval, CandleSet, LastTrade, Snapshot, TradeSide};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::types::{AssetContext, CandleRequest, InfoRequest, L2Book, Level, Meta, RecentTrade, WireCandle};
use crate::{FeedError, MarketFeed};

pub const DEFAULT_INFO_URL: &str = "https://api.hyperliquid.xyz/info";

/// Read-only client for the Hyperliquid info endpoint.
#[derive(Clone)]
pub struct HyperliquidFeed {
    http: Client,
    url: String,
    depth: usize,
}

impl HyperliquidFeed {
    pub fn new(url: String, depth: usize) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, url, depth })
    }

    async fn post<T: DeserializeOwned>(&self, request: &InfoRequest<'_>) -> Result<T, FeedError> {
        let resp = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.json().await?)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn asset_context(&self, asset: &str) -> Result<AssetContext, FeedError> {
        let (meta, contexts): (Meta, Vec<AssetContext>) = self.post(&InfoRequest::MetaAndAssetCtxs).await?;

        let index = meta
            .universe
            .iter()
            .position(|m| m.name == asset && m.is_delisted != Some(true))
            .ok_or_else(|| FeedError::UnknownAsset(asset.to_string()))?;

        contexts
            .into_iter()
            .nth(index)
            .ok_or_else(|| FeedError::InvalidResponse(format!("no asset context at index {index}")))
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn l2_book(&self, asset: &str) -> Result<L2Book, FeedError> {
        self.post(&InfoRequest::L2Book { coin: asset }).await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn recent_trades(&self, asset: &str) -> Result<Vec<RecentTrade>, FeedError> {
        self.post(&InfoRequest::RecentTrades { coin: asset }).await
    }

    /// The last `interval.lookback()` bars ending at `end_ms`, oldest first.
    #[instrument(skip(self), level = "debug")]
    pub async fn candle_snapshot(
        &self,
        asset: &str,
        interval: CandleInterval,
        end_ms: u64,
    ) -> Result<Vec<Candle>, FeedError> {
        let lookback = interval.lookback();
        let request = InfoRequest::CandleSnapshot {
            req: CandleRequest {
                coin: asset,
                interval: interval.as_str(),
                start_time: end_ms.saturating_sub(interval.duration_ms() * lookback as u64),
                end_time: end_ms,
            },
        };
        let wire: Vec<WireCandle> = self.post(&request).await?;

        let mut candles = wire.iter().map(parse_candle).collect::<Result<Vec<_>, _>>()?;
        candles.sort_by_key(|c| c.open_ms);
        let excess = candles.len().saturating_sub(lookback);
        candles.drain(..excess);
        Ok(candles)
    }

    /// Bars for every interval. An interval that cannot be fetched stays
    /// empty; candles never fail a snapshot.
    pub async fn candles(&self, asset: &str, end_ms: u64) -> CandleSet {
        let mut set = CandleSet::default();
        for interval in CandleInterval::ALL {
            match self.candle_snapshot(asset, interval, end_ms).await {
                Ok(bars) => set.set(interval, bars),
                Err(e) => warn!(asset, interval = interval.as_str(), error = %e, "candle fetch failed"),
            }
        }
        set
    }

    /// Combines the three info responses into one snapshot. Candles are
    /// attached separately.
    pub fn assemble(
        &self,
        asset: &str,
        context: &AssetContext,
        book: &L2Book,
        trades: &[RecentTrade],
    ) -> Result<Snapshot, FeedError> {
        let [bids, asks] = book.levels.as_slice() else {
            return Err(FeedError::InvalidResponse(format!(
                "l2Book for {asset} has {} sides",
                book.levels.len()
            )));
        };

        let bids = parse_ladder(bids, self.depth)?;
        let asks = parse_ladder(asks, self.depth)?;
        let empty = BookLevel::new(0.0, 0.0);

        let last_trade = trades
            .iter()
            .max_by_key(|t| t.time)
            .map(parse_trade)
            .transpose()?;

        let cumulative_volume = match &context.day_base_vlm {
            Some(v) => parse_decimal("dayBaseVlm", v)?,
            None => 0.0,
        };
        let prev_day_price = context
            .prev_day_px
            .as_deref()
            .map(|v| parse_decimal("prevDayPx", v))
            .transpose()?;

        Ok(Snapshot {
            ts_ms: book.time,
            asset: asset.to_string(),
            best_bid: bids.first().copied().unwrap_or(empty),
            best_ask: asks.first().copied().unwrap_or(empty),
            bids,
            asks,
            last_trade,
            cumulative_volume,
            mark_price: Some(parse_decimal("markPx", &context.mark_px)?),
            funding_rate: Some(parse_decimal("funding", &context.funding)?),
            open_interest: Some(parse_decimal("openInterest", &context.open_interest)?),
            prev_day_price,
            candles: CandleSet::default(),
        })
    }
}

#[async_trait]
impl MarketFeed for HyperliquidFeed {
    #[instrument(skip(self), fields(asset = %asset), level = "debug")]
    async fn fetch_snapshot(&self, asset: &str) -> Result<Snapshot, FeedError> {
        let context = self.asset_context(asset).await?;
        let book = self.l2_book(asset).await?;
        let trades = self.recent_trades(asset).await?;

        let mut snapshot = self.assemble(asset, &context, &book, &trades)?;
        snapshot.candles = self.candles(asset, snapshot.ts_ms).await;

        debug!(
            ts_ms = snapshot.ts_ms,
            bid = snapshot.best_bid.price,
            ask = snapshot.best_ask.price,
            levels = snapshot.bids.len() + snapshot.asks.len(),
            bars_15m = snapshot.candles.m15.len(),
            "hyperliquid snapshot fetched"
        );

        Ok(snapshot)
    }
}

/// Parses an exchange decimal string. Anything that is not a finite number fails.
pub fn parse_decimal(field: &'static str, value: &str) -> Result<f64, FeedError> {
    let invalid = || FeedError::ParseDecimal {
        field,
        value: value.to_string(),
    };

    let parsed: f64 = value.trim().parse().map_err(|_| invalid())?;
    if parsed.is_finite() { Ok(parsed) } else { Err(invalid()) }
}

fn parse_ladder(levels: &[Level], depth: usize) -> Result<Vec<BookLevel>, FeedError> {
    levels
        .iter()
        .take(depth)
        .map(|l| Ok(BookLevel::new(parse_decimal("px", &l.px)?, parse_decimal("sz", &l.sz)?)))
        .collect()
}

fn parse_candle(bar: &WireCandle) -> Result<Candle, FeedError> {
    Ok(Candle {
        open_ms: bar.t,
        open: parse_decimal("o", &bar.o)?,
        high: parse_decimal("h", &bar.h)?,
        low: parse_decimal("l", &bar.l)?,
        close: parse_decimal("c", &bar.c)?,
        volume: parse_decimal("v", &bar.v)?,
    })
}

fn parse_trade(trade: &RecentTrade) -> Result<LastTrade, FeedError> {
    let side = match trade.side.as_str() {
        "B" => Some(TradeSide::Buy),
        "A" => Some(TradeSide::Sell),
        _ => None,
    };

    Ok(LastTrade {
        price: parse_decimal("px", &trade.px)?,
        size: parse_decimal("sz", &trade.sz)?,
        side,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(px: &str, sz: &str) -> Level {
        Level {
            px: px.into(),
            sz: sz.into(),
            n: 1,
        }
    }

    fn context() -> AssetContext {
        AssetContext {
            funding: "0.0000125".into(),
            mark_px: "100.5".into(),
            open_interest: "1234.5".into(),
            day_base_vlm: Some("987.25".into()),
            prev_day_px: Some("98.0".into()),
        }
    }

    fn book() -> L2Book {
        L2Book {
            coin: "BTC".into(),
            levels: vec![
                vec![level("100", "1"), level("99", "2"), level("98", "3")],
                vec![level("101", "1.5"), level("102", "2.5")],
            ],
            time: 1_700_000_000_000,
        }
    }

    fn trade(side: &str, px: &str, time: u64) -> RecentTrade {
        RecentTrade {
            coin: "BTC".into(),
            side: side.into(),
            px: px.into(),
            sz: "0.1".into(),
            time,
        }
    }

    fn feed(depth: usize) -> HyperliquidFeed {
        HyperliquidFeed::new(DEFAULT_INFO_URL.into(), depth).unwrap()
    }

    #[test]
    fn parse_decimal_is_strict() {
        assert_eq!(parse_decimal("px", "101.25").unwrap(), 101.25);
        assert_eq!(parse_decimal("funding", "-0.0001").unwrap(), -0.0001);
        assert!(parse_decimal("px", "").is_err());
        assert!(parse_decimal("px", "12abc").is_err());
        assert!(parse_decimal("px", "NaN").is_err());
        assert!(parse_decimal("px", "inf").is_err());
    }

    #[test]
    fn assemble_truncates_ladder_and_sets_touch() {
        let snap = feed(2).assemble("BTC", &context(), &book(), &[]).unwrap();

        assert_eq!(snap.bids.len(), 2);
        assert_eq!(snap.asks.len(), 2);
        assert_eq!(snap.best_bid, BookLevel::new(100.0, 1.0));
        assert_eq!(snap.best_ask, BookLevel::new(101.0, 1.5));
        assert_eq!(snap.ts_ms, 1_700_000_000_000);
        assert_eq!(snap.cumulative_volume, 987.25);
        assert_eq!(snap.mark_price, Some(100.5));
        assert_eq!(snap.open_interest, Some(1234.5));
        assert_eq!(snap.prev_day_price, Some(98.0));
        assert!(snap.last_trade.is_none());
        assert!(snap.candles.is_empty());
    }

    #[test]
    fn assemble_takes_latest_trade_and_maps_side() {
        let trades = vec![trade("A", "100.2", 2), trade("B", "100.8", 5), trade("A", "100.1", 3)];
        let snap = feed(20).assemble("BTC", &context(), &book(), &trades).unwrap();

        let last = snap.last_trade.unwrap();
        assert_eq!(last.price, 100.8);
        assert_eq!(last.side, Some(TradeSide::Buy));

        let unknown = feed(20)
            .assemble("BTC", &context(), &book(), &[trade("?", "100", 1)])
            .unwrap();
        assert_eq!(unknown.last_trade.unwrap().side, None);
    }

    #[test]
    fn assemble_rejects_one_sided_book_payload() {
        let mut bad = book();
        bad.levels.pop();
        assert!(matches!(
            feed(20).assemble("BTC", &context(), &bad, &[]),
            Err(FeedError::InvalidResponse(_))
        ));
    }

    #[test]
    fn assemble_rejects_garbage_size() {
        let mut bad = book();
        bad.levels[1][0].sz = "1,5".into();
        assert!(matches!(
            feed(20).assemble("BTC", &context(), &bad, &[]),
            Err(FeedError::ParseDecimal { field: "sz", .. })
        ));
    }

    #[test]
    fn missing_day_volume_defaults_to_zero() {
        let mut ctx = context();
        ctx.day_base_vlm = None;
        let snap = feed(20).assemble("BTC", &ctx, &book(), &[]).unwrap();
        assert_eq!(snap.cumulative_volume, 0.0);
    }

    #[test]
    fn request_bodies_are_tagged_by_type() {
        let body = serde_json::to_value(InfoRequest::L2Book { coin: "ETH" }).unwrap();
        assert_eq!(body, serde_json::json!({ "type": "l2Book", "coin": "ETH" }));

        let body = serde_json::to_value(InfoRequest::MetaAndAssetCtxs).unwrap();
        assert_eq!(body, serde_json::json!({ "type": "metaAndAssetCtxs" }));

        let body = serde_json::to_value(InfoRequest::CandleSnapshot {
            req: CandleRequest {
                coin: "BTC",
                interval: "15m",
                start_time: 1,
                end_time: 2,
            },
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "type": "candleSnapshot",
                "req": { "coin": "BTC", "interval": "15m", "startTime": 1, "endTime": 2 }
            })
        );
    }

    #[test]
    fn candle_bars_parse_from_wire_strings() {
        let wire: WireCandle = serde_json::from_value(serde_json::json!({
            "t": 1_700_000_000_000u64, "T": 1_700_000_899_999u64, "s": "BTC", "i": "15m",
            "o": "100.0", "c": "101.5", "h": "102.0", "l": "99.5", "v": "12.25", "n": 40
        }))
        .unwrap();
        let bar = parse_candle(&wire).unwrap();
        assert_eq!(bar.open_ms, 1_700_000_000_000);
        assert_eq!((bar.open, bar.high, bar.low, bar.close), (100.0, 102.0, 99.5, 101.5));
        assert_eq!(bar.volume, 12.25);

        let mut bad = wire.clone();
        bad.h = "high".into();
        assert!(matches!(parse_candle(&bad), Err(FeedError::ParseDecimal { field: "h", .. })));
    }
}
