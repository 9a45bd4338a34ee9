//! Wire shapes of the Hyperliquid info endpoint. Numbers arrive as decimal
//! strings and stay strings here; conversion happens in the client.

use serde::{Deserialize, Serialize};

/// Body of a POST to the info endpoint.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest<'a> {
    MetaAndAssetCtxs,
    L2Book { coin: &'a str },
    RecentTrades { coin: &'a str },
    CandleSnapshot { req: CandleRequest<'a> },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleRequest<'a> {
    pub coin: &'a str,
    pub interval: &'a str,
    pub start_time: u64,
    pub end_time: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub universe: Vec<AssetMeta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    pub name: String,
    #[serde(default)]
    pub is_delisted: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetContext {
    pub funding: String,
    pub mark_px: String,
    pub open_interest: String,
    #[serde(default)]
    pub day_base_vlm: Option<String>,
    #[serde(default)]
    pub prev_day_px: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Level {
    pub px: String,
    pub sz: String,
    #[serde(default)]
    pub n: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct L2Book {
    pub coin: String,
    /// `[bids, asks]`, best price first on each side.
    pub levels: Vec<Vec<Level>>,
    pub time: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentTrade {
    pub coin: String,
    /// `B` for a buy aggressor, `A` for a sell aggressor.
    pub side: String,
    pub px: String,
    pub sz: String,
    pub time: u64,
}

/// One bar of a `candleSnapshot` response.
#[derive(Debug, Clone, Deserialize)]
pub struct WireCandle {
    /// Open time.
    pub t: u64,
    /// Close time.
    #[serde(rename = "T", default)]
    pub close_time: u64,
    pub o: String,
    pub h: String,
    pub l: String,
    pub c: String,
    pub v: String,
    /// Number of trades.
    #[serde(default)]
    pub n: u64,
}
