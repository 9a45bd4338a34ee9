//! Market data ingress: the [`MarketFeed`] seam, its Hyperliquid
//! implementation and the collector loop that appends snapshots to a store.

pub mod collector;
pub mod error;
pub mod hyperliquid;

use async_trait::async_trait;
use corelib::Snapshot;

pub use collector::{CycleReport, collect_once, run_collector};
pub use error::FeedError;
pub use hyperliquid::HyperliquidFeed;

/// Anything that can produce one fresh snapshot for an asset.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    async fn fetch_snapshot(&self, asset: &str) -> Result<Snapshot, FeedError>;
}

#[async_trait]
impl<T: MarketFeed + ?Sized> MarketFeed for std::sync::Arc<T> {
    async fn fetch_snapshot(&self, asset: &str) -> Result<Snapshot, FeedError> {
        (**self).fetch_snapshot(asset).await
    }
}
