pub mod candle;
pub mod features;
pub mod market_state;
pub mod playbook;
pub mod setup;
pub mod snapshot;

pub use candle::{Candle, CandleInterval, CandleSet};
pub use features::{
    BookDepth, FlowMetric, KeyLevels, LevelKind, LevelSet, PriceLevel, VolatilityMetric, VolatilityRegime,
};
pub use market_state::{
    AssetState, InsufficientAsset, MarketState, PriceContext, Returns, RiskContext, SCHEMA_VERSION,
};
pub use playbook::{MenuError, Playbook, PlaybookMenu};
pub use setup::{Direction, EntryPlan, PositionPlan, RankedResult, TradeSetup};
pub use snapshot::{BookLevel, LastTrade, Snapshot, TradeSide};
