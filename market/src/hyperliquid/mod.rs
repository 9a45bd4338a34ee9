mod client;
pub mod types;

pub use client::{DEFAULT_INFO_URL, HyperliquidFeed, parse_decimal};
