//! Feature derivation and Market State assembly.
//!
//! Everything in this crate is a pure function of its inputs: no I/O, no
//! clock reads, no shared mutable state. Callers hand in windows and a
//! generation timestamp and get back a document.

pub mod config;
pub mod features;
pub mod state;
pub mod window;

pub use config::{ConfigError, EngineConfig, LevelConfig, VolatilityConfig};
pub use features::{AssetFeatures, FeatureEngine, InsufficientData, InsufficientReason};
pub use state::{BuildError, MarketStateBuilder};
pub use window::{FeatureWindow, WindowError, WindowSpec};
