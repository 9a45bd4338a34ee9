//! Shared data model for the snapshot → features → setups pipeline.
//!
//! Everything here is plain data with serde derives; the computation lives
//! in the `engine` and `advisor` crates.

pub mod models;

pub use models::*;
