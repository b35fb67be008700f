//! SimBot Library
//!
//! Single-instrument intraday market simulator driving a rule-based
//! trading engine, tick by tick.

pub mod broker;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod market;
pub mod options;
pub mod risk;
pub mod status;
pub mod strategy;
pub mod types;

#[cfg(feature = "dashboard")]
pub mod dashboard;

pub use engine::{Engine, Snapshot, TickOutput};
pub use error::{EngineError, TickFailure};
