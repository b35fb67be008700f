//! Engine error types
//!
//! Only malformed snapshot input is an error. Forecast failures are absorbed
//! by the fallback path and never show up here.

use thiserror::Error;

use crate::engine::Snapshot;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("candle window is empty")]
    EmptyCandleWindow,

    #[error("candle #{index} is malformed: {reason}")]
    InvalidCandle { index: usize, reason: String },

    #[error("position {symbol} is malformed: {reason}")]
    InvalidPosition { symbol: String, reason: String },

    #[error("overview is malformed: {0}")]
    InvalidOverview(String),

    #[error("lot size must be positive")]
    InvalidLotSize,
}

/// A rejected tick. Carries the input snapshot back, untouched.
#[derive(Debug, Error)]
#[error("tick rejected: {error}")]
pub struct TickFailure {
    pub snapshot: Box<Snapshot>,
    pub error: EngineError,
}

impl TickFailure {
    pub fn new(snapshot: Snapshot, error: EngineError) -> Self {
        Self {
            snapshot: Box::new(snapshot),
            error,
        }
    }

    /// Recover the untouched input snapshot
    pub fn into_snapshot(self) -> Snapshot {
        *self.snapshot
    }
}
