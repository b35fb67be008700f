//! Candle Store - Fixed-length window of OHLCV bars
//!
//! The last candle is the in-progress bar for the active timeframe bucket;
//! everything before it is sealed. Appending past capacity drops the oldest.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::Candle;

/// Sliding window of candles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleStore {
    candles: VecDeque<Candle>,
    capacity: usize,
}

impl CandleStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            candles: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Build a store from existing candles, keeping only the newest `capacity`
    pub fn from_candles(candles: impl IntoIterator<Item = Candle>, capacity: usize) -> Self {
        let mut store = Self::new(capacity);
        for candle in candles {
            store.push(candle);
        }
        store
    }

    /// Seal the current candle by appending a new one
    pub fn push(&mut self, candle: Candle) {
        self.candles.push_back(candle);
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// In-progress candle, mutable while its bucket is open
    pub fn last_mut(&mut self) -> Option<&mut Candle> {
        self.candles.back_mut()
    }

    /// Last `n` candles in chronological order
    pub fn last_n(&self, n: usize) -> Vec<Candle> {
        let skip = self.candles.len().saturating_sub(n);
        self.candles.iter().skip(skip).cloned().collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close: f64) -> Candle {
        Candle::flat("10:00", close)
    }

    #[test]
    fn test_window_drops_oldest() {
        let mut store = CandleStore::new(3);
        for i in 0..5 {
            store.push(candle(100.0 + i as f64));
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.closes(), vec![102.0, 103.0, 104.0]);
        assert_eq!(store.last().unwrap().close, 104.0);
    }

    #[test]
    fn test_last_n_chronological() {
        let store = CandleStore::from_candles((0..10).map(|i| candle(i as f64)), 20);
        let recent = store.last_n(5);
        let closes: Vec<f64> = recent.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![5.0, 6.0, 7.0, 8.0, 9.0]);

        // Asking for more than available returns everything
        assert_eq!(store.last_n(50).len(), 10);
    }

    #[test]
    fn test_last_mut_updates_in_place() {
        let mut store = CandleStore::from_candles(vec![candle(1.0), candle(2.0)], 5);
        store.last_mut().unwrap().close = 3.0;
        assert_eq!(store.closes(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut store = CandleStore::new(0);
        store.push(candle(1.0));
        store.push(candle(2.0));
        assert_eq!(store.len(), 1);
        assert_eq!(store.capacity(), 1);
    }
}
