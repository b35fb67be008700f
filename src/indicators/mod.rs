//! Indicator Engine
//!
//! Indicators are matched by category, not position. Each category has an
//! explicit update policy:
//! - RSI: recomputed from the close series (Wilder smoothing)
//! - MACD: nudged in proportion to the tick's price delta
//! - ADX: rises on large moves, decays otherwise, clamped
//! - anything else: held as-is
//!
//! MACD and ADX are approximations; they are never rebuilt from the series.

use serde::Deserialize;
use tracing::debug;

use crate::types::{round_to, Indicator, IndicatorCategory};

/// Indicator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    /// Display precision applied to every updated value
    pub decimals: u32,
    /// MACD change per unit of price delta
    pub macd_sensitivity: f64,
    /// Absolute price move above which ADX strengthens
    pub adx_move_threshold: f64,
    pub adx_step: f64,
    pub adx_decay: f64,
    pub adx_min: f64,
    pub adx_max: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            decimals: 2,
            macd_sensitivity: 0.01,
            adx_move_threshold: 2.0,
            adx_step: 0.6,
            adx_decay: 0.3,
            adx_min: 10.0,
            adx_max: 100.0,
        }
    }
}

/// How a category of indicator is refreshed each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    RecomputeFromSeries,
    IncrementalNudge,
    Hold,
}

impl UpdatePolicy {
    pub fn for_category(category: IndicatorCategory) -> Self {
        match category {
            IndicatorCategory::Rsi => UpdatePolicy::RecomputeFromSeries,
            IndicatorCategory::Macd | IndicatorCategory::Adx => UpdatePolicy::IncrementalNudge,
            IndicatorCategory::Other => UpdatePolicy::Hold,
        }
    }
}

/// Wilder RSI over `closes`.
///
/// Seeds average gain/loss from the first `period` deltas, then smooths the
/// remaining deltas with weight `1/period`. Returns `None` with fewer than
/// `period + 1` closes. Zero average loss gives exactly 100.
pub fn wilder_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let (seed, rest) = deltas.split_at(period);

    let p = period as f64;
    let mut avg_gain = seed.iter().filter(|d| **d > 0.0).sum::<f64>() / p;
    let mut avg_loss = seed.iter().filter(|d| **d < 0.0).map(|d| -d).sum::<f64>() / p;

    for delta in rest {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some((100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0))
}

/// Applies the policy table to a set of indicators
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn nudge_macd(&self, value: f64, price_delta: f64) -> f64 {
        value + price_delta * self.config.macd_sensitivity
    }

    pub fn nudge_adx(&self, value: f64, price_delta: f64) -> f64 {
        let next = if price_delta.abs() > self.config.adx_move_threshold {
            value + self.config.adx_step
        } else {
            value - self.config.adx_decay
        };
        next.clamp(self.config.adx_min, self.config.adx_max)
    }

    /// Update every indicator in place for one tick
    pub fn update(&self, indicators: &mut [Indicator], closes: &[f64], price_delta: f64) {
        let rsi = wilder_rsi(closes, self.config.rsi_period);
        let decimals = self.config.decimals;

        for indicator in indicators.iter_mut() {
            let category = indicator.category();
            let updated = match (UpdatePolicy::for_category(category), category) {
                (UpdatePolicy::RecomputeFromSeries, _) => rsi,
                (UpdatePolicy::IncrementalNudge, IndicatorCategory::Macd) => {
                    Some(self.nudge_macd(indicator.value, price_delta))
                }
                (UpdatePolicy::IncrementalNudge, _) => {
                    Some(self.nudge_adx(indicator.value, price_delta))
                }
                (UpdatePolicy::Hold, _) => None,
            };

            if let Some(value) = updated {
                indicator.value = round_to(value, decimals);
            } else if category == IndicatorCategory::Rsi {
                debug!(
                    candles = closes.len(),
                    required = self.config.rsi_period + 1,
                    "RSI: not enough candles, keeping previous value"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicators() -> Vec<Indicator> {
        vec![
            Indicator::new("RSI (14)", 50.0),
            Indicator::new("MACD (12,26,9)", 1.0),
            Indicator::new("ADX (14)", 30.0),
            Indicator::new("Stochastic (14,3)", 61.5),
        ]
    }

    #[test]
    fn test_policy_table() {
        assert_eq!(
            UpdatePolicy::for_category(IndicatorCategory::Rsi),
            UpdatePolicy::RecomputeFromSeries
        );
        assert_eq!(
            UpdatePolicy::for_category(IndicatorCategory::Macd),
            UpdatePolicy::IncrementalNudge
        );
        assert_eq!(
            UpdatePolicy::for_category(IndicatorCategory::Adx),
            UpdatePolicy::IncrementalNudge
        );
        assert_eq!(
            UpdatePolicy::for_category(IndicatorCategory::Other),
            UpdatePolicy::Hold
        );
    }

    #[test]
    fn test_rsi_requires_period_plus_one() {
        let closes: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        assert_eq!(wilder_rsi(&closes, 14), None);
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        assert!(wilder_rsi(&closes, 14).is_some());
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert_eq!(wilder_rsi(&closes, 14), Some(100.0));
    }

    #[test]
    fn test_rsi_flat_series_is_100() {
        // No losses at all, so average loss is zero
        let closes = vec![100.0; 20];
        assert_eq!(wilder_rsi(&closes, 14), Some(100.0));
    }

    #[test]
    fn test_rsi_all_losses_is_0() {
        let closes: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();
        assert_eq!(wilder_rsi(&closes, 14), Some(0.0));
    }

    #[test]
    fn test_rsi_balanced_series() {
        // Alternating +1/-1 moves: equal average gain and loss
        let closes: Vec<f64> = (0..15)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let rsi = wilder_rsi(&closes, 14).unwrap();
        assert!((rsi - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_smoothing_after_seed() {
        // Seed: 14 gains of 1 -> avg_gain 1, avg_loss 0
        // One more delta of -14 -> avg_gain 13/14, avg_loss 1
        let mut closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        closes.push(100.0);
        let rsi = wilder_rsi(&closes, 14).unwrap();
        let rs = (13.0 / 14.0) / 1.0;
        let expected = 100.0 - 100.0 / (1.0 + rs);
        assert!((rsi - expected).abs() < 1e-9);
    }

    #[test]
    fn test_macd_proportional_to_delta() {
        let engine = IndicatorEngine::default();
        assert!((engine.nudge_macd(1.0, 10.0) - 1.1).abs() < 1e-12);
        assert!((engine.nudge_macd(1.0, -10.0) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_adx_strengthens_decays_and_clamps() {
        let engine = IndicatorEngine::default();
        assert!((engine.nudge_adx(30.0, 5.0) - 30.6).abs() < 1e-12);
        assert!((engine.nudge_adx(30.0, -5.0) - 30.6).abs() < 1e-12);
        assert!((engine.nudge_adx(30.0, 1.0) - 29.7).abs() < 1e-12);
        assert_eq!(engine.nudge_adx(10.1, 0.0), 10.0);
        assert_eq!(engine.nudge_adx(99.9, 50.0), 100.0);
    }

    #[test]
    fn test_update_short_window_keeps_rsi() {
        let engine = IndicatorEngine::default();
        let mut values = indicators();
        engine.update(&mut values, &[100.0, 110.0], 10.0);

        assert_eq!(values[0].value, 50.0);
        assert_eq!(values[1].value, 1.1);
        assert_eq!(values[2].value, 30.6);
        assert_eq!(values[3].value, 61.5);
    }

    #[test]
    fn test_update_recomputes_rsi_and_rounds() {
        let engine = IndicatorEngine::default();
        let mut values = indicators();
        let mut closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        closes.push(100.0);
        engine.update(&mut values, &closes, -14.0);

        let rs = 13.0 / 14.0;
        let expected = round_to(100.0 - 100.0 / (1.0 + rs), 2);
        assert_eq!(values[0].value, expected);
        assert_eq!(values[1].value, 0.86);
    }
}
