//! Options Surface Updater
//!
//! Perturbs a fixed ladder of strikes around the underlying. Premiums,
//! implied-vol proxies and open interest are floored at zero.

use rand::Rng;
use serde::Deserialize;

use crate::types::{round_to, OptionRow};

#[derive(Debug, Clone, Deserialize)]
pub struct OptionsConfig {
    pub strike_step: f64,
    pub strikes_each_side: usize,
    /// Divisor applied to `close - strike` before it moves a premium
    pub distance_scale: f64,
    pub premium_sensitivity: f64,
    pub premium_noise: f64,
    pub iv_noise: f64,
    pub oi_noise: u64,
    /// OI noise at the at-the-money strike
    pub oi_noise_atm: u64,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            strike_step: 50.0,
            strikes_each_side: 5,
            distance_scale: 100.0,
            premium_sensitivity: 0.5,
            premium_noise: 2.0,
            iv_noise: 0.2,
            oi_noise: 500,
            oi_noise_atm: 2500,
        }
    }
}

/// Strike nearest to the rounded underlying close
pub fn atm_strike(rows: &[OptionRow], close: f64) -> Option<f64> {
    let reference = close.round();
    rows.iter()
        .map(|r| r.strike)
        .min_by(|a, b| {
            (a - reference)
                .abs()
                .partial_cmp(&(b - reference).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

fn noise<R: Rng + ?Sized>(rng: &mut R, max: f64) -> f64 {
    if max > 0.0 && max.is_finite() {
        rng.gen_range(-max..=max)
    } else {
        0.0
    }
}

fn perturb_oi<R: Rng + ?Sized>(rng: &mut R, oi: u64, max: u64) -> u64 {
    if max == 0 {
        return oi;
    }
    let step = rng.gen_range(-(max as i64)..=max as i64);
    (oi as i64).saturating_add(step).max(0) as u64
}

pub struct OptionsSurface {
    config: OptionsConfig,
}

impl OptionsSurface {
    pub fn new(config: OptionsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptionsConfig {
        &self.config
    }

    /// Move every row toward the new underlying close
    pub fn update<R: Rng + ?Sized>(&self, rows: &mut [OptionRow], close: f64, rng: &mut R) {
        let atm = atm_strike(rows, close);
        let cfg = &self.config;
        let scale = if cfg.distance_scale > 0.0 { cfg.distance_scale } else { 1.0 };

        for row in rows.iter_mut() {
            let moneyness = (close - row.strike) / scale * cfg.premium_sensitivity;

            // Call drifts against moneyness, put with it
            row.call_ltp = round_to(
                (row.call_ltp - moneyness + noise(rng, cfg.premium_noise)).max(0.0),
                2,
            );
            row.put_ltp = round_to(
                (row.put_ltp + moneyness + noise(rng, cfg.premium_noise)).max(0.0),
                2,
            );
            row.call_iv = round_to((row.call_iv + noise(rng, cfg.iv_noise)).max(0.0), 2);
            row.put_iv = round_to((row.put_iv + noise(rng, cfg.iv_noise)).max(0.0), 2);

            let oi_noise = if Some(row.strike) == atm {
                cfg.oi_noise_atm
            } else {
                cfg.oi_noise
            };
            row.call_oi = perturb_oi(rng, row.call_oi, oi_noise);
            row.put_oi = perturb_oi(rng, row.put_oi, oi_noise);
        }
    }

    /// Starting ladder centred on `price`, premiums from intrinsic value
    pub fn ladder<R: Rng + ?Sized>(&self, price: f64, rng: &mut R) -> Vec<OptionRow> {
        let cfg = &self.config;
        let step = if cfg.strike_step > 0.0 { cfg.strike_step } else { 50.0 };
        let atm = (price / step).round() * step;
        let side = cfg.strikes_each_side as i64;

        (-side..=side)
            .map(|i| {
                let strike = atm + i as f64 * step;
                let call_intrinsic = (price - strike).max(0.0);
                let put_intrinsic = (strike - price).max(0.0);
                // Time value decays away from the money
                let time_value = (step * 2.0 - (i.unsigned_abs() as f64) * step * 0.15).max(5.0);
                let oi_base: u64 = if i == 0 { 150_000 } else { 60_000 };

                OptionRow {
                    strike,
                    call_oi: oi_base + rng.gen_range(0..=20_000),
                    call_iv: round_to(14.0 + rng.gen_range(0.0..=2.0), 2),
                    call_ltp: round_to(call_intrinsic + time_value, 2),
                    put_ltp: round_to(put_intrinsic + time_value, 2),
                    put_iv: round_to(14.5 + rng.gen_range(0.0..=2.0), 2),
                    put_oi: oi_base + rng.gen_range(0..=20_000),
                }
            })
            .collect()
    }
}

impl Default for OptionsSurface {
    fn default() -> Self {
        Self::new(OptionsConfig::default())
    }
}
