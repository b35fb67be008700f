//! Price Evolution Model
//!
//! Each tick either mutates the in-progress candle (bucket still open) or
//! seals it and opens a new one. A new candle comes from the forecast
//! service when it has an answer, otherwise from a seeded random walk.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::candles::CandleStore;
use super::forecast::Forecast;
use crate::types::{round_to, Candle, Timeframe};

/// Random-walk parameters
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Max absolute close move while a bucket is open
    pub tick_max_move: f64,
    /// Volume added per in-bucket tick
    pub tick_volume_min: u64,
    pub tick_volume_max: u64,
    /// Max absolute open-to-close move of a fallback candle
    pub seal_max_delta: f64,
    /// Max wick extension beyond the body of a fallback candle
    pub seal_max_wick: f64,
    pub seal_volume_min: u64,
    pub seal_volume_max: u64,
    pub price_decimals: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            tick_max_move: 5.0,
            tick_volume_min: 10,
            tick_volume_max: 120,
            seal_max_delta: 25.0,
            seal_max_wick: 12.0,
            seal_volume_min: 1000,
            seal_volume_max: 5000,
            price_decimals: 2,
        }
    }
}

/// What the tick does to the candle window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStep {
    /// Bucket still open: move the in-progress close
    Mutate,
    /// Bucket elapsed: seal and open a new candle
    Seal,
}

impl TickStep {
    /// Seal once at least one timeframe has elapsed since the last boundary
    pub fn decide(timeframe: Timeframe, last_boundary: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now - last_boundary >= timeframe.duration() {
            TickStep::Seal
        } else {
            TickStep::Mutate
        }
    }
}

/// A newly opened candle, tagged with where it came from
#[derive(Debug, Clone, PartialEq)]
pub enum SealedCandle {
    Forecasted(Candle),
    Fallback(Candle),
}

impl SealedCandle {
    pub fn candle(&self) -> &Candle {
        match self {
            SealedCandle::Forecasted(c) | SealedCandle::Fallback(c) => c,
        }
    }

    pub fn into_candle(self) -> Candle {
        match self {
            SealedCandle::Forecasted(c) | SealedCandle::Fallback(c) => c,
        }
    }

    pub fn source(&self) -> CandleSource {
        match self {
            SealedCandle::Forecasted(_) => CandleSource::Forecasted,
            SealedCandle::Fallback(_) => CandleSource::Fallback,
        }
    }
}

/// How this tick's reference price was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleSource {
    Mutated,
    Forecasted,
    Fallback,
}

/// Result of one price evolution step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceUpdate {
    pub previous_close: f64,
    pub close: f64,
    pub source: CandleSource,
}

impl PriceUpdate {
    pub fn delta(&self) -> f64 {
        self.close - self.previous_close
    }

    pub fn sealed(&self) -> bool {
        self.source != CandleSource::Mutated
    }
}

/// Uniform draw in `[-max, max]`; zero when `max` is not positive
fn symmetric<R: Rng + ?Sized>(rng: &mut R, max: f64) -> f64 {
    if max > 0.0 && max.is_finite() {
        rng.gen_range(-max..=max)
    } else {
        0.0
    }
}

/// Uniform draw in `[0, max]`
fn up_to<R: Rng + ?Sized>(rng: &mut R, max: f64) -> f64 {
    if max > 0.0 && max.is_finite() {
        rng.gen_range(0.0..=max)
    } else {
        0.0
    }
}

fn volume_between<R: Rng + ?Sized>(rng: &mut R, min: u64, max: u64) -> f64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    rng.gen_range(lo..=hi) as f64
}

/// Deterministic-given-seed random-walk candle. Always satisfies the OHLC invariant.
pub fn fallback_candle<R: Rng + ?Sized>(
    open: f64,
    time: &str,
    config: &MarketConfig,
    rng: &mut R,
) -> Candle {
    let decimals = config.price_decimals;
    let min_price = 10f64.powi(-(decimals as i32));

    let close = round_to((open + symmetric(rng, config.seal_max_delta)).max(min_price), decimals);
    let high = round_to(open.max(close) + up_to(rng, config.seal_max_wick), decimals);
    let low = round_to((open.min(close) - up_to(rng, config.seal_max_wick)).max(0.0), decimals);
    let volume = volume_between(rng, config.seal_volume_min, config.seal_volume_max);

    Candle {
        time: time.to_string(),
        open,
        high: high.max(open.max(close)),
        low: low.min(open.min(close)),
        close,
        volume,
    }
}

/// Candle built from a forecast, with `open` pinned to the prior close.
/// High/low are widened to cover the body if the forecast does not.
pub fn forecast_candle<R: Rng + ?Sized>(
    open: f64,
    time: &str,
    forecast: &Forecast,
    config: &MarketConfig,
    rng: &mut R,
) -> Candle {
    let decimals = config.price_decimals;
    let close = round_to(forecast.close, decimals);
    Candle {
        time: time.to_string(),
        open,
        high: round_to(forecast.high, decimals).max(open.max(close)),
        low: round_to(forecast.low, decimals).min(open.min(close)),
        close,
        volume: volume_between(rng, config.seal_volume_min, config.seal_volume_max),
    }
}

/// Pick the forecast when there is a usable one, the fallback otherwise
pub fn select_sealed_candle<R: Rng + ?Sized>(
    open: f64,
    time: &str,
    forecast: Option<&Forecast>,
    config: &MarketConfig,
    rng: &mut R,
) -> SealedCandle {
    match forecast {
        Some(f) if f.is_usable() => {
            SealedCandle::Forecasted(forecast_candle(open, time, f, config, rng))
        }
        _ => SealedCandle::Fallback(fallback_candle(open, time, config, rng)),
    }
}

/// Move the in-progress close; high/low track the running extrema
pub fn mutate_candle<R: Rng + ?Sized>(candle: &mut Candle, config: &MarketConfig, rng: &mut R) {
    let decimals = config.price_decimals;
    let min_price = 10f64.powi(-(decimals as i32));
    let close = round_to(
        (candle.close + symmetric(rng, config.tick_max_move)).max(min_price),
        decimals,
    );

    candle.close = close;
    candle.high = candle.high.max(close);
    candle.low = candle.low.min(close);
    candle.volume += volume_between(rng, config.tick_volume_min, config.tick_volume_max);
}

/// Applies one evolution step to the candle window
#[derive(Debug, Clone, Default)]
pub struct PriceModel {
    config: MarketConfig,
}

impl PriceModel {
    pub fn new(config: MarketConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Returns `None` only for an empty window, which callers reject beforehand
    pub fn evolve<R: Rng + ?Sized>(
        &self,
        store: &mut CandleStore,
        step: TickStep,
        forecast: Option<&Forecast>,
        time: &str,
        rng: &mut R,
    ) -> Option<PriceUpdate> {
        let previous_close = store.last()?.close;

        match step {
            TickStep::Mutate => {
                let candle = store.last_mut()?;
                mutate_candle(candle, &self.config, rng);
                Some(PriceUpdate {
                    previous_close,
                    close: candle.close,
                    source: CandleSource::Mutated,
                })
            }
            TickStep::Seal => {
                let sealed =
                    select_sealed_candle(previous_close, time, forecast, &self.config, rng);
                let source = sealed.source();
                let candle = sealed.into_candle();
                let close = candle.close;
                store.push(candle);
                Some(PriceUpdate {
                    previous_close,
                    close,
                    source,
                })
            }
        }
    }
}
