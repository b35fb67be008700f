//! Initial snapshot
//!
//! Walks the fallback generator backwards from the configured price so the
//! last seeded candle closes exactly at `initial_price`.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::VecDeque;

use super::Snapshot;
use crate::config::AppConfig;
use crate::indicators::wilder_rsi;
use crate::market::{fallback_candle, CandleStore};
use crate::options::OptionsSurface;
use crate::strategy::{NEUTRAL_ADX, NEUTRAL_RSI};
use crate::types::{round_to, Candle, Indicator, Overview, TradingStatus};

pub const RSI_NAME: &str = "RSI (14)";
pub const MACD_NAME: &str = "MACD (12,26,9)";
pub const ADX_NAME: &str = "ADX (14)";
pub const STOCHASTIC_NAME: &str = "Stochastic (14,3)";

/// Seeded history ending at `price`, oldest first
pub fn seed_candles<R: Rng + ?Sized>(
    config: &AppConfig,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Candle> {
    let count = config.engine.initial_candles.max(1);
    let step = config.engine.timeframe.duration();

    let mut close = config.engine.initial_price;
    let mut candles = Vec::with_capacity(count);
    for i in 0..count {
        let label = (now - step * i as i32).format("%H:%M").to_string();
        // Generated forwards from `close`, then reversed so it ends at `close`
        let forward = fallback_candle(close, &label, &config.market, rng);
        candles.push(Candle {
            open: forward.close,
            close: forward.open,
            ..forward
        });
        close = candles[i].open;
    }
    candles.reverse();
    candles
}

pub fn initial_snapshot<R: Rng + ?Sized>(
    config: &AppConfig,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Snapshot {
    let candles = CandleStore::from_candles(
        seed_candles(config, now, rng),
        config.engine.candle_window,
    );

    let decimals = config.indicators.decimals;
    let rsi = wilder_rsi(&candles.closes(), config.indicators.rsi_period).unwrap_or(NEUTRAL_RSI);
    let adx = (NEUTRAL_ADX + rng.gen_range(0.0..=15.0))
        .clamp(config.indicators.adx_min, config.indicators.adx_max);
    let indicators = vec![
        Indicator::new(RSI_NAME, round_to(rsi, decimals)),
        Indicator::new(MACD_NAME, round_to(rng.gen_range(-2.0..=2.0), decimals)),
        Indicator::new(ADX_NAME, round_to(adx, decimals)),
        Indicator::new(STOCHASTIC_NAME, round_to(rng.gen_range(20.0..=80.0), decimals)),
    ];

    let options =
        OptionsSurface::new(config.options.clone()).ladder(config.engine.initial_price, rng);

    Snapshot {
        symbol: config.engine.symbol.clone(),
        candles,
        timeframe: config.engine.timeframe,
        last_boundary: now,
        positions: Vec::new(),
        overview: Overview::new(config.risk.initial_equity),
        indicators,
        options,
        status: TradingStatus::Active,
        orders: VecDeque::new(),
        signals: VecDeque::new(),
        sentiment: None,
        tick_count: 0,
    }
}
