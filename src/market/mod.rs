//! Market module - Simulated price feed
//!
//! Holds the candle window, evolves it once per tick and talks to the
//! optional forecast service when a bucket seals.

mod candles;
pub mod forecast;
pub mod price_model;

pub use candles::CandleStore;
pub use forecast::{
    build_forecaster, Forecast, ForecastConfig, Forecaster, HttpForecaster, NoForecaster,
};
pub use price_model::{
    fallback_candle, select_sealed_candle, CandleSource, MarketConfig, PriceModel, PriceUpdate,
    SealedCandle, TickStep,
};
