//! Configuration management for SimBot
//!
//! Loads from optional config files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::types::Timeframe;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub market: MarketConfig,
    pub indicators: IndicatorConfig,
    pub options: OptionsConfig,
    pub risk: RiskConfig,
    pub strategy: StrategyConfig,
    pub forecast: ForecastConfig,
    pub broker: BrokerConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Instrument every position tracks
    pub symbol: String,
    /// Close of the last seeded candle
    pub initial_price: f64,
    pub tick_interval_ms: u64,
    /// Fixed RNG seed; absent means seeded from entropy
    #[serde(default)]
    pub seed: Option<u64>,
    pub timeframe: Timeframe,
    /// Candles kept in the sliding window
    pub candle_window: usize,
    /// Candles generated for the starting snapshot
    pub initial_candles: usize,
    pub signal_log_cap: usize,
    pub order_log_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "NIFTY".to_string(),
            initial_price: 22800.0,
            tick_interval_ms: 2000,
            seed: None,
            timeframe: Timeframe::Min5,
            candle_window: 60,
            initial_candles: 40,
            signal_log_cap: 50,
            order_log_cap: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Forward executed orders to the broker adapter
    pub enabled: bool,
    /// Adapter name ("paper")
    pub name: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "paper".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Listen address for the dashboard API
    pub bind: String,
    /// WebSocket heartbeat period, 0 disables
    pub heartbeat_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            heartbeat_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Default filter when RUST_LOG is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::defaults()?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (SIMBOT__*)
            .add_source(Environment::with_prefix("SIMBOT").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Builder pre-filled with every default
    pub fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>> {
        let builder = Config::builder()
            // Engine defaults
            .set_default("engine.symbol", "NIFTY")?
            .set_default("engine.initial_price", 22800.0)?
            .set_default("engine.tick_interval_ms", 2000)?
            .set_default("engine.timeframe", "5m")?
            .set_default("engine.candle_window", 60)?
            .set_default("engine.initial_candles", 40)?
            .set_default("engine.signal_log_cap", 50)?
            .set_default("engine.order_log_cap", 100)?
            // Market defaults
            .set_default("market.tick_max_move", 5.0)?
            .set_default("market.tick_volume_min", 10)?
            .set_default("market.tick_volume_max", 120)?
            .set_default("market.seal_max_delta", 25.0)?
            .set_default("market.seal_max_wick", 12.0)?
            .set_default("market.seal_volume_min", 1000)?
            .set_default("market.seal_volume_max", 5000)?
            .set_default("market.price_decimals", 2)?
            // Indicator defaults
            .set_default("indicators.rsi_period", 14)?
            .set_default("indicators.decimals", 2)?
            .set_default("indicators.macd_sensitivity", 0.01)?
            .set_default("indicators.adx_move_threshold", 2.0)?
            .set_default("indicators.adx_step", 0.6)?
            .set_default("indicators.adx_decay", 0.3)?
            .set_default("indicators.adx_min", 10.0)?
            .set_default("indicators.adx_max", 100.0)?
            // Options defaults
            .set_default("options.strike_step", 50.0)?
            .set_default("options.strikes_each_side", 5)?
            .set_default("options.distance_scale", 100.0)?
            .set_default("options.premium_sensitivity", 0.5)?
            .set_default("options.premium_noise", 2.0)?
            .set_default("options.iv_noise", 0.2)?
            .set_default("options.oi_noise", 500)?
            .set_default("options.oi_noise_atm", 2500)?
            // Risk defaults
            .set_default("risk.initial_equity", 1_000_000.0)?
            .set_default("risk.stop_loss_threshold", -5000.0)?
            // Strategy defaults
            .set_default("strategy.lot_size", 50)?
            .set_default("strategy.rsi_buy_below", 40.0)?
            .set_default("strategy.rsi_sell_above", 70.0)?
            .set_default("strategy.macd_buy_above", 0.0)?
            .set_default("strategy.macd_sell_below", 0.0)?
            .set_default("strategy.adx_buy_above", 25.0)?
            .set_default("strategy.strategy_tag", "Confluence")?
            // Forecast defaults
            .set_default("forecast.enabled", false)?
            .set_default("forecast.timeout_ms", 1500)?
            .set_default("forecast.lookback", 5)?
            // Broker defaults
            .set_default("broker.enabled", false)?
            .set_default("broker.name", "paper")?
            // Dashboard defaults
            .set_default("dashboard.bind", "127.0.0.1:8080")?
            .set_default("dashboard.heartbeat_secs", 15)?
            // Logging defaults
            .set_default("logging.json", false)?
            .set_default("logging.filter", "info")?;

        Ok(builder)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.strategy.lot_size == 0 {
            bail!("strategy.lot_size must be positive");
        }
        if self.engine.tick_interval_ms == 0 {
            bail!("engine.tick_interval_ms must be positive");
        }
        if self.engine.candle_window == 0 {
            bail!("engine.candle_window must be at least 1");
        }
        if !(self.engine.initial_price.is_finite() && self.engine.initial_price > 0.0) {
            bail!("engine.initial_price must be a positive number");
        }
        if self.indicators.rsi_period == 0 {
            bail!("indicators.rsi_period must be positive");
        }
        if self.indicators.adx_min > self.indicators.adx_max {
            bail!("indicators.adx_min must not exceed indicators.adx_max");
        }
        Ok(())
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "symbol={} timeframe={} tick_ms={} window={} lot={} stop_loss={:.0} forecast={} broker={} seed={:?}",
            self.engine.symbol,
            self.engine.timeframe,
            self.engine.tick_interval_ms,
            self.engine.candle_window,
            self.strategy.lot_size,
            self.risk.stop_loss_threshold,
            self.forecast.enabled,
            if self.broker.enabled { self.broker.name.as_str() } else { "off" },
            self.engine.seed,
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
