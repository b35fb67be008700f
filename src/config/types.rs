//! Configuration types and re-exports

pub use crate::indicators::IndicatorConfig;
pub use crate::market::{ForecastConfig, MarketConfig};
pub use crate::options::OptionsConfig;
pub use crate::risk::RiskConfig;
pub use crate::strategy::StrategyConfig;
