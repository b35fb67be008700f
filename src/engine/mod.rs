//! Tick Orchestrator
//!
//! One tick takes the snapshot by value and returns the next one. Order of
//! work inside a tick:
//!
//! 1. validate input (reject before touching anything)
//! 2. ask the forecaster, bounded by a timeout, if the bucket seals
//! 3. evolve price (mutate or seal)
//! 4. options surface + indicators
//! 5. mark-to-market, stop-loss
//! 6. emergency liquidation, if pending
//! 7. decision engine, if ACTIVE
//! 8. overview aggregation, log trimming
//!
//! Step 2 is the only await. Everything after it is synchronous.

pub mod seed;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::{EngineError, TickFailure};
use crate::indicators::IndicatorEngine;
use crate::market::{
    CandleSource, CandleStore, Forecast, Forecaster, PriceModel, PriceUpdate, TickStep,
};
use crate::options::OptionsSurface;
use crate::risk::RiskManager;
use crate::status::{self, Controllable};
use crate::strategy::{self, ConfluenceStrategy, IndicatorSnapshot, Strategy};
use crate::types::{
    Emitted, Indicator, OptionRow, Order, Overview, Position, Signal, Timeframe, TradingStatus,
};

/// Complete engine state between ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: String,
    pub candles: CandleStore,
    pub timeframe: Timeframe,
    /// When the in-progress candle's bucket opened
    pub last_boundary: DateTime<Utc>,
    pub positions: Vec<Position>,
    pub overview: Overview,
    pub indicators: Vec<Indicator>,
    pub options: Vec<OptionRow>,
    pub status: TradingStatus,
    /// Recent orders, oldest first
    pub orders: VecDeque<Order>,
    /// Recent signals, oldest first
    pub signals: VecDeque<Signal>,
    /// Sentiment attached to the last forecasted candle
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub tick_count: u64,
}

impl Snapshot {
    /// Reference price every position is marked against
    pub fn last_price(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    /// Check everything the pipeline relies on
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.candles.is_empty() {
            return Err(EngineError::EmptyCandleWindow);
        }
        for (index, candle) in self.candles.iter().enumerate() {
            if let Some(reason) = candle.violation() {
                return Err(EngineError::InvalidCandle { index, reason });
            }
        }

        for position in &self.positions {
            let reason = if position.quantity == 0 {
                Some("quantity must be positive".to_string())
            } else if !(position.avg_price.is_finite() && position.avg_price > 0.0) {
                Some(format!("average price {} is not a positive number", position.avg_price))
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(EngineError::InvalidPosition {
                    symbol: position.symbol.clone(),
                    reason,
                });
            }
        }

        let o = &self.overview;
        let fields = [
            ("equity", o.equity),
            ("initial_equity", o.initial_equity),
            ("peak_equity", o.peak_equity),
            ("max_drawdown", o.max_drawdown),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EngineError::InvalidOverview(format!("{} is {}", name, value)));
        }
        if o.max_drawdown < 0.0 {
            return Err(EngineError::InvalidOverview(format!(
                "max_drawdown {} is negative",
                o.max_drawdown
            )));
        }
        Ok(())
    }
}

impl Controllable for Snapshot {
    fn status(&self) -> TradingStatus {
        self.status
    }

    fn set_status(&mut self, status: TradingStatus) {
        self.status = status;
    }

    fn set_timeframe(&mut self, timeframe: Timeframe) {
        self.timeframe = timeframe;
    }
}

/// Result of a successful tick
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub snapshot: Snapshot,
    pub new_orders: Vec<Order>,
    pub new_signals: Vec<Signal>,
    /// Status after any automatic transition
    pub status: TradingStatus,
    pub price: PriceUpdate,
}

impl TickOutput {
    pub fn candle_source(&self) -> CandleSource {
        self.price.source
    }
}

/// Push onto a bounded log, dropping the oldest entries
fn push_bounded<T>(log: &mut VecDeque<T>, items: impl IntoIterator<Item = T>, cap: usize) {
    log.extend(items);
    while log.len() > cap {
        log.pop_front();
    }
}

/// The tick pipeline and the state it carries across ticks (RNG only)
pub struct Engine {
    config: AppConfig,
    price_model: PriceModel,
    indicators: IndicatorEngine,
    options: OptionsSurface,
    risk: RiskManager,
    strategy: Box<dyn Strategy>,
    forecaster: Arc<dyn Forecaster>,
    rng: StdRng,
}

impl Engine {
    pub fn new(config: AppConfig, forecaster: Arc<dyn Forecaster>) -> Self {
        let rng = match config.engine.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            price_model: PriceModel::new(config.market.clone()),
            indicators: IndicatorEngine::new(config.indicators.clone()),
            options: OptionsSurface::new(config.options.clone()),
            risk: RiskManager::new(config.risk.clone()),
            strategy: Box::new(ConfluenceStrategy::new(config.strategy.clone())),
            forecaster,
            rng,
            config,
        }
    }

    /// Swap the decision rules
    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Starting snapshot built from this engine's config and RNG
    pub fn initial_snapshot(&mut self, now: DateTime<Utc>) -> Snapshot {
        seed::initial_snapshot(&self.config, now, &mut self.rng)
    }

    /// Run one tick. On rejection the input snapshot comes back untouched.
    pub async fn tick(
        &mut self,
        snapshot: Snapshot,
        now: DateTime<Utc>,
    ) -> Result<TickOutput, TickFailure> {
        if let Err(err) = self.check(&snapshot) {
            error!(error = %err, tick = snapshot.tick_count, "[ENGINE] Tick rejected");
            return Err(TickFailure::new(snapshot, err));
        }

        let step = TickStep::decide(snapshot.timeframe, snapshot.last_boundary, now);
        let forecast = match step {
            TickStep::Seal => self.fetch_forecast(&snapshot.candles).await,
            TickStep::Mutate => None,
        };

        Ok(self.apply(snapshot, now, step, forecast))
    }

    fn check(&self, snapshot: &Snapshot) -> Result<(), EngineError> {
        if self.config.strategy.lot_size == 0 {
            return Err(EngineError::InvalidLotSize);
        }
        snapshot.validate()
    }

    /// Ask the forecaster. Errors, timeouts and `None` all mean fallback.
    async fn fetch_forecast(&self, candles: &CandleStore) -> Option<Forecast> {
        let recent = candles.last_n(self.config.forecast.lookback);
        let timeout = Duration::from_millis(self.config.forecast.timeout_ms);

        match tokio::time::timeout(timeout, self.forecaster.forecast(&recent)).await {
            Ok(Ok(Some(forecast))) => {
                debug!(
                    forecaster = self.forecaster.name(),
                    close = forecast.close,
                    "[ENGINE] Forecast received"
                );
                Some(forecast)
            }
            Ok(Ok(None)) => {
                debug!(forecaster = self.forecaster.name(), "[ENGINE] No forecast, using fallback");
                None
            }
            Ok(Err(e)) => {
                warn!(
                    forecaster = self.forecaster.name(),
                    error = %e,
                    "[ENGINE] Forecast failed, using fallback"
                );
                None
            }
            Err(_) => {
                warn!(
                    forecaster = self.forecaster.name(),
                    timeout_ms = self.config.forecast.timeout_ms,
                    "[ENGINE] Forecast timed out, using fallback"
                );
                None
            }
        }
    }

    /// Synchronous remainder of the tick. Input must already be validated.
    fn apply(
        &mut self,
        mut snapshot: Snapshot,
        now: DateTime<Utc>,
        step: TickStep,
        forecast: Option<Forecast>,
    ) -> TickOutput {
        let time = now.format("%H:%M:%S").to_string();
        let label = now.format("%H:%M").to_string();

        // Price evolution
        let price = match self.price_model.evolve(
            &mut snapshot.candles,
            step,
            forecast.as_ref(),
            &label,
            &mut self.rng,
        ) {
            Some(update) => update,
            // Unreachable after validation; treat as a flat tick
            None => PriceUpdate {
                previous_close: 0.0,
                close: 0.0,
                source: CandleSource::Mutated,
            },
        };
        if price.sealed() {
            snapshot.last_boundary = now;
            snapshot.sentiment = match price.source {
                CandleSource::Forecasted => forecast.and_then(|f| f.sentiment),
                _ => None,
            };
        }
        let close = price.close;

        // Derived market data
        self.options.update(&mut snapshot.options, close, &mut self.rng);
        let closes = snapshot.candles.closes();
        self.indicators
            .update(&mut snapshot.indicators, &closes, price.delta());

        // Positions and risk
        let mut emitted = Emitted::default();
        self.risk.mark_to_market(&mut snapshot.positions, close);
        emitted.append(self.risk.apply_stop_loss(
            &mut snapshot.positions,
            &mut snapshot.overview,
            close,
            &time,
        ));

        if snapshot.status == TradingStatus::EmergencyStop {
            emitted.append(self.risk.liquidate_all(
                &mut snapshot.positions,
                &mut snapshot.overview,
                close,
                &time,
            ));
            snapshot.status = status::after_liquidation(snapshot.status);
            info!(status = %snapshot.status, "[ENGINE] Emergency stop handled");
        }

        // Decisions
        if status::allows_entries(snapshot.status) {
            let readings = IndicatorSnapshot::from_indicators(&snapshot.indicators);
            let decision = self
                .strategy
                .decide(&readings, !snapshot.positions.is_empty());
            emitted.append(strategy::execute(
                &decision,
                self.strategy.name(),
                self.config.strategy.lot_size,
                &snapshot.symbol,
                &mut snapshot.positions,
                &mut snapshot.overview,
                close,
                &time,
            ));
        }

        self.risk.aggregate(&snapshot.positions, &mut snapshot.overview);

        push_bounded(
            &mut snapshot.orders,
            emitted.orders.iter().cloned(),
            self.config.engine.order_log_cap,
        );
        push_bounded(
            &mut snapshot.signals,
            emitted.signals.iter().cloned(),
            self.config.engine.signal_log_cap,
        );
        snapshot.tick_count += 1;

        debug!(
            tick = snapshot.tick_count,
            close = close,
            source = ?price.source,
            positions = snapshot.positions.len(),
            orders = emitted.orders.len(),
            signals = emitted.signals.len(),
            equity = snapshot.overview.equity,
            total_pnl = snapshot.overview.total_pnl,
            status = %snapshot.status,
            "[ENGINE] Tick complete"
        );

        let status = snapshot.status;
        TickOutput {
            snapshot,
            new_orders: emitted.orders,
            new_signals: emitted.signals,
            status,
            price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::NoForecaster;
    use crate::types::Candle;
    use chrono::Duration as ChronoDuration;

    fn engine() -> Engine {
        let mut config = AppConfig::default();
        config.engine.seed = Some(1);
        Engine::new(config, Arc::new(NoForecaster))
    }

    #[test]
    fn test_push_bounded() {
        let mut log: VecDeque<u32> = (0..3).collect();
        push_bounded(&mut log, 3..6, 4);
        assert_eq!(log, VecDeque::from(vec![2, 3, 4, 5]));
    }

    #[test]
    fn test_validate_rejects_bad_candle() {
        let mut e = engine();
        let mut snapshot = e.initial_snapshot(Utc::now());
        if let Some(c) = snapshot.candles.last_mut() {
            c.high = c.low - 1.0;
        }
        assert!(matches!(
            snapshot.validate(),
            Err(EngineError::InvalidCandle { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_quantity() {
        let mut e = engine();
        let mut snapshot = e.initial_snapshot(Utc::now());
        snapshot.positions.push(Position {
            quantity: 0,
            ..Position::open("NIFTY", 50, 22800.0)
        });
        assert!(matches!(
            snapshot.validate(),
            Err(EngineError::InvalidPosition { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejected_tick_returns_input() {
        let mut e = engine();
        let mut snapshot = e.initial_snapshot(Utc::now());
        snapshot.candles = CandleStore::new(10);
        let before = snapshot.clone();

        let failure = e.tick(snapshot, Utc::now()).await.unwrap_err();
        assert_eq!(failure.error, EngineError::EmptyCandleWindow);
        assert_eq!(failure.into_snapshot(), before);
    }

    #[tokio::test]
    async fn test_mutating_tick_keeps_window() {
        let mut e = engine();
        let now = Utc::now();
        let snapshot = e.initial_snapshot(now);
        let len = snapshot.candles.len();

        let out = e.tick(snapshot, now + ChronoDuration::seconds(2)).await.unwrap();
        assert_eq!(out.candle_source(), CandleSource::Mutated);
        assert_eq!(out.snapshot.candles.len(), len);
        assert_eq!(out.snapshot.last_boundary, now);
        assert_eq!(out.snapshot.tick_count, 1);
    }

    #[tokio::test]
    async fn test_sealing_tick_moves_boundary() {
        let mut e = engine();
        let start = Utc::now();
        let snapshot = e.initial_snapshot(start);
        let prior_close = snapshot.last_price().unwrap();
        let now = start + ChronoDuration::minutes(5);

        let out = e.tick(snapshot, now).await.unwrap();
        assert_eq!(out.candle_source(), CandleSource::Fallback);
        assert_eq!(out.snapshot.last_boundary, now);
        let last: &Candle = out.snapshot.candles.last().unwrap();
        assert_eq!(last.open, prior_close);
        assert!(last.is_valid());
    }

    #[tokio::test]
    async fn test_stopped_status_blocks_entries() {
        let mut e = engine();
        let mut snapshot = e.initial_snapshot(Utc::now());
        snapshot.status = TradingStatus::Stopped;
        snapshot.indicators = vec![
            Indicator::new("RSI (14)", 35.0),
            Indicator::new("MACD (12,26,9)", 50.0),
            Indicator::new("ADX (14)", 30.0),
        ];
        // Short window so RSI is held at 35
        snapshot.candles = CandleStore::from_candles(snapshot.candles.last_n(3), 10);

        let out = e.tick(snapshot, Utc::now()).await.unwrap();
        assert!(out.new_orders.is_empty());
        assert!(out.snapshot.positions.is_empty());
        assert_eq!(out.status, TradingStatus::Stopped);
    }
}
