//! Decision Engine - Rule-based confluence entries and exits
//!
//! Entry ("confluence buy"): flat book, RSI oversold, MACD positive, ADX trending.
//! Exit ("confluence sell"): any open position and either RSI overbought or
//! MACD negative. Entry and exit are mutually exclusive within a tick.

use serde::Deserialize;
use tracing::info;

use crate::risk::{close_position, ExitReason};
use crate::types::{
    Emitted, Indicator, IndicatorCategory, Order, OrderSide, Overview, Position, Signal,
};

/// Neutral readings used when an indicator is missing
pub const NEUTRAL_RSI: f64 = 50.0;
pub const NEUTRAL_MACD: f64 = 0.0;
pub const NEUTRAL_ADX: f64 = 20.0;

/// Strategy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Fixed quantity of every entry
    pub lot_size: u32,
    pub rsi_buy_below: f64,
    pub rsi_sell_above: f64,
    pub macd_buy_above: f64,
    pub macd_sell_below: f64,
    pub adx_buy_above: f64,
    /// Strategy tag stamped on entry/exit signals
    pub strategy_tag: String,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            lot_size: 50,
            rsi_buy_below: 40.0,
            rsi_sell_above: 70.0,
            macd_buy_above: 0.0,
            macd_sell_below: 0.0,
            adx_buy_above: 25.0,
            strategy_tag: "Confluence".to_string(),
        }
    }
}

/// The three readings the rules look at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub macd: f64,
    pub adx: f64,
}

impl Default for IndicatorSnapshot {
    fn default() -> Self {
        Self {
            rsi: NEUTRAL_RSI,
            macd: NEUTRAL_MACD,
            adx: NEUTRAL_ADX,
        }
    }
}

impl IndicatorSnapshot {
    /// First indicator of each category wins; missing ones stay neutral
    pub fn from_indicators(indicators: &[Indicator]) -> Self {
        let find = |category: IndicatorCategory| {
            indicators
                .iter()
                .find(|i| i.category() == category)
                .map(|i| i.value)
                .filter(|v| v.is_finite())
        };
        Self {
            rsi: find(IndicatorCategory::Rsi).unwrap_or(NEUTRAL_RSI),
            macd: find(IndicatorCategory::Macd).unwrap_or(NEUTRAL_MACD),
            adx: find(IndicatorCategory::Adx).unwrap_or(NEUTRAL_ADX),
        }
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Enter { reason: String },
    Exit { reason: String },
    Hold,
}

/// Decision seam. Implementations must be pure over their inputs.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn decide(&self, readings: &IndicatorSnapshot, has_position: bool) -> Decision;
}

/// RSI / MACD / ADX confluence rules
#[derive(Debug, Clone, Default)]
pub struct ConfluenceStrategy {
    config: StrategyConfig,
}

impl ConfluenceStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }
}

impl Strategy for ConfluenceStrategy {
    fn name(&self) -> &str {
        &self.config.strategy_tag
    }

    fn decide(&self, r: &IndicatorSnapshot, has_position: bool) -> Decision {
        let c = &self.config;
        if !has_position {
            if r.rsi < c.rsi_buy_below && r.macd > c.macd_buy_above && r.adx > c.adx_buy_above {
                return Decision::Enter {
                    reason: format!(
                        "RSI {:.2} < {:.0}, MACD {:.2} > {:.0}, ADX {:.2} > {:.0}",
                        r.rsi, c.rsi_buy_below, r.macd, c.macd_buy_above, r.adx, c.adx_buy_above
                    ),
                };
            }
            return Decision::Hold;
        }

        if r.rsi > c.rsi_sell_above {
            return Decision::Exit {
                reason: format!("RSI {:.2} > {:.0} (overbought)", r.rsi, c.rsi_sell_above),
            };
        }
        if r.macd < c.macd_sell_below {
            return Decision::Exit {
                reason: format!("MACD {:.2} < {:.0} (momentum lost)", r.macd, c.macd_sell_below),
            };
        }
        Decision::Hold
    }
}

/// Apply a decision to the book at `price`.
///
/// Entries open exactly one position of `lot_size`; exits close the first
/// open position and realize its PnL.
#[allow(clippy::too_many_arguments)]
pub fn execute(
    decision: &Decision,
    strategy_tag: &str,
    lot_size: u32,
    symbol: &str,
    positions: &mut Vec<Position>,
    overview: &mut Overview,
    price: f64,
    time: &str,
) -> Emitted {
    let mut emitted = Emitted::default();
    match decision {
        Decision::Enter { reason } => {
            positions.push(Position::open(symbol, lot_size, price));
            info!(symbol = %symbol, quantity = lot_size, price = price, "[STRATEGY] BUY");
            emitted
                .orders
                .push(Order::executed(time, symbol, OrderSide::Buy, lot_size, price));
            emitted.signals.push(Signal {
                time: time.to_string(),
                strategy: strategy_tag.to_string(),
                action: "BUY".to_string(),
                instrument: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Decision::Exit { reason } => {
            if positions.is_empty() {
                return emitted;
            }
            let position = positions.remove(0);
            let closed = close_position(overview, position, price, time, ExitReason::Signal);
            info!(
                symbol = %closed.position.symbol,
                quantity = closed.position.quantity,
                price = price,
                realized = closed.realized,
                "[STRATEGY] SELL"
            );
            emitted.signals.push(Signal {
                time: time.to_string(),
                strategy: strategy_tag.to_string(),
                action: "SELL".to_string(),
                instrument: closed.position.symbol.clone(),
                reason: format!("{}; realized {:.2}", reason, closed.realized),
            });
            emitted.orders.push(closed.order);
        }
        Decision::Hold => {}
    }
    emitted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings(rsi: f64, macd: f64, adx: f64) -> IndicatorSnapshot {
        IndicatorSnapshot { rsi, macd, adx }
    }

    #[test]
    fn test_missing_indicators_are_neutral() {
        let r = IndicatorSnapshot::from_indicators(&[Indicator::new("Stochastic (14,3)", 80.0)]);
        assert_eq!(r, IndicatorSnapshot::default());
        assert_eq!(r.rsi, 50.0);
        assert_eq!(r.macd, 0.0);
        assert_eq!(r.adx, 20.0);
    }

    #[test]
    fn test_readings_matched_by_category() {
        let r = IndicatorSnapshot::from_indicators(&[
            Indicator::new("ADX (14)", 31.0),
            Indicator::new("MACD (12,26,9)", -2.0),
            Indicator::new("RSI (14)", 33.0),
        ]);
        assert_eq!(r, readings(33.0, -2.0, 31.0));
    }

    #[test]
    fn test_entry_requires_full_confluence() {
        let s = ConfluenceStrategy::default();
        assert!(matches!(s.decide(&readings(35.0, 1.0, 30.0), false), Decision::Enter { .. }));
        assert_eq!(s.decide(&readings(45.0, 1.0, 30.0), false), Decision::Hold);
        assert_eq!(s.decide(&readings(35.0, 0.0, 30.0), false), Decision::Hold);
        assert_eq!(s.decide(&readings(35.0, 1.0, 25.0), false), Decision::Hold);
    }

    #[test]
    fn test_no_entry_while_holding() {
        let s = ConfluenceStrategy::default();
        assert_eq!(s.decide(&readings(35.0, 1.0, 30.0), true), Decision::Hold);
    }

    #[test]
    fn test_exit_conditions() {
        let s = ConfluenceStrategy::default();
        assert!(matches!(s.decide(&readings(75.0, 1.0, 30.0), true), Decision::Exit { .. }));
        assert!(matches!(s.decide(&readings(50.0, -0.5, 30.0), true), Decision::Exit { .. }));
        assert_eq!(s.decide(&readings(50.0, 0.5, 30.0), true), Decision::Hold);
        // Exit rules never fire on a flat book
        assert_eq!(s.decide(&readings(75.0, -1.0, 30.0), false), Decision::Hold);
    }

    #[test]
    fn test_execute_entry_and_exit() {
        let mut positions = Vec::new();
        let mut overview = Overview::new(1_000_000.0);
        let enter = Decision::Enter { reason: "test".into() };
        let emitted = execute(
            &enter,
            "Confluence",
            50,
            "NIFTY",
            &mut positions,
            &mut overview,
            22800.0,
            "10:00",
        );
        assert_eq!(positions.len(), 1);
        assert_eq!(emitted.orders[0].side, OrderSide::Buy);
        assert_eq!(emitted.orders[0].quantity, 50);
        assert_eq!(overview.equity, 1_000_000.0);

        positions.push(Position::open("NIFTY", 50, 23000.0));
        let exit = Decision::Exit { reason: "test".into() };
        let emitted = execute(
            &exit,
            "Confluence",
            50,
            "NIFTY",
            &mut positions,
            &mut overview,
            22900.0,
            "10:05",
        );
        // First position closed: (22900 - 22800) * 50
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].avg_price, 23000.0);
        assert_eq!(emitted.orders[0].side, OrderSide::Sell);
        assert_eq!(overview.equity, 1_005_000.0);
        assert_eq!(emitted.signals[0].action, "SELL");
    }

    #[test]
    fn test_execute_hold_is_silent() {
        let mut positions = Vec::new();
        let mut overview = Overview::new(1.0);
        let emitted =
            execute(&Decision::Hold, "C", 1, "X", &mut positions, &mut overview, 1.0, "t");
        assert!(emitted.is_empty());
    }
}
