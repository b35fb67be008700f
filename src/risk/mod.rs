//! Risk Manager - Mark-to-market, stop-loss and portfolio aggregation
//!
//! Implements:
//! - Per-position mark-to-market against the single reference price
//! - Absolute stop-loss liquidation (runs every tick, before any entries)
//! - Emergency liquidation of the whole book
//! - Overview aggregation: unrealized, total PnL, peak equity, max drawdown
//!
//! Every position is valued against the primary instrument's close. Equity
//! only moves when PnL is realized on a close.

use serde::Deserialize;
use tracing::{info, warn};

use crate::types::{round_to, Emitted, Order, OrderSide, Overview, Position, Signal};

/// Strategy tag on stop-loss audit signals
pub const RISK_STRATEGY_TAG: &str = "Risk Management";
/// Strategy tag on emergency liquidation audit signals
pub const SYSTEM_STRATEGY_TAG: &str = "System";

/// Risk configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    pub initial_equity: f64,
    /// Positions with PnL strictly below this are force-closed
    pub stop_loss_threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            initial_equity: 1_000_000.0,
            stop_loss_threshold: -5000.0,
        }
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    EmergencyStop,
    Signal,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "STOP_LOSS"),
            ExitReason::EmergencyStop => write!(f, "EMERGENCY_STOP"),
            ExitReason::Signal => write!(f, "SIGNAL"),
        }
    }
}

/// A position closed at a price, with the PnL realized into equity
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPosition {
    pub position: Position,
    pub order: Order,
    pub realized: f64,
    pub reason: ExitReason,
}

/// Close `position` at `price`, realizing its PnL into `overview.equity`
pub fn close_position(
    overview: &mut Overview,
    mut position: Position,
    price: f64,
    time: &str,
    reason: ExitReason,
) -> ClosedPosition {
    let realized = position.pnl_at(price);
    position.ltp = price;
    position.pnl = realized;
    overview.equity += realized;

    let order = Order::executed(time, &position.symbol, OrderSide::Sell, position.quantity, price);
    ClosedPosition {
        position,
        order,
        realized,
        reason,
    }
}

pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Fresh overview at the configured starting equity
    pub fn initial_overview(&self) -> Overview {
        Overview::new(self.config.initial_equity)
    }

    /// Revalue every open position at `price`
    pub fn mark_to_market(&self, positions: &mut [Position], price: f64) {
        for position in positions.iter_mut() {
            position.ltp = price;
            position.pnl = position.pnl_at(price);
        }
    }

    /// Force-close every position whose PnL is below the threshold.
    ///
    /// Positions must already be marked to `price`.
    pub fn apply_stop_loss(
        &self,
        positions: &mut Vec<Position>,
        overview: &mut Overview,
        price: f64,
        time: &str,
    ) -> Emitted {
        let threshold = self.config.stop_loss_threshold;
        let (breached, kept): (Vec<Position>, Vec<Position>) =
            positions.drain(..).partition(|p| p.pnl < threshold);
        *positions = kept;

        let mut emitted = Emitted::default();
        for position in breached {
            let closed = close_position(overview, position, price, time, ExitReason::StopLoss);
            warn!(
                symbol = %closed.position.symbol,
                pnl = closed.realized,
                threshold = threshold,
                price = price,
                "[RISK] Stop-loss liquidation"
            );
            emitted.signals.push(Signal {
                time: time.to_string(),
                strategy: RISK_STRATEGY_TAG.to_string(),
                action: "STOP LOSS".to_string(),
                instrument: closed.position.symbol.clone(),
                reason: format!(
                    "PnL {:.2} breached stop-loss {:.2}; closed {} @ {:.2}",
                    closed.realized, threshold, closed.position.quantity, price
                ),
            });
            emitted.orders.push(closed.order);
        }
        emitted
    }

    /// Close the whole book. Emits nothing when there is nothing to close.
    pub fn liquidate_all(
        &self,
        positions: &mut Vec<Position>,
        overview: &mut Overview,
        price: f64,
        time: &str,
    ) -> Emitted {
        let mut emitted = Emitted::default();
        if positions.is_empty() {
            return emitted;
        }

        let mut realized = 0.0;
        let count = positions.len();
        for position in positions.drain(..) {
            let closed = close_position(overview, position, price, time, ExitReason::EmergencyStop);
            realized += closed.realized;
            emitted.orders.push(closed.order);
        }

        warn!(
            positions = count,
            realized = realized,
            price = price,
            "[RISK] Emergency liquidation"
        );
        emitted.signals.push(Signal {
            time: time.to_string(),
            strategy: SYSTEM_STRATEGY_TAG.to_string(),
            action: "EMERGENCY EXIT".to_string(),
            instrument: "ALL".to_string(),
            reason: format!(
                "Emergency stop: liquidated {} position(s) @ {:.2}, realized {:.2}",
                count, price, realized
            ),
        });
        emitted
    }

    /// Recompute the overview from the remaining positions.
    ///
    /// Peak equity and max drawdown only ever grow.
    pub fn aggregate(&self, positions: &[Position], overview: &mut Overview) {
        let unrealized: f64 = positions.iter().map(|p| p.pnl).sum();
        overview.unrealized_pnl = round_to(unrealized, 2);
        overview.total_pnl = round_to(overview.realized_pnl() + unrealized, 2);

        let current = overview.equity + unrealized;
        if current > overview.peak_equity {
            overview.peak_equity = current;
        }
        let drawdown = overview.peak_equity - current;
        if drawdown > overview.max_drawdown {
            info!(drawdown = drawdown, peak = overview.peak_equity, "[RISK] New max drawdown");
            overview.max_drawdown = drawdown;
        }
    }
}

impl Default for RiskManager {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> Vec<Position> {
        vec![
            Position::open("NIFTY", 50, 22800.0),
            Position::open("NIFTY", 100, 22700.0),
        ]
    }

    #[test]
    fn test_mark_to_market() {
        let rm = RiskManager::default();
        let mut positions = book();
        rm.mark_to_market(&mut positions, 22750.0);
        assert_eq!(positions[0].pnl, -2500.0);
        assert_eq!(positions[1].pnl, 5000.0);
        assert!(positions.iter().all(|p| p.ltp == 22750.0));
    }

    #[test]
    fn test_stop_loss_closes_only_breached() {
        let rm = RiskManager::default();
        let mut overview = rm.initial_overview();
        let mut positions = vec![
            Position::open("NIFTY", 50, 22900.0),
            Position::open("NIFTY", 50, 22790.0),
        ];
        // First: (22790 - 22900) * 50 = -5500 < -5000
        rm.mark_to_market(&mut positions, 22790.0);
        let emitted = rm.apply_stop_loss(&mut positions, &mut overview, 22790.0, "10:00");

        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].avg_price, 22790.0);
        assert_eq!(emitted.orders.len(), 1);
        assert_eq!(emitted.orders[0].side, OrderSide::Sell);
        assert_eq!(emitted.orders[0].price, 22790.0);
        assert_eq!(emitted.signals.len(), 1);
        assert_eq!(emitted.signals[0].strategy, RISK_STRATEGY_TAG);
        assert_eq!(overview.equity, 1_000_000.0 - 5500.0);
    }

    #[test]
    fn test_stop_loss_threshold_is_strict() {
        let rm = RiskManager::default();
        let mut overview = rm.initial_overview();
        let mut positions = vec![Position::open("NIFTY", 50, 22900.0)];
        // Exactly -5000 stays open
        rm.mark_to_market(&mut positions, 22800.0);
        let emitted = rm.apply_stop_loss(&mut positions, &mut overview, 22800.0, "10:00");
        assert!(emitted.is_empty());
        assert_eq!(positions.len(), 1);
    }

    #[test]
    fn test_liquidate_all() {
        let rm = RiskManager::default();
        let mut overview = rm.initial_overview();
        let mut positions = book();
        rm.mark_to_market(&mut positions, 22750.0);
        let emitted = rm.liquidate_all(&mut positions, &mut overview, 22750.0, "10:00");

        assert!(positions.is_empty());
        assert_eq!(emitted.orders.len(), 2);
        assert!(emitted.orders.iter().all(|o| o.side == OrderSide::Sell));
        assert_eq!(emitted.signals.len(), 1);
        assert_eq!(emitted.signals[0].strategy, SYSTEM_STRATEGY_TAG);
        assert_eq!(overview.equity, 1_000_000.0 + 2500.0);
    }

    #[test]
    fn test_liquidate_empty_book_is_silent() {
        let rm = RiskManager::default();
        let mut overview = rm.initial_overview();
        let mut positions = Vec::new();
        let emitted = rm.liquidate_all(&mut positions, &mut overview, 22750.0, "10:00");
        assert!(emitted.is_empty());
        assert_eq!(overview, rm.initial_overview());
    }

    #[test]
    fn test_aggregate_peak_and_drawdown_monotonic() {
        let rm = RiskManager::default();
        let mut overview = rm.initial_overview();
        let mut positions = vec![Position::open("NIFTY", 50, 22800.0)];

        rm.mark_to_market(&mut positions, 22900.0);
        rm.aggregate(&positions, &mut overview);
        assert_eq!(overview.unrealized_pnl, 5000.0);
        assert_eq!(overview.total_pnl, 5000.0);
        assert_eq!(overview.peak_equity, 1_005_000.0);
        assert_eq!(overview.max_drawdown, 0.0);

        rm.mark_to_market(&mut positions, 22700.0);
        rm.aggregate(&positions, &mut overview);
        assert_eq!(overview.peak_equity, 1_005_000.0);
        assert_eq!(overview.max_drawdown, 10_000.0);

        // Recovery does not shrink drawdown
        rm.mark_to_market(&mut positions, 22850.0);
        rm.aggregate(&positions, &mut overview);
        assert_eq!(overview.max_drawdown, 10_000.0);
        assert_eq!(overview.peak_equity, 1_005_000.0);
    }

    #[test]
    fn test_close_position_realizes_pnl() {
        let mut overview = Overview::new(1000.0);
        let closed = close_position(
            &mut overview,
            Position::open("NIFTY", 10, 100.0),
            110.0,
            "t",
            ExitReason::Signal,
        );
        assert_eq!(closed.realized, 100.0);
        assert_eq!(overview.equity, 1100.0);
        assert_eq!(overview.realized_pnl(), 100.0);
        assert_eq!(closed.order.quantity, 10);
    }
}
