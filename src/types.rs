//! Core types used throughout SimBot
//!
//! Defines the market, portfolio and audit records that make up a tick snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported candle timeframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "1h")]
    Hour1,
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Min5
    }
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::Min1,
        Timeframe::Min5,
        Timeframe::Min15,
        Timeframe::Hour1,
    ];

    /// Get duration in seconds
    pub fn duration_secs(&self) -> u64 {
        match self {
            Timeframe::Min1 => 60,
            Timeframe::Min5 => 5 * 60,
            Timeframe::Min15 => 15 * 60,
            Timeframe::Hour1 => 60 * 60,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.duration_secs() as i64)
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "1min" => Some(Timeframe::Min1),
            "5m" | "5min" => Some(Timeframe::Min5),
            "15m" | "15min" => Some(Timeframe::Min15),
            "1h" | "1hour" | "60m" => Some(Timeframe::Hour1),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Min1 => write!(f, "1m"),
            Timeframe::Min5 => write!(f, "5m"),
            Timeframe::Min15 => write!(f, "15m"),
            Timeframe::Hour1 => write!(f, "1h"),
        }
    }
}

/// OHLCV bar.
///
/// Mutated in place while its timeframe bucket is open, frozen once sealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Display label for the bucket (e.g. "10:35")
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Flat candle at a single price
    pub fn flat(time: impl Into<String>, price: f64) -> Self {
        Self {
            time: time.into(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }

    /// `low <= min(open, close) <= max(open, close) <= high` and `volume >= 0`
    pub fn is_valid(&self) -> bool {
        let finite = [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
            && self.volume >= 0.0
    }

    /// Describe the first violated invariant, if any
    pub fn violation(&self) -> Option<String> {
        if ![self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
        {
            return Some("non-finite field".to_string());
        }
        if self.low > self.open.min(self.close) {
            return Some(format!(
                "low ({}) above body ({}..{})",
                self.low, self.open, self.close
            ));
        }
        if self.open.max(self.close) > self.high {
            return Some(format!(
                "high ({}) below body ({}..{})",
                self.high, self.open, self.close
            ));
        }
        if self.volume < 0.0 {
            return Some(format!("volume ({}) must be >= 0", self.volume));
        }
        None
    }
}

/// Open long position in the simulated instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Lot size; always positive (no shorting, no partial fills)
    pub quantity: u32,
    pub avg_price: f64,
    /// Last traded price used for mark-to-market
    pub ltp: f64,
    /// Unrealized PnL at `ltp`
    pub pnl: f64,
}

impl Position {
    pub fn open(symbol: impl Into<String>, quantity: u32, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            avg_price: price,
            ltp: price,
            pnl: 0.0,
        }
    }

    /// PnL if the position were valued at `price`
    pub fn pnl_at(&self, price: f64) -> f64 {
        (price - self.avg_price) * self.quantity as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order status. The engine only ever emits `Executed`; the other states can
/// appear in snapshots that were edited from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Executed,
    Pending,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Executed => write!(f, "EXECUTED"),
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Order record (immutable once created)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub time: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u32,
    pub price: f64,
    pub status: OrderStatus,
}

impl Order {
    pub fn executed(
        time: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: u32,
        price: f64,
    ) -> Self {
        Self {
            time: time.into(),
            symbol: symbol.into(),
            side,
            quantity,
            price,
            status: OrderStatus::Executed,
        }
    }
}

/// Portfolio overview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    /// Realized cash; only trade exits change it
    pub equity: f64,
    pub initial_equity: f64,
    /// (equity - initial_equity) + unrealized
    pub total_pnl: f64,
    pub unrealized_pnl: f64,
    /// High-water mark of equity + unrealized
    pub peak_equity: f64,
    /// High-water mark of peak - current
    pub max_drawdown: f64,
}

impl Overview {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            equity: initial_equity,
            initial_equity,
            total_pnl: 0.0,
            unrealized_pnl: 0.0,
            peak_equity: initial_equity,
            max_drawdown: 0.0,
        }
    }

    pub fn realized_pnl(&self) -> f64 {
        self.equity - self.initial_equity
    }

    /// Mark-to-market portfolio value
    pub fn current_total(&self) -> f64 {
        self.equity + self.unrealized_pnl
    }
}

/// Indicator category, derived from the indicator name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorCategory {
    Rsi,
    Macd,
    Adx,
    Other,
}

impl IndicatorCategory {
    /// Categorise by name substring ("RSI (14)" -> Rsi)
    pub fn of(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        if upper.contains("RSI") {
            IndicatorCategory::Rsi
        } else if upper.contains("MACD") {
            IndicatorCategory::Macd
        } else if upper.contains("ADX") {
            IndicatorCategory::Adx
        } else {
            IndicatorCategory::Other
        }
    }
}

impl fmt::Display for IndicatorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorCategory::Rsi => write!(f, "RSI"),
            IndicatorCategory::Macd => write!(f, "MACD"),
            IndicatorCategory::Adx => write!(f, "ADX"),
            IndicatorCategory::Other => write!(f, "OTHER"),
        }
    }
}

/// Named indicator reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub name: String,
    pub value: f64,
}

impl Indicator {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn category(&self) -> IndicatorCategory {
        IndicatorCategory::of(&self.name)
    }
}

/// One strike of the options ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionRow {
    pub strike: f64,
    pub call_oi: u64,
    pub call_iv: f64,
    pub call_ltp: f64,
    pub put_ltp: f64,
    pub put_iv: f64,
    pub put_oi: u64,
}

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub time: String,
    pub strategy: String,
    pub action: String,
    pub instrument: String,
    pub reason: String,
}

/// Orders and signals produced by one step of a tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Emitted {
    pub orders: Vec<Order>,
    pub signals: Vec<Signal>,
}

impl Emitted {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.signals.is_empty()
    }

    pub fn append(&mut self, mut other: Emitted) {
        self.orders.append(&mut other.orders);
        self.signals.append(&mut other.signals);
    }
}

/// Process-wide trading gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingStatus {
    Active,
    Stopped,
    EmergencyStop,
}

impl Default for TradingStatus {
    fn default() -> Self {
        TradingStatus::Active
    }
}

impl fmt::Display for TradingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingStatus::Active => write!(f, "ACTIVE"),
            TradingStatus::Stopped => write!(f, "STOPPED"),
            TradingStatus::EmergencyStop => write!(f, "EMERGENCY_STOP"),
        }
    }
}

/// Round to a fixed number of decimals for display stability
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
