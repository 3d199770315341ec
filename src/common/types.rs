//! Unified domain types used across the engine and venue clients

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Brokerage venue identifier (paper or live account)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Paper,
    Live,
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Venue::Paper => write!(f, "paper"),
            Venue::Live => write!(f, "live"),
        }
    }
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Connection status of the market-data stream
///
/// A single process-wide value reflecting the stream client's latest
/// transition, published over a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Error,
}

/// Where a price update came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Stream,
    Rest,
}

/// A single live price observation for the subscribed symbol
///
/// Transient: consumed immediately by the decision engine, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: Decimal,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Trade size; zero for quote-derived updates
    #[serde(default)]
    pub volume: u64,
    pub source: PriceSource,
}

/// Point-in-time account snapshot fetched from the brokerage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub equity: Decimal,
    pub cash: Decimal,
    pub buying_power: Decimal,
    pub portfolio_value: Decimal,
    pub day_trade_count: u32,
    pub pattern_day_trader: bool,
}

/// An open position in the traded symbol
///
/// At most one open position exists at any time (single-symbol strategy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    /// Epoch milliseconds of the first observed fill
    pub entry_time: i64,
    /// Limit-sell target, when one has been placed
    pub target_price: Option<Decimal>,
}

impl Position {
    /// Unrealized profit/loss: (current − entry) × quantity
    pub fn unrealized_pnl(&self) -> Decimal {
        (self.current_price - self.entry_price) * self.quantity
    }

    /// Unrealized profit/loss as a percentage of the entry price
    pub fn unrealized_pnl_percent(&self) -> Decimal {
        (self.current_price - self.entry_price) / self.entry_price * Decimal::from(100)
    }

    /// Current market value of the position
    pub fn market_value(&self) -> Decimal {
        self.current_price * self.quantity
    }

    /// Whole days elapsed since entry, relative to `now_ms`
    pub fn age_in_days(&self, now_ms: i64) -> i64 {
        (now_ms - self.entry_time) / 86_400_000
    }
}

/// A completed buy or forced sell, recorded by the engine
///
/// Immutable once created; ownership passes to the persistence sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Epoch milliseconds
    pub timestamp: i64,
    #[serde(default)]
    pub order_id: Option<String>,
    /// Realized P&L, present on sells
    #[serde(default)]
    pub pnl: Option<Decimal>,
    #[serde(default)]
    pub pnl_percent: Option<Decimal>,
}

/// Periodic equity sample forwarded to the persistence sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub equity: Decimal,
    pub day_pnl: Decimal,
    pub day_pnl_percent: Decimal,
}

/// An aggregated trade bar returned by the brokerage data API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    /// The bar's own volume-weighted price, when the venue provides it
    #[serde(default)]
    pub vwap: Option<Decimal>,
}

impl Bar {
    /// Price used for VWAP aggregation: the bar's own weighted price when
    /// present, the closing price otherwise.
    pub fn weighted_price(&self) -> Decimal {
        self.vwap.unwrap_or(self.close)
    }
}

/// Order type accepted by the brokerage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// How long an order remains active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
    Gtc,
}

/// Order size: share quantity or currency notional
#[derive(Debug, Clone, PartialEq)]
pub enum OrderAmount {
    Quantity(Decimal),
    Notional(Decimal),
}

/// Specification for a brokerage order submission
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub symbol: String,
    pub amount: OrderAmount,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub limit_price: Option<Decimal>,
}

impl OrderSpec {
    /// Market buy for a currency notional, good for the day
    pub fn market_buy_notional(symbol: impl Into<String>, notional: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            amount: OrderAmount::Notional(notional),
            side: Side::Buy,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Day,
            limit_price: None,
        }
    }

    /// Market sell of a share quantity, good for the day
    pub fn market_sell(symbol: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            amount: OrderAmount::Quantity(quantity),
            side: Side::Sell,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Day,
            limit_price: None,
        }
    }

    /// Limit sell at a target price, good till canceled
    pub fn limit_sell(symbol: impl Into<String>, quantity: Decimal, limit_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            amount: OrderAmount::Quantity(quantity),
            side: Side::Sell,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            limit_price: Some(limit_price),
        }
    }
}

/// Alert severity forwarded to the alert sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}
