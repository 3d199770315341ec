//! Trait definitions for the engine's external collaborators

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg(test)]
use mockall::automock;

use super::errors::Result;
use super::types::{Account, AlertSeverity, Bar, EquitySnapshot, OrderSpec, Position, Trade};

/// Abstract brokerage trading API
///
/// Absence is a valid outcome, not an error: `get_position` returns
/// `Ok(None)` when no position exists, keeping "no position" distinct from
/// "call failed".
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TradingApi: Send + Sync {
    /// Fetch the current account snapshot
    async fn get_account(&self) -> Result<Account>;

    /// Fetch the open position for a symbol, if any
    async fn get_position(&self, symbol: &str) -> Result<Option<Position>>;

    /// Submit an order, returning the brokerage order id
    async fn submit_order(&self, spec: &OrderSpec) -> Result<String>;

    /// Cancel every open order on the account
    async fn cancel_all_orders(&self) -> Result<()>;

    /// Fetch aggregated trade bars for a symbol over a time range
    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>>;
}

/// Sink for user-visible alerts
///
/// The engine never depends on how (or whether) the user sees them.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, title: &str, message: &str, severity: AlertSeverity);
}

/// Sink for durable append-only records
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn record_trade(&self, trade: Trade) -> Result<()>;

    async fn record_snapshot(&self, snapshot: EquitySnapshot) -> Result<()>;
}
