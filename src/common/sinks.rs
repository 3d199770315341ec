//! Default collaborator implementations
//!
//! Real deployments wire their own sinks (desktop notifications, a database).
//! These defaults route alerts through the log and drop durable records after
//! logging them, so the engine runs standalone.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::errors::Result;
use super::traits::{AlertSink, PersistenceSink};
use super::types::{AlertSeverity, EquitySnapshot, Trade};

/// Alert sink that logs through `tracing` at the matching level
#[derive(Debug, Default, Clone)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn alert(&self, title: &str, message: &str, severity: AlertSeverity) {
        match severity {
            AlertSeverity::Info => info!("[{}] {}", title, message),
            AlertSeverity::Warning => warn!("[{}] {}", title, message),
            AlertSeverity::Critical => error!("[{}] {}", title, message),
        }
    }
}

/// Persistence sink that logs records and discards them
#[derive(Debug, Default, Clone)]
pub struct NullPersistenceSink;

#[async_trait]
impl PersistenceSink for NullPersistenceSink {
    async fn record_trade(&self, trade: Trade) -> Result<()> {
        debug!(
            "trade recorded: {} {} {} @ {}",
            trade.side, trade.quantity, trade.symbol, trade.price
        );
        Ok(())
    }

    async fn record_snapshot(&self, snapshot: EquitySnapshot) -> Result<()> {
        debug!("equity snapshot recorded: {}", snapshot.equity);
        Ok(())
    }
}
