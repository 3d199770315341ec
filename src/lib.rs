//! AlpacaRebound Library
//!
//! A headless trading engine that streams Alpaca market data for a single
//! symbol and trades a VWAP rebound strategy with a drawdown circuit-breaker.

pub mod alpaca;
pub mod common;
pub mod config;
pub mod engine;

// Re-export commonly used types
pub use alpaca::rest::{AlpacaConnector, AlpacaRestClient};
pub use alpaca::stream::AlpacaStreamClient;
pub use common::errors::{ClientError, Result};
pub use common::sinks::{LogAlertSink, NullPersistenceSink};
pub use common::traits::{AlertSink, PersistenceSink, TradingApi};
pub use common::types::{
    Account, AlertSeverity, Bar, ConnectionState, EquitySnapshot, OrderAmount, OrderSpec,
    OrderType, Position, PriceSource, PriceUpdate, Side, TimeInForce, Trade, Venue,
};
pub use config::types::{AlpacaConfig, ApiCredentials, AppConfig, EngineSettings, TradingConfig};
pub use config::ConfigStore;
pub use engine::{DecisionEngine, DrawdownBreach, RiskGuard};
