//! Observable configuration store
//!
//! Holds the authoritative `TradingConfig` and broadcasts full-replacement
//! updates over a watch channel. The engine reads a fresh snapshot every
//! decision pass and treats every field as authoritative.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use super::types::TradingConfig;

/// Shared, observable trading configuration
#[derive(Debug, Clone)]
pub struct ConfigStore {
    tx: Arc<watch::Sender<TradingConfig>>,
}

impl ConfigStore {
    /// Create a store seeded with an initial configuration
    pub fn new(initial: TradingConfig) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Current configuration snapshot
    pub fn get(&self) -> TradingConfig {
        self.tx.borrow().clone()
    }

    /// Replace the configuration and notify subscribers
    pub fn update(&self, config: TradingConfig) {
        debug!(
            "config updated: symbol={}, venue={}, paused={}",
            config.symbol,
            config.venue(),
            config.is_paused
        );
        self.tx.send_replace(config);
    }

    /// Apply a mutation to the current configuration and publish the result
    pub fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut TradingConfig),
    {
        let mut config = self.get();
        f(&mut config);
        self.update(config);
    }

    /// Subscribe to configuration changes
    pub fn subscribe(&self) -> watch::Receiver<TradingConfig> {
        self.tx.subscribe()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(TradingConfig::default())
    }
}
