//! Configuration module - loading, types, and the observable store

pub mod loader;
pub mod store;
pub mod types;

pub use loader::{load_config, load_from_env};
pub use store::ConfigStore;
pub use types::{AlpacaConfig, ApiCredentials, AppConfig, EngineSettings, TradingConfig};
