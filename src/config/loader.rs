//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{ClientError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP_)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    // Add default config file if it exists
    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    // Add environment variables with APP_ prefix
    builder = builder.add_source(
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ClientError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ClientError::Configuration(e.to_string()))
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();

    let mut alpaca = super::types::AlpacaConfig {
        paper_api_key: std::env::var("ALPACA_PAPER_API_KEY").ok(),
        paper_api_secret: std::env::var("ALPACA_PAPER_API_SECRET").ok(),
        live_api_key: std::env::var("ALPACA_LIVE_API_KEY").ok(),
        live_api_secret: std::env::var("ALPACA_LIVE_API_SECRET").ok(),
        ..Default::default()
    };
    if let Ok(url) = std::env::var("ALPACA_PAPER_REST_URL") {
        alpaca.paper_rest_url = url;
    }
    if let Ok(url) = std::env::var("ALPACA_LIVE_REST_URL") {
        alpaca.live_rest_url = url;
    }
    if let Ok(url) = std::env::var("ALPACA_PAPER_STREAM_URL") {
        alpaca.paper_stream_url = url;
    }
    if let Ok(url) = std::env::var("ALPACA_LIVE_STREAM_URL") {
        alpaca.live_stream_url = url;
    }

    let mut trading = super::types::TradingConfig::default();
    if let Ok(symbol) = std::env::var("TRADING_SYMBOL") {
        if !symbol.trim().is_empty() {
            trading.symbol = symbol.trim().to_uppercase();
        }
    }
    if let Ok(live) = std::env::var("TRADING_USE_LIVE_VENUE") {
        trading.use_live_venue = matches!(live.trim(), "1" | "true" | "TRUE");
    }

    Ok(AppConfig {
        alpaca,
        trading,
        settings: super::types::EngineSettings::default(),
    })
}
