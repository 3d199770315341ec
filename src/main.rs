//! AlpacaRebound - Main Entry Point
//!
//! Wires the configuration, sinks, and decision engine together and runs
//! until interrupted.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use alpaca_rebound::common::sinks::{LogAlertSink, NullPersistenceSink};
use alpaca_rebound::config;
use alpaca_rebound::engine::DecisionEngine;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Override the configured trading symbol
    #[arg(long)]
    symbol: Option<String>,

    /// Trade on the live venue instead of paper
    #[arg(long)]
    live: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting AlpacaRebound");
    info!("Configuration file: {}", args.config);

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let mut app_config = config::load_config(Some(&args.config))?;
    if let Some(symbol) = args.symbol {
        app_config.trading.symbol = symbol.trim().to_uppercase();
    }
    if args.live {
        app_config.trading.use_live_venue = true;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine = DecisionEngine::new(
        app_config,
        Arc::new(LogAlertSink),
        Arc::new(NullPersistenceSink),
        shutdown_rx,
    );

    let engine_task = tokio::spawn(engine.run());

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, cleaning up...");
    let _ = shutdown_tx.send(true);

    engine_task.await??;
    Ok(())
}
