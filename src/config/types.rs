//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::types::Venue;

/// Twenty hours in milliseconds; a stored VWAP older than this is stale
const VWAP_STALE_AFTER_MS: i64 = 20 * 60 * 60 * 1000;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Brokerage endpoints and credentials
    #[serde(default)]
    pub alpaca: AlpacaConfig,
    /// Strategy configuration
    #[serde(default)]
    pub trading: TradingConfig,
    /// Engine timing and risk settings
    #[serde(default)]
    pub settings: EngineSettings,
}

/// Brokerage endpoints and per-venue credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaConfig {
    /// API key for the paper venue
    #[serde(default)]
    pub paper_api_key: Option<String>,
    /// API secret for the paper venue
    #[serde(default)]
    pub paper_api_secret: Option<String>,
    /// API key for the live venue
    #[serde(default)]
    pub live_api_key: Option<String>,
    /// API secret for the live venue
    #[serde(default)]
    pub live_api_secret: Option<String>,
    /// REST base URL for the paper venue
    #[serde(default = "default_paper_rest_url")]
    pub paper_rest_url: String,
    /// REST base URL for the live venue
    #[serde(default = "default_live_rest_url")]
    pub live_rest_url: String,
    /// Market-data stream URL for the paper venue (IEX feed)
    #[serde(default = "default_paper_stream_url")]
    pub paper_stream_url: String,
    /// Market-data stream URL for the live venue (SIP feed)
    #[serde(default = "default_live_stream_url")]
    pub live_stream_url: String,
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            paper_api_key: None,
            paper_api_secret: None,
            live_api_key: None,
            live_api_secret: None,
            paper_rest_url: default_paper_rest_url(),
            live_rest_url: default_live_rest_url(),
            paper_stream_url: default_paper_stream_url(),
            live_stream_url: default_live_stream_url(),
        }
    }
}

fn default_paper_rest_url() -> String {
    "https://paper-api.alpaca.markets".to_string()
}

fn default_live_rest_url() -> String {
    "https://api.alpaca.markets".to_string()
}

fn default_paper_stream_url() -> String {
    "wss://stream.data.alpaca.markets/v2/iex".to_string()
}

fn default_live_stream_url() -> String {
    "wss://stream.data.alpaca.markets/v2/sip".to_string()
}

impl AlpacaConfig {
    /// Credentials for a venue, when both key and secret are set and non-blank
    pub fn credentials(&self, venue: Venue) -> Option<ApiCredentials> {
        let (key, secret) = match venue {
            Venue::Paper => (&self.paper_api_key, &self.paper_api_secret),
            Venue::Live => (&self.live_api_key, &self.live_api_secret),
        };
        match (key, secret) {
            (Some(k), Some(s)) if !k.trim().is_empty() && !s.trim().is_empty() => {
                Some(ApiCredentials::new(k.clone(), s.clone()))
            }
            _ => None,
        }
    }

    /// REST base URL for a venue
    pub fn rest_url(&self, venue: Venue) -> &str {
        match venue {
            Venue::Paper => &self.paper_rest_url,
            Venue::Live => &self.live_rest_url,
        }
    }

    /// Stream URL for a venue
    pub fn stream_url(&self, venue: Venue) -> &str {
        match venue {
            Venue::Paper => &self.paper_stream_url,
            Venue::Live => &self.live_stream_url,
        }
    }
}

/// Strategy configuration
///
/// Owned by the config store; the engine holds only the latest snapshot it
/// was handed and reacts to change notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Symbol to trade
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Trade on the live venue instead of paper
    #[serde(default)]
    pub use_live_venue: bool,
    /// Manual profit-target percentage, used when `lock_target` is set
    #[serde(default)]
    pub manual_target_percent: Option<Decimal>,
    /// When true and a manual target is set, the tier table is ignored
    #[serde(default)]
    pub lock_target: bool,
    /// Trading actions suspended (set by the risk guard or the user)
    #[serde(default)]
    pub is_paused: bool,
    /// Morning VWAP reference, persisted so restarts do not recompute
    #[serde(default)]
    pub vwap_price: Option<Decimal>,
    /// Epoch milliseconds of the last VWAP computation
    #[serde(default)]
    pub vwap_calculated_at: Option<i64>,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            use_live_venue: false,
            manual_target_percent: None,
            lock_target: false,
            is_paused: false,
            vwap_price: None,
            vwap_calculated_at: None,
        }
    }
}

fn default_symbol() -> String {
    "TSLA".to_string()
}

impl TradingConfig {
    /// The venue this configuration trades on
    pub fn venue(&self) -> Venue {
        if self.use_live_venue {
            Venue::Live
        } else {
            Venue::Paper
        }
    }

    /// Profit-target percentage for the given account equity
    ///
    /// A locked manual target overrides the tier table unconditionally.
    pub fn target_percent(&self, equity: Decimal) -> Decimal {
        if self.lock_target {
            if let Some(manual) = self.manual_target_percent {
                return manual;
            }
        }

        if equity < dec!(10000) {
            dec!(0.20)
        } else if equity < dec!(25000) {
            dec!(0.30)
        } else if equity < dec!(50000) {
            dec!(0.50)
        } else if equity < dec!(100000) {
            dec!(0.70)
        } else if equity < dec!(250000) {
            dec!(0.90)
        } else if equity < dec!(1000000) {
            dec!(1.10)
        } else {
            dec!(1.20)
        }
    }

    /// Margin leverage multiplier: 2x above the pattern-day-trader floor
    pub fn leverage_multiplier(&self, equity: Decimal) -> Decimal {
        if equity >= dec!(25000) {
            dec!(2)
        } else {
            dec!(1)
        }
    }

    /// Whether the stored VWAP is missing or older than 20 hours
    pub fn is_vwap_stale(&self, now_ms: i64) -> bool {
        match self.vwap_calculated_at {
            Some(at) => now_ms - at > VWAP_STALE_AFTER_MS,
            None => true,
        }
    }
}

/// Engine timing and risk settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Decision tick interval in seconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Connection-health watchdog interval in seconds
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_secs: u64,
    /// Feed is considered stale after this many seconds without a message
    #[serde(default = "default_stale_feed")]
    pub stale_feed_secs: u64,
    /// Equity snapshot cadence in seconds
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
    /// Drawdown percentage that trips the risk guard
    #[serde(default = "default_drawdown_threshold")]
    pub drawdown_threshold_percent: Decimal,
    /// Interval between fill-confirmation polls in milliseconds
    #[serde(default = "default_fill_poll_interval")]
    pub fill_poll_interval_ms: u64,
    /// Give up waiting for a fill after this many milliseconds
    #[serde(default = "default_fill_poll_timeout")]
    pub fill_poll_timeout_ms: u64,
    /// Pause between cancel-all and the follow-up market sell in milliseconds
    #[serde(default = "default_order_settle_delay")]
    pub order_settle_delay_ms: u64,
    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            watchdog_interval_secs: default_watchdog_interval(),
            stale_feed_secs: default_stale_feed(),
            snapshot_interval_secs: default_snapshot_interval(),
            drawdown_threshold_percent: default_drawdown_threshold(),
            fill_poll_interval_ms: default_fill_poll_interval(),
            fill_poll_timeout_ms: default_fill_poll_timeout(),
            order_settle_delay_ms: default_order_settle_delay(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_tick_interval() -> u64 {
    10
}

fn default_watchdog_interval() -> u64 {
    35
}

fn default_stale_feed() -> u64 {
    30
}

fn default_snapshot_interval() -> u64 {
    300
}

fn default_drawdown_threshold() -> Decimal {
    dec!(20)
}

fn default_fill_poll_interval() -> u64 {
    500
}

fn default_fill_poll_timeout() -> u64 {
    5000
}

fn default_order_settle_delay() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    30
}

/// API credentials for a single venue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl ApiCredentials {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }
}
