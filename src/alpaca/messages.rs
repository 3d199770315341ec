//! Alpaca-specific wire types
//!
//! Stream messages and REST payloads mirror the venue's field names exactly;
//! everything is converted to the unified domain types at the module boundary.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::errors::{ClientError, Result};
use crate::common::types::{Account, Bar, OrderAmount, OrderSpec, OrderType, Position, Side, TimeInForce};

// ============================================================================
// Stream messages
// ============================================================================

/// Outgoing authentication handshake
#[derive(Debug, Clone, Serialize)]
pub struct AuthMessage {
    pub action: &'static str,
    pub key: String,
    pub secret: String,
}

impl AuthMessage {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            action: "auth",
            key: key.into(),
            secret: secret.into(),
        }
    }
}

/// Outgoing subscription request for trades and quotes of one symbol
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeMessage {
    pub action: &'static str,
    pub trades: Vec<String>,
    pub quotes: Vec<String>,
}

impl SubscribeMessage {
    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            action: "subscribe",
            trades: vec![symbol.to_string()],
            quotes: vec![symbol.to_string()],
        }
    }
}

/// Incoming stream message, dispatched by the `T` type tag
///
/// Messages arrive batched in a JSON array; unknown tags are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "T")]
pub enum StreamMessage {
    #[serde(rename = "success")]
    Success {
        #[serde(default)]
        msg: String,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        code: Option<i64>,
        #[serde(default)]
        msg: String,
    },
    #[serde(rename = "subscription")]
    Subscription {
        #[serde(default)]
        trades: Vec<String>,
        #[serde(default)]
        quotes: Vec<String>,
    },
    #[serde(rename = "t")]
    Trade(StreamTrade),
    #[serde(rename = "q")]
    Quote(StreamQuote),
    #[serde(other)]
    Unknown,
}

impl StreamMessage {
    /// Whether this is the authentication acknowledgment
    pub fn is_authenticated(&self) -> bool {
        matches!(self, StreamMessage::Success { msg } if msg.contains("authenticated"))
    }
}

/// A trade tick from the stream
#[derive(Debug, Clone, Deserialize)]
pub struct StreamTrade {
    #[serde(rename = "S")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price: Decimal,
    #[serde(rename = "s", default)]
    pub size: u64,
    /// Venue timestamp in nanoseconds
    #[serde(rename = "t")]
    pub timestamp_ns: i64,
}

/// A quote tick from the stream
#[derive(Debug, Clone, Deserialize)]
pub struct StreamQuote {
    #[serde(rename = "S")]
    pub symbol: String,
    #[serde(rename = "bp")]
    pub bid_price: Decimal,
    #[serde(rename = "ap")]
    pub ask_price: Decimal,
    /// Venue timestamp in nanoseconds
    #[serde(rename = "t")]
    pub timestamp_ns: i64,
}

impl StreamQuote {
    /// Midpoint of bid and ask
    pub fn midpoint(&self) -> Decimal {
        (self.bid_price + self.ask_price) / Decimal::from(2)
    }
}

/// Normalize a venue nanosecond timestamp to epoch milliseconds
pub fn nanos_to_millis(timestamp_ns: i64) -> i64 {
    timestamp_ns / 1_000_000
}

// ============================================================================
// REST payloads
// ============================================================================

/// Account payload as returned by the trading API
#[derive(Debug, Clone, Deserialize)]
pub struct RawAccount {
    pub equity: String,
    pub cash: String,
    pub buying_power: String,
    pub portfolio_value: String,
    #[serde(default)]
    pub daytrade_count: u32,
    #[serde(default)]
    pub pattern_day_trader: bool,
}

impl RawAccount {
    pub fn into_account(self) -> Result<Account> {
        Ok(Account {
            equity: parse_decimal(&self.equity, "equity")?,
            cash: parse_decimal(&self.cash, "cash")?,
            buying_power: parse_decimal(&self.buying_power, "buying_power")?,
            portfolio_value: parse_decimal(&self.portfolio_value, "portfolio_value")?,
            day_trade_count: self.daytrade_count,
            pattern_day_trader: self.pattern_day_trader,
        })
    }
}

/// Position payload as returned by the trading API
///
/// The venue reports no entry timestamp; callers stamp one and the engine
/// preserves the earliest stamp while the position stays open.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPosition {
    pub symbol: String,
    pub qty: String,
    pub avg_entry_price: String,
    pub current_price: String,
}

impl RawPosition {
    pub fn into_position(self, entry_time: i64) -> Result<Position> {
        Ok(Position {
            quantity: parse_decimal(&self.qty, "qty")?,
            entry_price: parse_decimal(&self.avg_entry_price, "avg_entry_price")?,
            current_price: parse_decimal(&self.current_price, "current_price")?,
            symbol: self.symbol,
            entry_time,
            target_price: None,
        })
    }
}

/// Order payload as returned by the trading API
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrder {
    pub id: String,
    #[serde(default)]
    pub status: String,
}

/// Order submission payload
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qty: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notional: Option<Decimal>,
    pub side: &'static str,
    #[serde(rename = "type")]
    pub order_type: &'static str,
    pub time_in_force: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
}

impl From<&OrderSpec> for OrderRequest {
    fn from(spec: &OrderSpec) -> Self {
        let (qty, notional) = match spec.amount {
            OrderAmount::Quantity(q) => (Some(q), None),
            OrderAmount::Notional(n) => (None, Some(n)),
        };
        Self {
            symbol: spec.symbol.clone(),
            qty,
            notional,
            side: match spec.side {
                Side::Buy => "buy",
                Side::Sell => "sell",
            },
            order_type: match spec.order_type {
                OrderType::Market => "market",
                OrderType::Limit => "limit",
            },
            time_in_force: match spec.time_in_force {
                TimeInForce::Day => "day",
                TimeInForce::Gtc => "gtc",
            },
            limit_price: spec.limit_price,
        }
    }
}

/// A single aggregated bar from the data API
#[derive(Debug, Clone, Deserialize)]
pub struct RawBar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: Decimal,
    #[serde(rename = "h")]
    pub high: Decimal,
    #[serde(rename = "l")]
    pub low: Decimal,
    #[serde(rename = "c")]
    pub close: Decimal,
    #[serde(rename = "v")]
    pub volume: u64,
    #[serde(rename = "vw", default)]
    pub vwap: Option<Decimal>,
}

impl From<RawBar> for Bar {
    fn from(raw: RawBar) -> Self {
        Bar {
            timestamp: raw.timestamp,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
            vwap: raw.vwap,
        }
    }
}

/// Bars response, keyed by symbol
#[derive(Debug, Clone, Deserialize)]
pub struct BarsResponse {
    #[serde(default)]
    pub bars: HashMap<String, Vec<RawBar>>,
}

fn parse_decimal(value: &str, field: &str) -> Result<Decimal> {
    value
        .parse()
        .map_err(|e| ClientError::InvalidResponse(format!("invalid {}: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_trade_message() {
        let json = r#"{"T":"t","S":"TSLA","p":251.32,"s":100,"t":1704067200000000000}"#;
        let message: StreamMessage = serde_json::from_str(json).unwrap();

        match message {
            StreamMessage::Trade(trade) => {
                assert_eq!(trade.symbol, "TSLA");
                assert_eq!(trade.price, dec!(251.32));
                assert_eq!(trade.size, 100);
                assert_eq!(nanos_to_millis(trade.timestamp_ns), 1_704_067_200_000);
            }
            other => panic!("expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_quote_message_midpoint() {
        let json = r#"{"T":"q","S":"TSLA","bp":250.00,"ap":250.50,"bs":2,"as":3,"t":1704067200000000000}"#;
        let message: StreamMessage = serde_json::from_str(json).unwrap();

        match message {
            StreamMessage::Quote(quote) => {
                assert_eq!(quote.midpoint(), dec!(250.25));
            }
            other => panic!("expected quote, got {:?}", other),
        }
    }

    #[test]
    fn test_auth_ack_detection() {
        let json = r#"[{"T":"success","msg":"connected"},{"T":"success","msg":"authenticated"}]"#;
        let messages: Vec<StreamMessage> = serde_json::from_str(json).unwrap();

        assert!(!messages[0].is_authenticated());
        assert!(messages[1].is_authenticated());
    }

    #[test]
    fn test_unknown_tag_is_tolerated() {
        let json = r#"{"T":"b","S":"TSLA","c":251.0}"#;
        let message: StreamMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(message, StreamMessage::Unknown));
    }

    #[test]
    fn test_order_request_market_notional() {
        let spec = OrderSpec::market_buy_notional("TSLA", dec!(5000));
        let request = OrderRequest::from(&spec);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "symbol": "TSLA",
                "notional": "5000",
                "side": "buy",
                "type": "market",
                "time_in_force": "day"
            })
        );
    }

    #[test]
    fn test_order_request_limit_sell() {
        let spec = OrderSpec::limit_sell("TSLA", dec!(10), dec!(251.85));
        let request = OrderRequest::from(&spec);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["qty"], serde_json::json!("10"));
        assert_eq!(json["type"], "limit");
        assert_eq!(json["time_in_force"], "gtc");
        assert_eq!(json["limit_price"], serde_json::json!("251.85"));
    }

    #[test]
    fn test_raw_account_conversion() {
        let json = r#"{
            "equity": "30000.50",
            "cash": "10000",
            "buying_power": "60001",
            "portfolio_value": "30000.50",
            "daytrade_count": 2,
            "pattern_day_trader": false
        }"#;
        let raw: RawAccount = serde_json::from_str(json).unwrap();
        let account = raw.into_account().unwrap();

        assert_eq!(account.equity, dec!(30000.50));
        assert_eq!(account.buying_power, dec!(60001));
        assert_eq!(account.day_trade_count, 2);
    }

    #[test]
    fn test_raw_account_rejects_garbage() {
        let json = r#"{
            "equity": "not-a-number",
            "cash": "0",
            "buying_power": "0",
            "portfolio_value": "0"
        }"#;
        let raw: RawAccount = serde_json::from_str(json).unwrap();
        assert!(raw.into_account().is_err());
    }
}
