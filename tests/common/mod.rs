//! Common test utilities and fixtures

use alpaca_rebound::common::types::{Account, Bar, Position};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Create a sample account snapshot for testing
pub fn sample_account() -> Account {
    Account {
        equity: dec!(30000),
        cash: dec!(10000),
        buying_power: dec!(60000),
        portfolio_value: dec!(30000),
        day_trade_count: 1,
        pattern_day_trader: false,
    }
}

/// Create a sample open position for testing
pub fn sample_position() -> Position {
    Position {
        symbol: "TSLA".to_string(),
        quantity: dec!(10),
        entry_price: dec!(100),
        current_price: dec!(105),
        entry_time: 1_704_067_200_000,
        target_price: Some(dec!(100.5)),
    }
}

/// Create a bar with the given close and volume
pub fn sample_bar(close: Decimal, volume: u64, vwap: Option<Decimal>) -> Bar {
    Bar {
        timestamp: Utc.with_ymd_and_hms(2024, 1, 16, 14, 30, 0).unwrap(),
        open: close,
        high: close,
        low: close,
        close,
        volume,
        vwap,
    }
}

/// Sample stream messages for testing parsing
pub mod ws_messages {
    /// Auth handshake acknowledgments, as batched by the venue
    pub const AUTH_ACK: &str = r#"[
        {"T":"success","msg":"connected"},
        {"T":"success","msg":"authenticated"}
    ]"#;

    /// A trade tick batch
    pub const TRADE_BATCH: &str = r#"[
        {"T":"t","S":"TSLA","p":251.32,"s":100,"t":1704067200000000000}
    ]"#;

    /// A quote tick batch
    pub const QUOTE_BATCH: &str = r#"[
        {"T":"q","S":"TSLA","bp":251.00,"ap":251.50,"bs":2,"as":3,"t":1704067200000000000}
    ]"#;
}

/// Sample API responses for testing the REST contract
pub mod api_responses {
    /// Sample account response
    pub const ACCOUNT: &str = r#"{
        "equity": "30000.50",
        "cash": "10000",
        "buying_power": "60001",
        "portfolio_value": "30000.50",
        "daytrade_count": 2,
        "pattern_day_trader": false
    }"#;

    /// Sample position response
    pub const POSITION: &str = r#"{
        "symbol": "TSLA",
        "qty": "10",
        "avg_entry_price": "100.00",
        "current_price": "105.00",
        "market_value": "1050.00",
        "unrealized_pl": "50.00",
        "unrealized_plpc": "0.05"
    }"#;

    /// Sample order creation response
    pub const ORDER: &str = r#"{
        "id": "61e69015-8549-4bfd-b9c3-01e75843f47d",
        "client_order_id": "eb9e2aaa-f71a-4f51-b5b4-52a6c565dad4",
        "symbol": "TSLA",
        "side": "buy",
        "type": "market",
        "time_in_force": "day",
        "status": "accepted"
    }"#;

    /// Sample bars response for the 09:30-10:00 window
    pub const BARS: &str = r#"{
        "bars": {
            "TSLA": [
                {"t": "2024-01-16T14:30:00Z", "o": 250.0, "h": 251.0, "l": 249.5, "c": 250.5, "v": 1000, "vw": 250.25},
                {"t": "2024-01-16T14:31:00Z", "o": 250.5, "h": 252.0, "l": 250.0, "c": 251.5, "v": 3000, "vw": 251.0}
            ]
        },
        "next_page_token": null
    }"#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_position_is_profitable() {
        let position = sample_position();
        assert_eq!(position.unrealized_pnl(), dec!(50));
        assert_eq!(position.market_value(), dec!(1050));
    }

    #[test]
    fn test_sample_account_has_margin() {
        let account = sample_account();
        assert!(account.buying_power > account.equity);
    }
}
