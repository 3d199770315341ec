//! Contract tests for the Alpaca REST client
//!
//! These run against a local mock server, asserting the exact request shapes
//! the client produces and the conversions applied to responses.
//!
//! To run these tests:
//! ```
//! cargo test --test alpaca_rest_contract
//! ```

mod common;

use std::time::Duration;

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alpaca_rebound::alpaca::rest::AlpacaRestClient;
use alpaca_rebound::common::errors::ClientError;
use alpaca_rebound::common::traits::TradingApi;
use alpaca_rebound::common::types::OrderSpec;
use alpaca_rebound::config::types::ApiCredentials;
use alpaca_rebound::engine::vwap;

use common::api_responses;

/// Helper to create a client pointed at the mock server
fn client_for(server: &MockServer) -> AlpacaRestClient {
    AlpacaRestClient::new(
        &server.uri(),
        &ApiCredentials::new("test-key".to_string(), "test-secret".to_string()),
        Duration::from_secs(5),
    )
    .expect("Failed to create REST client")
}

// ============================================================================
// Account
// ============================================================================

#[tokio::test]
async fn test_get_account_sends_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .and(header("APCA-API-KEY-ID", "test-key"))
        .and(header("APCA-API-SECRET-KEY", "test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(api_responses::ACCOUNT, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let account = client_for(&server).get_account().await.unwrap();
    assert_eq!(account.equity, dec!(30000.50));
    assert_eq!(account.buying_power, dec!(60001));
    assert_eq!(account.day_trade_count, 2);
    assert!(!account.pattern_day_trader);
}

#[tokio::test]
async fn test_get_account_server_error_is_err() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = client_for(&server).get_account().await;
    assert!(matches!(result, Err(ClientError::InvalidResponse(_))));
}

// ============================================================================
// Positions
// ============================================================================

#[tokio::test]
async fn test_get_position_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/positions/TSLA"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(api_responses::POSITION, "application/json"))
        .mount(&server)
        .await;

    let position = client_for(&server)
        .get_position("TSLA")
        .await
        .unwrap()
        .expect("position should be present");
    assert_eq!(position.quantity, dec!(10));
    assert_eq!(position.entry_price, dec!(100));
    assert_eq!(position.unrealized_pnl(), dec!(50));
}

#[tokio::test]
async fn test_get_position_absent_is_none_not_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/positions/TSLA"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let position = client_for(&server).get_position("TSLA").await.unwrap();
    assert!(position.is_none());
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
async fn test_submit_market_buy_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .and(body_partial_json(serde_json::json!({
            "symbol": "TSLA",
            "notional": "5000",
            "side": "buy",
            "type": "market",
            "time_in_force": "day"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(api_responses::ORDER, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let order_id = client_for(&server)
        .submit_order(&OrderSpec::market_buy_notional("TSLA", dec!(5000)))
        .await
        .unwrap();
    assert_eq!(order_id, "61e69015-8549-4bfd-b9c3-01e75843f47d");
}

#[tokio::test]
async fn test_submit_limit_sell_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .and(body_partial_json(serde_json::json!({
            "symbol": "TSLA",
            "qty": "10",
            "side": "sell",
            "type": "limit",
            "time_in_force": "gtc",
            "limit_price": "100.5"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(api_responses::ORDER, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .submit_order(&OrderSpec::limit_sell("TSLA", dec!(10), dec!(100.5)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejected_order_surfaces_as_order_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .respond_with(
            ResponseTemplate::new(422).set_body_raw(r#"{"message":"insufficient buying power"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let result = client_for(&server)
        .submit_order(&OrderSpec::market_buy_notional("TSLA", dec!(1000000)))
        .await;
    assert!(matches!(result, Err(ClientError::OrderRejected(_))));
}

#[tokio::test]
async fn test_cancel_all_orders() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v2/orders"))
        .respond_with(ResponseTemplate::new(207).set_body_raw("[]", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).cancel_all_orders().await.unwrap();
}

// ============================================================================
// Bars and VWAP
// ============================================================================

#[tokio::test]
async fn test_get_bars_parses_symbol_keyed_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/TSLA/bars"))
        .and(query_param("timeframe", "1Min"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(api_responses::BARS, "application/json"))
        .mount(&server)
        .await;

    let start = Utc.with_ymd_and_hms(2024, 1, 16, 14, 30, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 1, 16, 15, 0, 0).unwrap();
    let bars = client_for(&server)
        .get_bars("TSLA", "1Min", start, end)
        .await
        .unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].close, dec!(250.5));
    assert_eq!(bars[0].vwap, Some(dec!(250.25)));
    assert_eq!(bars[1].volume, 3000);
}

#[tokio::test]
async fn test_fetch_vwap_over_mock_bars() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/TSLA/bars"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(api_responses::BARS, "application/json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let start = Utc.with_ymd_and_hms(2024, 1, 16, 14, 30, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 1, 16, 15, 0, 0).unwrap();
    let result = vwap::fetch_vwap(&client, "TSLA", start, end).await.unwrap();

    // (250.25 * 1000 + 251.0 * 3000) / 4000 = 250.8125
    assert_eq!(result, Some(dec!(250.8125)));
}

#[tokio::test]
async fn test_fetch_vwap_with_no_bars_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/TSLA/bars"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"bars": {}}"#, "application/json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let start = Utc.with_ymd_and_hms(2024, 1, 16, 14, 30, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 1, 16, 15, 0, 0).unwrap();
    let result = vwap::fetch_vwap(&client, "TSLA", start, end).await.unwrap();
    assert_eq!(result, None);
}
