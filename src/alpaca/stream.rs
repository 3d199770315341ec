//! WebSocket client for the Alpaca market-data stream
//!
//! Owns a single authenticated connection for one symbol. The connection runs
//! as a background tokio task that authenticates, subscribes, forwards price
//! updates, and reconnects on failure with a fixed backoff schedule. Calling
//! `connect` again (symbol or venue change) cancels the running task and any
//! pending reconnect timer before starting over.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use super::messages::{nanos_to_millis, AuthMessage, StreamMessage, SubscribeMessage};
use crate::common::types::{ConnectionState, PriceSource, PriceUpdate};
use crate::config::types::ApiCredentials;

/// Reconnect delays for the first attempts, then a fixed ceiling
const RECONNECT_DELAYS_MS: [u64; 4] = [1000, 2000, 5000, 10_000];
const MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// Delay before reconnect attempt number `attempt` (zero-based)
pub fn reconnect_delay(attempt: u32) -> Duration {
    let ms = RECONNECT_DELAYS_MS
        .get(attempt as usize)
        .copied()
        .unwrap_or(MAX_RECONNECT_DELAY_MS);
    Duration::from_millis(ms)
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a stream session ended
enum SessionEnd {
    /// Shutdown was requested; do not reconnect
    Shutdown,
    /// Transport failure or venue close; reconnect
    Dropped,
}

/// Market-data stream client
pub struct AlpacaStreamClient {
    price_tx: mpsc::Sender<PriceUpdate>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    session: Option<StreamSession>,
}

struct StreamSession {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl AlpacaStreamClient {
    /// Create a client that publishes into the given channels
    pub fn new(
        price_tx: mpsc::Sender<PriceUpdate>,
        state_tx: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            price_tx,
            state_tx: Arc::new(state_tx),
            session: None,
        }
    }

    /// Connect to the stream and subscribe to one symbol
    ///
    /// Tears down any existing connection and pending reconnect first, so at
    /// most one reconnect timer is ever live for this client. With no usable
    /// credentials the client stays down and reports `ConnectionState::Error`;
    /// it is reattempted on the next configuration change.
    pub async fn connect(
        &mut self,
        symbol: &str,
        stream_url: &str,
        credentials: Option<ApiCredentials>,
    ) {
        self.teardown().await;

        let Some(credentials) = credentials else {
            warn!("cannot connect market-data stream: API credentials not set");
            self.state_tx.send_replace(ConnectionState::Error);
            return;
        };

        info!("starting market-data stream for {} at {}", symbol, stream_url);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(connection_loop(
            symbol.to_string(),
            stream_url.to_string(),
            credentials,
            self.price_tx.clone(),
            self.state_tx.clone(),
            shutdown_rx,
        ));
        self.session = Some(StreamSession { shutdown_tx, task });
    }

    /// Close the connection and cancel any pending reconnect
    pub async fn disconnect(&mut self) {
        self.teardown().await;
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    /// Whether the stream is currently connected
    pub fn is_connected(&self) -> bool {
        *self.state_tx.borrow() == ConnectionState::Connected
    }

    async fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.shutdown_tx.send(true);
            let _ = session.task.await;
        }
    }
}

/// Connection loop: connect, authenticate, read, reconnect with backoff
///
/// The attempt counter resets to zero on successful re-authentication, so the
/// delay schedule restarts after every recovered outage.
async fn connection_loop(
    symbol: String,
    url: String,
    credentials: ApiCredentials,
    price_tx: mpsc::Sender<PriceUpdate>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        if *shutdown_rx.borrow() {
            return;
        }

        match connect_async(&url).await {
            Ok((ws_stream, _response)) => {
                info!("market-data stream connected");
                state_tx.send_replace(ConnectionState::Connected);

                let end = run_session(
                    ws_stream,
                    &symbol,
                    &credentials,
                    &price_tx,
                    &mut shutdown_rx,
                    &mut attempt,
                )
                .await;

                state_tx.send_replace(ConnectionState::Disconnected);
                if matches!(end, SessionEnd::Shutdown) {
                    return;
                }
            }
            Err(e) => {
                error!("stream connection failed: {}", e);
                state_tx.send_replace(ConnectionState::Error);
            }
        }

        let delay = reconnect_delay(attempt);
        attempt = attempt.saturating_add(1);
        info!("reconnecting in {:?} (attempt {})", delay, attempt);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.changed() => return,
        }
    }
}

/// Drive one live connection until it drops or shutdown is requested
async fn run_session(
    ws_stream: WsStream,
    symbol: &str,
    credentials: &ApiCredentials,
    price_tx: &mpsc::Sender<PriceUpdate>,
    shutdown_rx: &mut watch::Receiver<bool>,
    attempt: &mut u32,
) -> SessionEnd {
    let (mut write, mut read) = ws_stream.split();

    // Authenticate before anything else; subscription follows the ack
    let auth = AuthMessage::new(credentials.api_key.clone(), credentials.api_secret.clone());
    let auth_json = match serde_json::to_string(&auth) {
        Ok(json) => json,
        Err(e) => {
            error!("failed to encode auth message: {}", e);
            return SessionEnd::Dropped;
        }
    };
    if let Err(e) = write.send(Message::Text(auth_json)).await {
        error!("failed to send auth message: {}", e);
        return SessionEnd::Dropped;
    }

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                let _ = write.close().await;
                return SessionEnd::Shutdown;
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        for message in parse_batch(&text) {
                            match message {
                                StreamMessage::Success { ref msg } if msg.contains("authenticated") => {
                                    info!("stream authenticated, subscribing to {}", symbol);
                                    *attempt = 0;
                                    let subscribe = SubscribeMessage::for_symbol(symbol);
                                    let json = match serde_json::to_string(&subscribe) {
                                        Ok(json) => json,
                                        Err(e) => {
                                            error!("failed to encode subscribe message: {}", e);
                                            return SessionEnd::Dropped;
                                        }
                                    };
                                    if let Err(e) = write.send(Message::Text(json)).await {
                                        error!("failed to send subscribe message: {}", e);
                                        return SessionEnd::Dropped;
                                    }
                                }
                                StreamMessage::Success { msg } => {
                                    debug!("stream status: {}", msg);
                                }
                                StreamMessage::Error { code, msg } => {
                                    error!("stream error {:?}: {}", code, msg);
                                }
                                StreamMessage::Subscription { trades, quotes } => {
                                    debug!("subscribed: trades={:?}, quotes={:?}", trades, quotes);
                                }
                                StreamMessage::Trade(trade) => {
                                    // Updates for other symbols are dropped
                                    if trade.symbol != symbol {
                                        continue;
                                    }
                                    let update = PriceUpdate {
                                        symbol: trade.symbol,
                                        price: trade.price,
                                        timestamp: nanos_to_millis(trade.timestamp_ns),
                                        volume: trade.size,
                                        source: PriceSource::Stream,
                                    };
                                    if price_tx.send(update).await.is_err() {
                                        warn!("price channel closed, ending stream session");
                                        return SessionEnd::Shutdown;
                                    }
                                }
                                StreamMessage::Quote(quote) => {
                                    if quote.symbol != symbol {
                                        continue;
                                    }
                                    let update = PriceUpdate {
                                        price: quote.midpoint(),
                                        symbol: quote.symbol,
                                        timestamp: nanos_to_millis(quote.timestamp_ns),
                                        volume: 0,
                                        source: PriceSource::Stream,
                                    };
                                    if price_tx.send(update).await.is_err() {
                                        warn!("price channel closed, ending stream session");
                                        return SessionEnd::Shutdown;
                                    }
                                }
                                StreamMessage::Unknown => {}
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("stream closed by venue: {:?}", frame);
                        return SessionEnd::Dropped;
                    }
                    Some(Err(e)) => {
                        error!("stream read error: {}", e);
                        return SessionEnd::Dropped;
                    }
                    None => {
                        info!("stream ended");
                        return SessionEnd::Dropped;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Parse a batch of venue messages
///
/// A single malformed message is dropped without tearing the connection down.
fn parse_batch(text: &str) -> Vec<StreamMessage> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(text) {
        Ok(values) => values,
        Err(e) => {
            warn!("dropping unparseable stream payload: {} - {}", e, text);
            return Vec::new();
        }
    };

    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("dropping malformed stream message: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reconnect_delay_schedule() {
        let delays: Vec<u64> = (0..7).map(|n| reconnect_delay(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 5000, 10000, 30000, 30000, 30000]);
    }

    #[test]
    fn test_parse_batch_mixed() {
        let text = r#"[
            {"T":"success","msg":"authenticated"},
            {"T":"t","S":"TSLA","p":250.10,"s":50,"t":1704067200000000000},
            {"T":"q","S":"TSLA","bp":250.00,"ap":250.20,"t":1704067201000000000}
        ]"#;
        let messages = parse_batch(text);
        assert_eq!(messages.len(), 3);
        assert!(messages[0].is_authenticated());
        assert!(matches!(messages[1], StreamMessage::Trade(_)));
        assert!(matches!(messages[2], StreamMessage::Quote(_)));
    }

    #[test]
    fn test_parse_batch_drops_malformed_message_only() {
        let text = r#"[
            {"T":"t","S":"TSLA","p":"not a price","s":50,"t":1},
            {"T":"t","S":"TSLA","p":250.10,"s":50,"t":1704067200000000000}
        ]"#;
        let messages = parse_batch(text);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            StreamMessage::Trade(trade) => assert_eq!(trade.price, dec!(250.10)),
            other => panic!("expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_batch_rejects_non_array() {
        assert!(parse_batch("{\"T\":\"t\"}").is_empty());
        assert!(parse_batch("garbage").is_empty());
    }

    #[tokio::test]
    async fn test_connect_without_credentials_reports_error() {
        let (price_tx, _price_rx) = mpsc::channel(8);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let mut client = AlpacaStreamClient::new(price_tx, state_tx);

        client.connect("TSLA", "wss://example.invalid/v2/test", None).await;

        assert_eq!(*state_rx.borrow(), ConnectionState::Error);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_emits_disconnected() {
        let (price_tx, _price_rx) = mpsc::channel(8);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let mut client = AlpacaStreamClient::new(price_tx, state_tx);

        client.disconnect().await;

        assert_eq!(*state_rx.borrow(), ConnectionState::Disconnected);
    }
}
