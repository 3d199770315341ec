//! REST client for the Alpaca trading and data APIs

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::messages::{BarsResponse, OrderRequest, RawAccount, RawOrder, RawPosition};
use crate::common::errors::{ClientError, Result};
use crate::common::types::{Account, Bar, OrderSpec, Position, Venue};
use crate::config::types::{AlpacaConfig, ApiCredentials};

/// REST client bound to one venue's endpoint and credentials
#[derive(Debug, Clone)]
pub struct AlpacaRestClient {
    /// HTTP client with the venue auth headers installed
    client: Client,
    /// Base URL for the venue
    base_url: String,
}

impl AlpacaRestClient {
    /// Create a new REST client for a venue
    pub fn new(base_url: &str, credentials: &ApiCredentials, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "APCA-API-KEY-ID",
            HeaderValue::from_str(&credentials.api_key)
                .map_err(|e| ClientError::Configuration(format!("invalid API key: {}", e)))?,
        );
        headers.insert(
            "APCA-API-SECRET-KEY",
            HeaderValue::from_str(&credentials.api_secret)
                .map_err(|e| ClientError::Configuration(format!("invalid API secret: {}", e)))?,
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn error_for_status(
        response: reqwest::Response,
        context: &str,
    ) -> ClientError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            ClientError::OrderRejected(format!("{}: {}", context, body))
        } else {
            ClientError::InvalidResponse(format!(
                "{}: server returned status {}: {}",
                context, status, body
            ))
        }
    }
}

#[async_trait]
impl crate::common::traits::TradingApi for AlpacaRestClient {
    #[instrument(skip(self))]
    async fn get_account(&self) -> Result<Account> {
        let url = format!("{}/v2/account", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, "get account").await);
        }

        let raw: RawAccount = response.json().await?;
        raw.into_account()
    }

    #[instrument(skip(self))]
    async fn get_position(&self, symbol: &str) -> Result<Option<Position>> {
        let url = format!("{}/v2/positions/{}", self.base_url, symbol);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            // No open position is a valid outcome, not an error
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_for_status(response, "get position").await);
        }

        let raw: RawPosition = response.json().await?;
        let position = raw.into_position(Utc::now().timestamp_millis())?;
        Ok(Some(position))
    }

    #[instrument(skip(self, spec), fields(symbol = %spec.symbol, side = %spec.side))]
    async fn submit_order(&self, spec: &OrderSpec) -> Result<String> {
        let url = format!("{}/v2/orders", self.base_url);
        let request = OrderRequest::from(spec);
        debug!("submitting order: {:?}", request);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, "submit order").await);
        }

        let order: RawOrder = response.json().await?;
        Ok(order.id)
    }

    #[instrument(skip(self))]
    async fn cancel_all_orders(&self) -> Result<()> {
        let url = format!("{}/v2/orders", self.base_url);
        let response = self.client.delete(&url).send().await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, "cancel all orders").await);
        }

        Ok(())
    }

    #[instrument(skip(self, start, end))]
    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        let url = format!(
            "{}/v2/stocks/{}/bars?timeframe={}&start={}&end={}",
            self.base_url,
            symbol,
            timeframe,
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        debug!("fetching bars from: {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, "get bars").await);
        }

        let bars_response: BarsResponse = response.json().await?;
        let bars = bars_response
            .bars
            .get(symbol)
            .map(|bars| bars.iter().cloned().map(Bar::from).collect())
            .unwrap_or_default();
        Ok(bars)
    }
}

/// Lazily-built, per-venue cache of REST client handles
///
/// A credential change must invalidate the affected handle; `apply_config`
/// rebuilds only when credentials or endpoints actually changed.
#[derive(Debug)]
pub struct AlpacaConnector {
    config: AlpacaConfig,
    timeout: Duration,
    paper: Option<Arc<AlpacaRestClient>>,
    live: Option<Arc<AlpacaRestClient>>,
}

impl AlpacaConnector {
    pub fn new(config: AlpacaConfig, timeout: Duration) -> Self {
        Self {
            config,
            timeout,
            paper: None,
            live: None,
        }
    }

    /// The cached handle for a venue, building it on first use
    ///
    /// Returns a configuration error when the venue has no usable credentials.
    pub fn client(&mut self, venue: Venue) -> Result<Arc<AlpacaRestClient>> {
        let cached = match venue {
            Venue::Paper => &self.paper,
            Venue::Live => &self.live,
        };
        if let Some(client) = cached {
            return Ok(client.clone());
        }

        let credentials = self.config.credentials(venue).ok_or_else(|| {
            ClientError::Configuration(format!("no API credentials configured for {} venue", venue))
        })?;
        let client = Arc::new(AlpacaRestClient::new(
            self.config.rest_url(venue),
            &credentials,
            self.timeout,
        )?);

        match venue {
            Venue::Paper => self.paper = Some(client.clone()),
            Venue::Live => self.live = Some(client.clone()),
        }
        Ok(client)
    }

    /// Replace the brokerage configuration, invalidating stale handles
    pub fn apply_config(&mut self, config: AlpacaConfig) {
        for venue in [Venue::Paper, Venue::Live] {
            let changed = self.config.credentials(venue) != config.credentials(venue)
                || self.config.rest_url(venue) != config.rest_url(venue);
            if changed {
                warn!("credentials changed for {} venue, dropping cached handle", venue);
                match venue {
                    Venue::Paper => self.paper = None,
                    Venue::Live => self.live = None,
                }
            }
        }
        self.config = config;
    }
}
