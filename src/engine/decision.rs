//! Decision loop - the strategy orchestrator
//!
//! One long-lived task owns this loop. It consumes price updates in delivery
//! order, runs a fixed 10s tick, refreshes a consistent account/position
//! snapshot pair on every trigger, and walks the daily window table: morning
//! VWAP computation, dip buys below the VWAP reference, the 10:30 conversion
//! check, age-based force closes, drawdown pause, equity sampling, and the
//! end-of-day summary. The loop is the sole writer of its shared state;
//! brokerage failures degrade to "no update this cycle" and never tear it
//! down.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{risk::RiskGuard, vwap, windows};
use crate::alpaca::rest::AlpacaConnector;
use crate::alpaca::stream::AlpacaStreamClient;
use crate::common::channels::{create_price_channel, create_state_channel};
use crate::common::errors::{ClientError, Result};
use crate::common::traits::{AlertSink, PersistenceSink, TradingApi};
use crate::common::types::{
    Account, AlertSeverity, ConnectionState, EquitySnapshot, OrderSpec, Position, PriceUpdate,
    Side, Trade,
};
use crate::config::store::ConfigStore;
use crate::config::types::{AlpacaConfig, AppConfig, EngineSettings, TradingConfig};

/// Buys require the price at or below VWAP times this factor
const VWAP_BUY_DISCOUNT: Decimal = dec!(0.9985);
/// Fraction of levered buying power committed per entry
const NOTIONAL_FRACTION: Decimal = dec!(0.5);
/// Positions this old are liquidated unconditionally
const MAX_POSITION_AGE_DAYS: i64 = 10;

/// Whether the dip-buy condition holds for a price against the VWAP reference
fn buy_signal(price: Decimal, vwap_price: Decimal) -> bool {
    price <= vwap_price * VWAP_BUY_DISCOUNT
}

/// Notional order size: buying power × leverage × commitment fraction
fn order_notional(account: &Account, config: &TradingConfig) -> Decimal {
    account.buying_power * config.leverage_multiplier(account.equity) * NOTIONAL_FRACTION
}

/// Limit-sell target for an entry price and target percentage
fn target_price(entry_price: Decimal, percent: Decimal) -> Decimal {
    entry_price * (Decimal::ONE + percent / Decimal::from(100))
}

/// Merge a freshly fetched position with the previous snapshot
///
/// The venue reports no entry timestamp, so the earliest stamp observed for
/// the same symbol is preserved while the position stays open. The known
/// target price survives refreshes the same way.
fn merge_position(previous: Option<&Position>, fetched: Option<Position>) -> Option<Position> {
    let mut fetched = fetched?;
    if let Some(previous) = previous {
        if previous.symbol == fetched.symbol {
            fetched.entry_time = previous.entry_time;
            fetched.target_price = fetched.target_price.or(previous.target_price);
        }
    }
    Some(fetched)
}

/// Mutable state owned exclusively by the decision loop
struct EngineState {
    account: Option<Account>,
    position: Option<Position>,
    price: Option<Decimal>,
    today_open_equity: Option<Decimal>,
    last_price_at: Option<Instant>,
    session_date: Option<NaiveDate>,
    conversion_done_on: Option<NaiveDate>,
    risk: RiskGuard,
}

impl EngineState {
    fn new(risk: RiskGuard) -> Self {
        Self {
            account: None,
            position: None,
            price: None,
            today_open_equity: None,
            last_price_at: None,
            session_date: None,
            conversion_done_on: None,
            risk,
        }
    }
}

/// The trading engine
pub struct DecisionEngine {
    settings: EngineSettings,
    alpaca_config: AlpacaConfig,
    config_store: ConfigStore,
    connector: AlpacaConnector,
    stream: AlpacaStreamClient,
    price_rx: Option<mpsc::Receiver<PriceUpdate>>,
    state_rx: watch::Receiver<ConnectionState>,
    alerts: Arc<dyn AlertSink>,
    persistence: Arc<dyn PersistenceSink>,
    shutdown_rx: watch::Receiver<bool>,
    last_config: TradingConfig,
    credentials_alerted: bool,
    state: EngineState,
}

impl DecisionEngine {
    /// Build an engine from configuration and collaborator sinks
    pub fn new(
        app: AppConfig,
        alerts: Arc<dyn AlertSink>,
        persistence: Arc<dyn PersistenceSink>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (price_tx, price_rx) = create_price_channel();
        let (state_tx, state_rx) = create_state_channel();
        let stream = AlpacaStreamClient::new(price_tx, state_tx);
        let connector = AlpacaConnector::new(
            app.alpaca.clone(),
            Duration::from_secs(app.settings.request_timeout_secs),
        );
        let config_store = ConfigStore::new(app.trading.clone());
        let risk = RiskGuard::new(app.settings.drawdown_threshold_percent);

        Self {
            settings: app.settings,
            alpaca_config: app.alpaca,
            config_store,
            connector,
            stream,
            price_rx: Some(price_rx),
            state_rx,
            alerts,
            persistence,
            shutdown_rx,
            last_config: app.trading,
            credentials_alerted: false,
            state: EngineState::new(risk),
        }
    }

    /// A handle to the observable configuration store
    pub fn config_store(&self) -> ConfigStore {
        self.config_store.clone()
    }

    /// Run until shutdown is signalled
    pub async fn run(mut self) -> Result<()> {
        let initial = self.config_store.get();
        info!("decision engine starting for {}", initial.symbol);
        self.last_config = initial.clone();
        self.connect_stream(&initial).await;

        let mut price_rx = self
            .price_rx
            .take()
            .ok_or_else(|| ClientError::Internal("engine already running".to_string()))?;
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut config_rx = self.config_store.subscribe();

        let mut tick =
            tokio::time::interval(Duration::from_secs(self.settings.tick_interval_secs));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watchdog =
            tokio::time::interval(Duration::from_secs(self.settings.watchdog_interval_secs));
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let snapshot_at = windows::next_snapshot_boundary(
                Utc::now(),
                self.settings.snapshot_interval_secs as i64,
            );
            let summary_at = windows::next_summary_instant(Utc::now());

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("shutdown requested");
                    break;
                }
                _ = tick.tick() => {
                    self.refresh_and_evaluate().await;
                }
                update = price_rx.recv() => {
                    if let Some(update) = update {
                        self.on_price_update(update).await;
                    }
                }
                _ = watchdog.tick() => {
                    self.check_feed_health().await;
                }
                _ = sleep_until_utc(snapshot_at) => {
                    self.record_equity_snapshot().await;
                }
                _ = sleep_until_utc(summary_at) => {
                    self.send_daily_summary().await;
                }
                changed = config_rx.changed() => {
                    if changed.is_ok() {
                        self.on_config_changed().await;
                    }
                }
            }
        }

        self.stream.disconnect().await;
        info!("decision engine stopped");
        Ok(())
    }

    /// Apply a price update and run a decision pass
    async fn on_price_update(&mut self, update: PriceUpdate) {
        if update.symbol != self.config_store.get().symbol {
            return;
        }
        debug!("price update: {} @ {}", update.symbol, update.price);
        self.state.price = Some(update.price);
        self.state.last_price_at = Some(Instant::now());
        self.refresh_and_evaluate().await;
    }

    /// One decision pass: refresh snapshots, then evaluate the window table
    ///
    /// Account and Position are fetched together before any window logic so a
    /// pass never mixes snapshots from different refreshes.
    async fn refresh_and_evaluate(&mut self) {
        let config = self.config_store.get();
        let now = Utc::now();
        self.roll_session(now);

        let api: Arc<dyn TradingApi> = match self.connector.client(config.venue()) {
            Ok(client) => client,
            Err(e) => {
                self.alert_missing_credentials(&e).await;
                return;
            }
        };

        match api.get_account().await {
            Ok(account) => self.apply_account(account, &config).await,
            Err(e) => warn!("account refresh failed, no update this cycle: {}", e),
        }
        match api.get_position(&config.symbol).await {
            Ok(fetched) => {
                self.state.position = merge_position(self.state.position.as_ref(), fetched);
            }
            Err(e) => warn!("position refresh failed, keeping last snapshot: {}", e),
        }

        // Re-read: the risk guard may have flipped the pause flag just now
        let config = self.config_store.get();
        if config.is_paused {
            return;
        }
        self.evaluate_windows(api.as_ref(), &config, now).await;
    }

    /// Fold a fresh account snapshot into engine state and run the risk guard
    async fn apply_account(&mut self, account: Account, config: &TradingConfig) {
        if self.state.today_open_equity.is_none() {
            self.state.today_open_equity = Some(account.equity);
        }

        if let Some(breach) = self.state.risk.observe(account.equity) {
            warn!(
                "drawdown breach: {}% from high-water-mark {}",
                breach.drawdown_percent.round_dp(2),
                breach.high_water_mark
            );
            self.config_store.modify(|c| c.is_paused = true);
            self.alerts
                .alert(
                    "High drawdown",
                    &format!(
                        "Drawdown of {}% from session high {}; trading paused",
                        breach.drawdown_percent.round_dp(1),
                        breach.high_water_mark.round_dp(2)
                    ),
                    AlertSeverity::Critical,
                )
                .await;
        }

        if let Some(open) = self.state.today_open_equity {
            if open > Decimal::ZERO {
                let day_pnl_percent = (account.equity - open) / open * Decimal::from(100);
                debug!(
                    "{} day P&L {}%",
                    config.symbol,
                    day_pnl_percent.round_dp(2)
                );
            }
        }
        self.state.account = Some(account);
    }

    /// Walk the daily window table for one decision pass
    async fn evaluate_windows(
        &mut self,
        api: &dyn TradingApi,
        config: &TradingConfig,
        now: DateTime<Utc>,
    ) {
        let et = windows::exchange_time(now);

        if windows::is_vwap_compute_minute(et) && config.is_vwap_stale(now.timestamp_millis()) {
            self.compute_and_store_vwap(api, config, now).await;
        }

        if windows::in_buy_window(et) && self.state.position.is_none() {
            self.attempt_buy(api, config).await;
        }

        if windows::is_conversion_minute(et)
            && self.state.position.is_some()
            && self.state.conversion_done_on != Some(windows::exchange_date(now))
        {
            self.check_position_conversion(api, config, now).await;
        }

        if let Some(position) = self.state.position.clone() {
            if position.age_in_days(now.timestamp_millis()) >= MAX_POSITION_AGE_DAYS {
                info!(
                    "position age {} days reached limit, force closing",
                    position.age_in_days(now.timestamp_millis())
                );
                self.liquidate(api, config, &position, "Max position age reached")
                    .await;
            }
        }
    }

    /// Compute the 09:30–10:00 VWAP and persist it into the config store
    async fn compute_and_store_vwap(
        &mut self,
        api: &dyn TradingApi,
        config: &TradingConfig,
        now: DateTime<Utc>,
    ) {
        let Some((start, end)) = windows::vwap_window(now) else {
            return;
        };
        match vwap::fetch_vwap(api, &config.symbol, start, end).await {
            Ok(Some(value)) => {
                info!("VWAP calculated: {}", value);
                let now_ms = now.timestamp_millis();
                self.config_store.modify(|c| {
                    c.vwap_price = Some(value);
                    c.vwap_calculated_at = Some(now_ms);
                });
            }
            Ok(None) => warn!("no bars in VWAP window, keeping previous reference"),
            Err(e) => warn!("VWAP fetch failed: {}", e),
        }
    }

    /// Attempt a dip buy: market entry, bounded fill wait, target limit sell
    ///
    /// Without a confirmed fill no sell order and no trade record are
    /// produced; the window re-evaluates on the next trigger.
    async fn attempt_buy(&mut self, api: &dyn TradingApi, config: &TradingConfig) {
        let Some(vwap_price) = config.vwap_price else {
            return;
        };
        let Some(price) = self.state.price else {
            return;
        };
        let Some(account) = self.state.account.clone() else {
            return;
        };

        if !buy_signal(price, vwap_price) {
            return;
        }

        let notional = order_notional(&account, config);
        if notional <= Decimal::ZERO {
            return;
        }

        info!(
            "attempting buy: price={}, vwap={}, notional={}",
            price,
            vwap_price,
            notional.round_dp(2)
        );
        let spec = OrderSpec::market_buy_notional(config.symbol.clone(), notional.round_dp(2));
        let order_id = match api.submit_order(&spec).await {
            Ok(id) => id,
            Err(e) => {
                warn!("buy order failed: {}", e);
                return;
            }
        };
        debug!("buy order placed: {}", order_id);

        let Some(mut position) = self.wait_for_fill(api, &config.symbol).await else {
            info!("no fill confirmed for order {}, re-evaluating next cycle", order_id);
            return;
        };

        let percent = config.target_percent(account.equity);
        let target = target_price(position.entry_price, percent).round_dp(2);
        let sell = OrderSpec::limit_sell(config.symbol.clone(), position.quantity, target);
        match api.submit_order(&sell).await {
            Ok(_) => position.target_price = Some(target),
            Err(e) => warn!("target sell order failed: {}", e),
        }

        let trade = Trade {
            symbol: config.symbol.clone(),
            side: Side::Buy,
            quantity: position.quantity,
            price: position.entry_price,
            timestamp: Utc::now().timestamp_millis(),
            order_id: Some(order_id),
            pnl: None,
            pnl_percent: None,
        };
        self.record_trade(trade).await;
        self.alerts
            .alert(
                "Trade executed",
                &format!(
                    "Bought {} {} @ {}, target {}",
                    position.quantity.round_dp(4),
                    config.symbol,
                    position.entry_price,
                    target
                ),
                AlertSeverity::Info,
            )
            .await;
        self.state.position = Some(position);
    }

    /// Poll for the position after a buy, bounded by the fill timeout
    async fn wait_for_fill(&self, api: &dyn TradingApi, symbol: &str) -> Option<Position> {
        let interval = Duration::from_millis(self.settings.fill_poll_interval_ms);
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(self.settings.fill_poll_timeout_ms);

        loop {
            tokio::time::sleep(interval).await;
            match api.get_position(symbol).await {
                Ok(Some(position)) => return Some(position),
                Ok(None) => {}
                Err(e) => debug!("fill poll failed: {}", e),
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
        }
    }

    /// At 10:30, a position still at a loss is converted to a market exit
    async fn check_position_conversion(
        &mut self,
        api: &dyn TradingApi,
        config: &TradingConfig,
        now: DateTime<Utc>,
    ) {
        self.state.conversion_done_on = Some(windows::exchange_date(now));
        let Some(position) = self.state.position.clone() else {
            return;
        };
        if position.unrealized_pnl() >= Decimal::ZERO {
            return;
        }
        info!("position still at a loss at 10:30, converting to market exit");
        self.liquidate(api, config, &position, "Converted to market sell")
            .await;
    }

    /// Cancel open orders, liquidate at market, and record the forced sell
    async fn liquidate(
        &mut self,
        api: &dyn TradingApi,
        config: &TradingConfig,
        position: &Position,
        context: &str,
    ) {
        if let Err(e) = api.cancel_all_orders().await {
            warn!("cancel all orders failed: {}", e);
        }
        tokio::time::sleep(Duration::from_millis(self.settings.order_settle_delay_ms)).await;

        let spec = OrderSpec::market_sell(config.symbol.clone(), position.quantity);
        let order_id = match api.submit_order(&spec).await {
            Ok(id) => id,
            Err(e) => {
                warn!("liquidation order failed: {}", e);
                return;
            }
        };

        let exit_price = self.state.price.unwrap_or(position.current_price);
        let trade = Trade {
            symbol: config.symbol.clone(),
            side: Side::Sell,
            quantity: position.quantity,
            price: exit_price,
            timestamp: Utc::now().timestamp_millis(),
            order_id: Some(order_id),
            pnl: Some(position.unrealized_pnl()),
            pnl_percent: Some(position.unrealized_pnl_percent()),
        };
        self.record_trade(trade).await;
        self.alerts
            .alert(
                context,
                &format!(
                    "Sold {} {} @ {}",
                    position.quantity.round_dp(4),
                    config.symbol,
                    exit_price
                ),
                AlertSeverity::Info,
            )
            .await;
        self.state.position = None;
    }

    async fn record_trade(&self, trade: Trade) {
        if let Err(e) = self.persistence.record_trade(trade).await {
            warn!("failed to persist trade: {}", e);
        }
    }

    /// Forward an equity snapshot to the persistence sink
    async fn record_equity_snapshot(&mut self) {
        let Some(account) = self.state.account.clone() else {
            return;
        };
        let open = self.state.today_open_equity.unwrap_or(account.equity);
        let day_pnl = account.equity - open;
        let day_pnl_percent = if open > Decimal::ZERO {
            day_pnl / open * Decimal::from(100)
        } else {
            Decimal::ZERO
        };
        let snapshot = EquitySnapshot {
            timestamp: Utc::now().timestamp_millis(),
            equity: account.equity,
            day_pnl,
            day_pnl_percent,
        };
        if let Err(e) = self.persistence.record_snapshot(snapshot).await {
            warn!("failed to persist equity snapshot: {}", e);
        }
    }

    /// Send the 16:05 day P&L summary through the alert sink
    async fn send_daily_summary(&mut self) {
        let Some(account) = self.state.account.clone() else {
            return;
        };
        let open = self.state.today_open_equity.unwrap_or(account.equity);
        let day_pnl_percent = if open > Decimal::ZERO {
            (account.equity - open) / open * Decimal::from(100)
        } else {
            Decimal::ZERO
        };
        self.alerts
            .alert(
                "Daily summary",
                &format!(
                    "Equity: ${} | day P&L {}%",
                    account.equity.round_dp(2),
                    day_pnl_percent.round_dp(2)
                ),
                AlertSeverity::Info,
            )
            .await;
    }

    /// Raise a non-fatal alert when the feed has gone quiet while connected
    ///
    /// Reconnecting stays the stream client's responsibility.
    async fn check_feed_health(&mut self) {
        if *self.state_rx.borrow() != ConnectionState::Connected {
            return;
        }
        let stale_after = Duration::from_secs(self.settings.stale_feed_secs);
        let is_stale = match self.state.last_price_at {
            Some(at) => at.elapsed() > stale_after,
            None => true,
        };
        if is_stale {
            warn!("no price message in the last {:?} while connected", stale_after);
            self.alerts
                .alert(
                    "Market data stale",
                    &format!(
                        "No price update received in the last {} seconds",
                        self.settings.stale_feed_secs
                    ),
                    AlertSeverity::Warning,
                )
                .await;
        }
    }

    /// React to a configuration change notification
    async fn on_config_changed(&mut self) {
        let config = self.config_store.get();
        let previous = std::mem::replace(&mut self.last_config, config.clone());

        if previous.is_paused && !config.is_paused {
            info!("trading unpaused, re-arming risk guard");
            self.state.risk.rearm();
        }

        if previous.symbol != config.symbol || previous.venue() != config.venue() {
            info!(
                "symbol or venue changed ({} -> {}), resubscribing stream",
                previous.symbol, config.symbol
            );
            self.state.price = None;
            self.state.position = None;
            self.connect_stream(&config).await;
        }
    }

    /// (Re)connect the market-data stream for the configured symbol and venue
    async fn connect_stream(&mut self, config: &TradingConfig) {
        let venue = config.venue();
        let credentials = self.alpaca_config.credentials(venue);
        if credentials.is_none() {
            if !self.credentials_alerted {
                self.credentials_alerted = true;
                self.alerts
                    .alert(
                        "Brokerage credentials missing",
                        &format!(
                            "No API credentials configured for the {} venue; market data stays offline until reconfigured",
                            venue
                        ),
                        AlertSeverity::Critical,
                    )
                    .await;
            }
        } else {
            self.credentials_alerted = false;
        }
        let url = self.alpaca_config.stream_url(venue).to_string();
        self.stream.connect(&config.symbol, &url, credentials).await;
    }

    async fn alert_missing_credentials(&mut self, error: &ClientError) {
        if self.credentials_alerted {
            return;
        }
        self.credentials_alerted = true;
        warn!("brokerage unavailable: {}", error);
        self.alerts
            .alert(
                "Brokerage credentials missing",
                &error.to_string(),
                AlertSeverity::Critical,
            )
            .await;
    }

    /// Reset session-scoped state when the exchange-local date changes
    fn roll_session(&mut self, now: DateTime<Utc>) {
        let date = windows::exchange_date(now);
        if self.state.session_date == Some(date) {
            return;
        }
        if self.state.session_date.is_some() {
            info!("new trading session: {}", date);
            self.state.today_open_equity = None;
            self.state.risk.reset();
        }
        self.state.session_date = Some(date);
        self.state.conversion_done_on = None;
    }
}

/// Sleep until a wall-clock instant; elapsed targets fire immediately
fn sleep_until_utc(target: DateTime<Utc>) -> tokio::time::Sleep {
    let delta = (target - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    tokio::time::sleep(delta)
}
