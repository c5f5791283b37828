//! Configuration structures.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use trading_broker::{BinanceConfig, DispatcherConfig};
use trading_core::error::TradingError;
use trading_core::types::{Market, Timeframe};
use trading_risk::RiskSizer;
use trading_strategies::MACrossoverConfig;

/// Most candles a single kline request can return.
const MAX_KLINE_LIMIT: usize = 1000;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub dispatcher: DispatcherSettings,
    #[serde(default = "default_markets")]
    pub markets: Vec<Market>,
}

fn default_markets() -> Vec<Market> {
    vec![Market::default()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSettings::default(),
            logging: LoggingConfig::default(),
            exchange: ExchangeSettings::default(),
            strategy: StrategySettings::default(),
            dispatcher: DispatcherSettings::default(),
            markets: default_markets(),
        }
    }
}

impl AppConfig {
    /// Check the settings the bot cannot run without.
    pub fn validate(&self) -> Result<(), TradingError> {
        self.strategy.crossover()?;
        self.strategy.sizer()?;

        if self.strategy.long_window > MAX_KLINE_LIMIT {
            return Err(TradingError::Config(format!(
                "strategy.long_window must not exceed {} bars, got {}",
                MAX_KLINE_LIMIT, self.strategy.long_window
            )));
        }

        if self.strategy.poll_interval_secs == 0 {
            return Err(TradingError::Config(
                "strategy.poll_interval_secs must be greater than 0".into(),
            ));
        }
        if self.dispatcher.orders_per_minute == 0 {
            return Err(TradingError::Config(
                "dispatcher.orders_per_minute must be greater than 0".into(),
            ));
        }
        if self.dispatcher.call_timeout_secs == 0
            || self.dispatcher.pending_timeout_secs == 0
            || self.exchange.request_timeout_secs == 0
        {
            return Err(TradingError::Config("Timeouts must be greater than 0".into()));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(TradingError::Config(format!(
                "Unknown log format '{}', expected pretty or json",
                self.logging.format
            )));
        }

        if self.markets.is_empty() {
            return Err(TradingError::Config("At least one market is required".into()));
        }
        let mut seen = HashSet::new();
        for market in &self.markets {
            if market.symbol.is_empty() || market.base_asset.is_empty() || market.quote_asset.is_empty() {
                return Err(TradingError::Config(format!(
                    "Market '{}' needs a symbol, base asset and quote asset",
                    market.symbol
                )));
            }
            if !seen.insert(market.symbol.as_str()) {
                return Err(TradingError::Config(format!(
                    "Market {} is configured twice",
                    market.symbol
                )));
            }
            if market.min_lot_size < Decimal::ZERO || market.lot_step < Decimal::ZERO {
                return Err(TradingError::Config(format!(
                    "Lot sizes of {} must not be negative",
                    market.symbol
                )));
            }
        }
        Ok(())
    }

    /// Markets to trade. An empty selection means all configured markets.
    pub fn select_markets(&self, symbols: &[String]) -> Result<Vec<Market>, TradingError> {
        if symbols.is_empty() {
            return Ok(self.markets.clone());
        }
        symbols
            .iter()
            .map(|symbol| {
                let symbol = symbol.to_uppercase();
                self.markets
                    .iter()
                    .find(|m| m.symbol == symbol)
                    .cloned()
                    .ok_or_else(|| {
                        TradingError::Config(format!("Market {} is not configured", symbol))
                    })
            })
            .collect()
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "trading-bot".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Directory-qualified file name for a daily rolling log
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// Binance API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSettings {
    pub base_url: String,
    pub api_key_env: String,
    pub api_secret_env: String,
    pub recv_window_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: trading_broker::DEFAULT_BASE_URL.to_string(),
            api_key_env: "BINANCE_API_KEY".to_string(),
            api_secret_env: "BINANCE_API_SECRET_KEY".to_string(),
            recv_window_ms: 5000,
            request_timeout_secs: 10,
        }
    }
}

impl ExchangeSettings {
    /// Client settings without credentials.
    pub fn public_client(&self) -> BinanceConfig {
        BinanceConfig {
            base_url: self.base_url.clone(),
            api_key: None,
            api_secret: None,
            recv_window_ms: self.recv_window_ms,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Client settings for signed trading calls.
    pub fn signed_client(&self, credentials: &Credentials) -> BinanceConfig {
        BinanceConfig {
            api_key: Some(credentials.api_key.clone()),
            api_secret: Some(credentials.api_secret.clone()),
            ..self.public_client()
        }
    }

    pub fn credentials(&self) -> Result<Credentials, TradingError> {
        Credentials::from_env(&self.api_key_env, &self.api_secret_env)
    }
}

/// Strategy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySettings {
    pub interval: Timeframe,
    pub short_window: usize,
    pub long_window: usize,
    /// Fraction of the free balance committed per order
    pub risk_fraction: Decimal,
    pub poll_interval_secs: u64,
    /// Sleep until the next candle opens instead of a fixed interval
    pub align_to_candle: bool,
    /// Re-read the account before sizing each order
    pub refresh_balance_each_cycle: bool,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            interval: Timeframe::Hour1,
            short_window: 20,
            long_window: 50,
            risk_fraction: dec!(0.01),
            poll_interval_secs: 60,
            align_to_candle: false,
            refresh_balance_each_cycle: true,
        }
    }
}

impl StrategySettings {
    pub fn crossover(&self) -> Result<MACrossoverConfig, TradingError> {
        Ok(MACrossoverConfig::new(self.short_window, self.long_window)?)
    }

    pub fn sizer(&self) -> Result<RiskSizer, TradingError> {
        Ok(RiskSizer::new(self.risk_fraction)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Order dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherSettings {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub call_timeout_secs: u64,
    pub orders_per_minute: u32,
    /// How long an order may stay pending without a definite answer
    #[serde(default = "default_pending_timeout_secs")]
    pub pending_timeout_secs: u64,
}

fn default_pending_timeout_secs() -> u64 {
    900
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
            call_timeout_secs: 10,
            orders_per_minute: 60,
            pending_timeout_secs: default_pending_timeout_secs(),
        }
    }
}

impl DispatcherSettings {
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            orders_per_minute: self.orders_per_minute,
            pending_timeout: Duration::from_secs(self.pending_timeout_secs),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Exchange API credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    /// Read credentials from the named environment variables.
    pub fn from_env(key_var: &str, secret_var: &str) -> Result<Self, TradingError> {
        Ok(Self {
            api_key: required_env(key_var)?,
            api_secret: required_env(secret_var)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

fn required_env(name: &str) -> Result<String, TradingError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) => Err(TradingError::Config(format!("{} is empty", name))),
        Err(_) => Err(TradingError::Config(format!("{} not set", name))),
    }
}
