//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::errors::{ClientError, Result};
use crate::common::types::Exchange;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Binance credentials and endpoint
    #[serde(default)]
    pub binance: BinanceConfig,
    /// Bittrex credentials and endpoint
    #[serde(default)]
    pub bittrex: BittrexConfig,
    /// Opportunity and execution parameters
    #[serde(default)]
    pub trading: TradingConfig,
    /// Asset universe scanned on each exchange
    #[serde(default)]
    pub universe: UniverseConfig,
    /// Notification sink
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Balance ledger
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl AppConfig {
    /// Check the options that would otherwise surface as trading mistakes
    pub fn validate(&self, exchange: Exchange) -> Result<()> {
        let trading = &self.trading;
        if trading.balance_fraction <= Decimal::ZERO || trading.balance_fraction >= Decimal::ONE {
            return Err(ClientError::Configuration(format!(
                "trading.balance_fraction must be in (0, 1), got {}",
                trading.balance_fraction
            )));
        }
        if trading.concurrency == 0 {
            return Err(ClientError::Configuration(
                "trading.concurrency must be at least 1".to_string(),
            ));
        }
        if trading.max_orderbook_tries == 0 {
            return Err(ClientError::Configuration(
                "trading.max_orderbook_tries must be at least 1".to_string(),
            ));
        }
        if trading.base_currency.eq_ignore_ascii_case(&trading.anchor_currency) {
            return Err(ClientError::Configuration(format!(
                "base and anchor currencies must differ, both are {}",
                trading.base_currency
            )));
        }
        if self.universe.for_exchange(exchange).is_empty() {
            return Err(ClientError::Configuration(format!(
                "no assets configured in universe.{}",
                exchange.to_string().to_lowercase()
            )));
        }
        if self.credentials(exchange).is_none() {
            return Err(ClientError::Configuration(format!(
                "missing API credentials for {}",
                exchange
            )));
        }
        Ok(())
    }

    /// API credentials for the selected exchange, if both parts are set
    pub fn credentials(&self, exchange: Exchange) -> Option<ApiCredentials> {
        let (key, secret) = match exchange {
            Exchange::Binance => (&self.binance.api_key, &self.binance.api_secret),
            Exchange::Bittrex => (&self.bittrex.api_key, &self.bittrex.api_secret),
        };
        match (key, secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(ApiCredentials::new(key.clone(), secret.clone()))
            }
            _ => None,
        }
    }
}

/// Binance platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinanceConfig {
    /// API key for authenticated requests
    #[serde(default)]
    pub api_key: Option<String>,
    /// API secret for signing requests
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Base URL for the REST API
    #[serde(default = "default_binance_rest_url")]
    pub rest_url: String,
    /// Validity window for signed requests, in milliseconds
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,
    /// Requests allowed per rate-limit window
    #[serde(default = "default_binance_requests_per_window")]
    pub requests_per_window: u32,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            rest_url: default_binance_rest_url(),
            recv_window_ms: default_recv_window(),
            requests_per_window: default_binance_requests_per_window(),
        }
    }
}

fn default_binance_rest_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_recv_window() -> u64 {
    5000
}

fn default_binance_requests_per_window() -> u32 {
    200
}

/// Bittrex platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BittrexConfig {
    /// API key for authenticated requests
    #[serde(default)]
    pub api_key: Option<String>,
    /// API secret for signing requests
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Base URL for the v3 REST API
    #[serde(default = "default_bittrex_rest_url")]
    pub rest_url: String,
    /// Requests allowed per rate-limit window
    #[serde(default = "default_bittrex_requests_per_window")]
    pub requests_per_window: u32,
}

impl Default for BittrexConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            rest_url: default_bittrex_rest_url(),
            requests_per_window: default_bittrex_requests_per_window(),
        }
    }
}

fn default_bittrex_rest_url() -> String {
    "https://api.bittrex.com/v3".to_string()
}

fn default_bittrex_requests_per_window() -> u32 {
    10
}

/// Where the estimator reads its prices from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Top-of-book bid/ask
    #[default]
    Ticker,
    /// Depth-safe limit prices from the order book
    OrderBook,
}

/// Opportunity detection and execution parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Estimated return (percent) above which a run is triggered
    #[serde(default = "default_threshold")]
    pub threshold_pct: Decimal,
    /// Top order-book levels ignored when choosing a limit price
    #[serde(default = "default_depth_skip")]
    pub depth_skip_levels: usize,
    /// Price levels tried per best-effort leg
    #[serde(default = "default_max_tries")]
    pub max_orderbook_tries: usize,
    /// Fixed wait for each limit order attempt, in milliseconds
    #[serde(default = "default_limit_wait")]
    pub limit_order_wait_ms: u64,
    /// Fraction of the base balance committed to a run, strictly below 1
    #[serde(default = "default_balance_fraction")]
    pub balance_fraction: Decimal,
    /// Extra waits granted to a partially filled order before canceling it
    #[serde(default = "default_partial_fill_waits")]
    pub partial_fill_waits: u32,
    /// Assets evaluated concurrently per batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Currency every run starts and ends in
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// Intermediate currency of the triangle
    #[serde(default = "default_anchor_currency")]
    pub anchor_currency: String,
    /// Fiat currency realized diffs are valued in
    #[serde(default = "default_report_currency")]
    pub report_currency: Option<String>,
    /// Estimator price source
    #[serde(default)]
    pub price_source: PriceSource,
    /// Base-currency notional used to size depth-adjusted estimates
    #[serde(default = "default_estimation_notional")]
    pub estimation_notional: Decimal,
}

impl TradingConfig {
    pub fn limit_order_wait(&self) -> Duration {
        Duration::from_millis(self.limit_order_wait_ms)
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            threshold_pct: default_threshold(),
            depth_skip_levels: default_depth_skip(),
            max_orderbook_tries: default_max_tries(),
            limit_order_wait_ms: default_limit_wait(),
            balance_fraction: default_balance_fraction(),
            partial_fill_waits: default_partial_fill_waits(),
            concurrency: default_concurrency(),
            base_currency: default_base_currency(),
            anchor_currency: default_anchor_currency(),
            report_currency: default_report_currency(),
            price_source: PriceSource::default(),
            estimation_notional: default_estimation_notional(),
        }
    }
}

fn default_threshold() -> Decimal {
    dec!(-0.30)
}

fn default_depth_skip() -> usize {
    1
}

fn default_max_tries() -> usize {
    14
}

fn default_limit_wait() -> u64 {
    1000
}

fn default_balance_fraction() -> Decimal {
    dec!(0.8)
}

fn default_partial_fill_waits() -> u32 {
    20
}

fn default_concurrency() -> usize {
    4
}

fn default_base_currency() -> String {
    "ETH".to_string()
}

fn default_anchor_currency() -> String {
    "BTC".to_string()
}

fn default_report_currency() -> Option<String> {
    Some("EUR".to_string())
}

fn default_estimation_notional() -> Decimal {
    dec!(1)
}

/// Asset universe per exchange
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniverseConfig {
    #[serde(default)]
    pub binance: Vec<String>,
    #[serde(default)]
    pub bittrex: Vec<String>,
}

impl UniverseConfig {
    pub fn for_exchange(&self, exchange: Exchange) -> &[String] {
        match exchange {
            Exchange::Binance => &self.binance,
            Exchange::Bittrex => &self.bittrex,
        }
    }
}

/// Notification sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Append-only operator log file
    #[serde(default = "default_log_file")]
    pub log_file: String,
    /// Telegram bot token; alerts are file-only when unset
    #[serde(default)]
    pub telegram_bot_token: Option<String>,
    /// Telegram chat receiving alerts
    #[serde(default)]
    pub telegram_chat_id: Option<i64>,
    /// Telegram Bot API base URL
    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            telegram_bot_token: None,
            telegram_chat_id: None,
            telegram_api_url: default_telegram_api_url(),
        }
    }
}

fn default_log_file() -> String {
    "logs.txt".to_string()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

/// Balance ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

fn default_ledger_path() -> String {
    "balance.csv".to_string()
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// API credentials for authenticated requests
#[derive(Debug, Clone)]
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

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.binance.api_key = Some("key".to_string());
        config.binance.api_secret = Some("secret".to_string());
        config.universe.binance = vec!["ADA".to_string(), "XRP".to_string()];
        config
    }

    #[test]
    fn test_defaults() {
        let trading = TradingConfig::default();
        assert_eq!(trading.threshold_pct, dec!(-0.30));
        assert_eq!(trading.depth_skip_levels, 1);
        assert_eq!(trading.max_orderbook_tries, 14);
        assert_eq!(trading.limit_order_wait(), Duration::from_secs(1));
        assert_eq!(trading.balance_fraction, dec!(0.8));
        assert_eq!(trading.partial_fill_waits, 20);
        assert_eq!(trading.price_source, PriceSource::Ticker);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate(Exchange::Binance).is_ok());
    }

    #[test]
    fn test_rejects_full_balance_overcommit() {
        let mut config = valid_config();
        config.trading.balance_fraction = dec!(1.2);
        assert!(config.validate(Exchange::Binance).is_err());
    }

    #[test]
    fn test_rejects_committing_the_whole_balance() {
        let mut config = valid_config();
        config.trading.balance_fraction = Decimal::ONE;
        let err = config.validate(Exchange::Binance).unwrap_err();
        assert!(err.to_string().contains("(0, 1)"));

        config.trading.balance_fraction = dec!(0.99);
        assert!(config.validate(Exchange::Binance).is_ok());
    }

    #[test]
    fn test_rejects_missing_credentials_and_universe() {
        let config = valid_config();
        // Bittrex has neither credentials nor assets configured
        assert!(config.validate(Exchange::Bittrex).is_err());
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut config = valid_config();
        config.trading.concurrency = 0;
        assert!(config.validate(Exchange::Binance).is_err());
    }
}
