//! Exchange module - REST gateways for the supported exchanges

pub mod auth;
pub mod binance;
pub mod bittrex;
pub mod messages;
pub mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

pub use binance::BinanceRestClient;
pub use bittrex::BittrexRestClient;

use crate::common::errors::Result;
use crate::common::traits::ExchangeGateway;
use crate::common::types::Exchange;
use crate::config::types::AppConfig;

/// Build the gateway for the selected exchange
pub fn connect(exchange: Exchange, config: &AppConfig) -> Result<Arc<dyn ExchangeGateway>> {
    let timeout = Duration::from_secs(config.settings.request_timeout_seconds);
    let gateway: Arc<dyn ExchangeGateway> = match exchange {
        Exchange::Binance => Arc::new(BinanceRestClient::from_config(&config.binance, timeout)?),
        Exchange::Bittrex => Arc::new(BittrexRestClient::from_config(&config.bittrex, timeout)?),
    };
    Ok(gateway)
}
