//! Trait definitions for the external collaborators

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::errors::Result;
use super::types::{AssetPair, Balances, Exchange, OpenOrder, OrderBook, Side, Ticker};

/// Trait for exchange REST gateways (Binance, Bittrex, ...)
///
/// Every call is a suspension point and may fail with a transport or
/// exchange error. Implementations must be safe to share between scan
/// workers; rate limiting is the implementation's responsibility.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Which exchange this gateway talks to
    fn exchange(&self) -> Exchange;

    /// Free balance of every asset on the account
    async fn fetch_balance(&self) -> Result<Balances>;

    /// Top-of-book bid/ask for a pair
    async fn fetch_ticker(&self, pair: &AssetPair) -> Result<Ticker>;

    /// Current order book snapshot for a pair
    async fn fetch_order_book(&self, pair: &AssetPair) -> Result<OrderBook>;

    /// Orders of this account still open on a pair
    async fn fetch_open_orders(&self, pair: &AssetPair) -> Result<Vec<OpenOrder>>;

    /// Cancel an open order
    async fn cancel_order(&self, order_id: &str, pair: &AssetPair) -> Result<()>;

    /// Place a market order for `amount` units of the pair's base asset.
    /// Returns the exchange order id.
    async fn create_market_order(
        &self,
        pair: &AssetPair,
        side: Side,
        amount: Decimal,
    ) -> Result<String>;

    /// Place a good-til-cancelled limit order. Returns the exchange order id.
    async fn create_limit_order(
        &self,
        pair: &AssetPair,
        side: Side,
        amount: Decimal,
        price: Decimal,
    ) -> Result<String>;
}

/// Sink for operator-facing messages
///
/// `log` only records the text; `alert` records it and also delivers it
/// to the operator's alert channel. Neither may fail the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn log(&self, text: &str);

    async fn alert(&self, text: &str);
}
