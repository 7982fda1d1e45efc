//! Wire types for the Binance and Bittrex REST APIs
//!
//! Exchanges send numbers as strings; they are kept as strings here and
//! converted to `Decimal` by the clients.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::common::errors::{ClientError, Result};

/// Parse a decimal string field, naming the field on failure
pub fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| ClientError::InvalidResponse(format!("Invalid {}: {} ({})", field, value, e)))
}

// ============================================================================
// Binance
// ============================================================================

/// Error body returned by Binance on 4xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceApiError {
    pub code: i64,
    pub msg: String,
}

/// `GET /api/v3/ticker/bookTicker`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookTickerResponse {
    pub symbol: String,
    pub bid_price: String,
    pub bid_qty: String,
    pub ask_price: String,
    pub ask_qty: String,
}

/// `GET /api/v3/depth`; levels are `[price, quantity]`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthResponse {
    #[serde(default)]
    pub last_update_id: u64,
    pub bids: Vec<[String; 2]>,
    pub asks: Vec<[String; 2]>,
}

/// `GET /api/v3/account`
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub balances: Vec<BinanceBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceBalance {
    pub asset: String,
    pub free: String,
    pub locked: String,
}

/// Entry of `GET /api/v3/openOrders`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceOrder {
    pub symbol: String,
    pub order_id: u64,
    pub price: String,
    pub orig_qty: String,
    pub executed_qty: String,
    pub status: String,
    pub side: String,
}

/// `POST /api/v3/order` acknowledgement
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderResponse {
    pub symbol: String,
    pub order_id: u64,
    #[serde(default)]
    pub status: Option<String>,
}

/// `GET /api/v3/exchangeInfo`
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfoResponse {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize { step_size: String },
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    PriceFilter { tick_size: String },
    #[serde(other)]
    Other,
}

// ============================================================================
// Bittrex
// ============================================================================

/// Error body returned by Bittrex
#[derive(Debug, Clone, Deserialize)]
pub struct BittrexApiError {
    pub code: String,
    #[serde(default)]
    pub detail: Option<String>,
}

/// `GET /markets/{symbol}/ticker`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BittrexTicker {
    pub symbol: String,
    #[serde(default)]
    pub last_trade_rate: Option<String>,
    pub bid_rate: String,
    pub ask_rate: String,
}

/// `GET /markets/{symbol}/orderbook`
#[derive(Debug, Clone, Deserialize)]
pub struct BittrexOrderBook {
    #[serde(default)]
    pub bid: Vec<BittrexLevel>,
    #[serde(default)]
    pub ask: Vec<BittrexLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BittrexLevel {
    pub quantity: String,
    pub rate: String,
}

/// Entry of `GET /balances`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BittrexBalance {
    pub currency_symbol: String,
    pub total: String,
    pub available: String,
}

/// Order as returned by `GET /orders/open` and `POST /orders`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BittrexOrder {
    pub id: String,
    pub market_symbol: String,
    pub direction: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub fill_quantity: Option<String>,
    pub status: String,
}

/// Body of `POST /orders`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BittrexNewOrder {
    pub market_symbol: String,
    pub direction: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub quantity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    pub time_in_force: String,
}
