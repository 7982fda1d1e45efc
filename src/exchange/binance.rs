//! REST API client for Binance spot

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::messages::*;
use super::rate_limit::RateLimiter;
use crate::common::errors::{ClientError, Result};
use crate::common::traits::ExchangeGateway;
use crate::common::types::{
    AssetPair, Balances, Exchange, OpenOrder, OrderBook, PriceLevel, Side, Ticker,
};
use crate::config::types::{ApiCredentials, BinanceConfig};

/// Levels requested from the depth endpoint
const DEPTH_LIMIT: u32 = 100;

/// Quantity and price granularity of one symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolRules {
    pub step_size: Decimal,
    pub tick_size: Decimal,
}

impl SymbolRules {
    /// Round a quantity down to the lot step
    pub fn quantity(&self, amount: Decimal) -> Decimal {
        round_down_to(amount, self.step_size)
    }

    /// Round a price down to the tick
    pub fn price(&self, price: Decimal) -> Decimal {
        round_down_to(price, self.tick_size)
    }
}

fn round_down_to(value: Decimal, increment: Decimal) -> Decimal {
    if increment <= Decimal::ZERO {
        return value.normalize();
    }
    ((value / increment).round_dp_with_strategy(0, RoundingStrategy::ToZero) * increment).normalize()
}

/// REST API client for Binance
#[derive(Debug, Clone)]
pub struct BinanceRestClient {
    /// HTTP client
    client: Client,
    /// Base URL for the REST API
    base_url: String,
    /// API credentials for signed endpoints
    credentials: Option<ApiCredentials>,
    /// Validity window for signed requests
    recv_window_ms: u64,
    /// Request budget shared by every clone of this client
    limiter: Arc<RateLimiter>,
    /// Symbol rules, loaded from exchangeInfo on first order
    rules: Arc<RwLock<HashMap<String, SymbolRules>>>,
}

impl BinanceRestClient {
    /// Create a new REST client (unauthenticated)
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a new REST client with custom timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        url::Url::parse(base_url)
            .map_err(|e| ClientError::Configuration(format!("Invalid Binance URL {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
            recv_window_ms: 5000,
            limiter: Arc::new(RateLimiter::new(200, Duration::from_secs(10))),
            rules: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Build a client from configuration
    pub fn from_config(config: &BinanceConfig, timeout: Duration) -> Result<Self> {
        let mut client = Self::with_timeout(&config.rest_url, timeout)?;
        client.recv_window_ms = config.recv_window_ms;
        client.limiter = Arc::new(RateLimiter::new(
            config.requests_per_window,
            Duration::from_secs(10),
        ));
        if let (Some(key), Some(secret)) = (&config.api_key, &config.api_secret) {
            client = client.with_credentials(ApiCredentials::new(key.clone(), secret.clone()));
        }
        Ok(client)
    }

    /// Set API credentials for signed requests
    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Exchange symbol for a pair, e.g. `ADAETH`
    pub fn symbol(pair: &AssetPair) -> String {
        format!("{}{}", pair.base, pair.quote)
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    async fn public_get(&self, path: &str, params: &[(&str, String)]) -> Result<Response> {
        self.limiter.acquire().await;
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, params);

        let response = self.client.get(&url).query(params).send().await?;
        Self::check_response(response).await
    }

    async fn signed_request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Response> {
        let creds = self.credentials.as_ref().ok_or_else(|| {
            ClientError::Authentication("Binance API credentials are not configured".to_string())
        })?;

        // The serializer is not Send and must be gone before the first await
        let query = {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in params {
                serializer.append_pair(key, value);
            }
            serializer.append_pair("recvWindow", &self.recv_window_ms.to_string());
            serializer.append_pair("timestamp", &chrono::Utc::now().timestamp_millis().to_string());
            serializer.finish()
        };
        let signature = super::auth::sign_binance(&creds.api_secret, &query)?;

        self.limiter.acquire().await;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);
        debug!("{} {}{}", method, self.base_url, path);

        let response = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &creds.api_key)
            .send()
            .await?;
        Self::check_response(response).await
    }

    /// Map non-success responses onto the error taxonomy
    async fn check_response(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            let retry_after_seconds = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ClientError::RateLimit {
                message: format!("Binance returned status {}", status),
                retry_after_seconds,
            });
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<BinanceApiError>(&body) {
            Ok(err) if err.code == -1121 => Err(ClientError::MarketNotFound(err.msg)),
            Ok(err) if err.code == -2010 && err.msg.to_lowercase().contains("insufficient balance") => {
                Err(ClientError::InsufficientBalance(err.msg))
            }
            Ok(err) => Err(ClientError::Exchange {
                code: err.code,
                message: err.msg,
            }),
            Err(_) => Err(ClientError::InvalidResponse(format!(
                "Server returned status {}: {}",
                status, body
            ))),
        }
    }

    /// Lot step and tick for a pair, fetching exchangeInfo on first use
    #[instrument(skip(self))]
    pub async fn symbol_rules(&self, pair: &AssetPair) -> Result<SymbolRules> {
        let symbol = Self::symbol(pair);
        if let Some(rules) = self.rules.read().await.get(&symbol) {
            return Ok(*rules);
        }

        let response = self
            .public_get("/api/v3/exchangeInfo", &[("symbol", symbol.clone())])
            .await?;
        let info: ExchangeInfoResponse = response.json().await?;
        let symbol_info = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| ClientError::MarketNotFound(pair.to_string()))?;

        let mut rules = SymbolRules {
            step_size: Decimal::ZERO,
            tick_size: Decimal::ZERO,
        };
        for filter in symbol_info.filters {
            match filter {
                SymbolFilter::LotSize { step_size } => {
                    rules.step_size = parse_decimal("stepSize", &step_size)?
                }
                SymbolFilter::PriceFilter { tick_size } => {
                    rules.tick_size = parse_decimal("tickSize", &tick_size)?
                }
                SymbolFilter::Other => {}
            }
        }

        self.rules.write().await.insert(symbol, rules);
        Ok(rules)
    }

    async fn place_order(
        &self,
        pair: &AssetPair,
        side: Side,
        amount: Decimal,
        price: Option<Decimal>,
    ) -> Result<String> {
        let rules = self.symbol_rules(pair).await?;
        let quantity = rules.quantity(amount);
        if quantity <= Decimal::ZERO {
            return Err(ClientError::InsufficientBalance(format!(
                "{} {} rounds to zero on {}",
                amount, pair.base, pair
            )));
        }

        let mut params = vec![
            ("symbol", Self::symbol(pair)),
            ("side", side.to_string()),
            ("quantity", quantity.to_string()),
            ("newOrderRespType", "ACK".to_string()),
        ];
        match price {
            Some(price) => {
                params.push(("type", "LIMIT".to_string()));
                params.push(("timeInForce", "GTC".to_string()));
                params.push(("price", rules.price(price).to_string()));
            }
            None => params.push(("type", "MARKET".to_string())),
        }

        let response = self
            .signed_request(Method::POST, "/api/v3/order", &params)
            .await?;
        let ack: NewOrderResponse = response.json().await?;
        Ok(ack.order_id.to_string())
    }

    fn convert_levels(levels: Vec<[String; 2]>, side: &str) -> Result<Vec<PriceLevel>> {
        levels
            .into_iter()
            .map(|[price, size]| {
                Ok(PriceLevel {
                    price: parse_decimal(&format!("{} price", side), &price)?,
                    size: parse_decimal(&format!("{} size", side), &size)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ExchangeGateway for BinanceRestClient {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    #[instrument(skip(self))]
    async fn fetch_balance(&self) -> Result<Balances> {
        let response = self
            .signed_request(Method::GET, "/api/v3/account", &[])
            .await?;
        let account: AccountResponse = response.json().await?;

        let mut balances = Balances::new();
        for balance in account.balances {
            balances.set(balance.asset, parse_decimal("free balance", &balance.free)?);
        }
        Ok(balances)
    }

    #[instrument(skip(self))]
    async fn fetch_ticker(&self, pair: &AssetPair) -> Result<Ticker> {
        let response = self
            .public_get("/api/v3/ticker/bookTicker", &[("symbol", Self::symbol(pair))])
            .await?;
        let ticker: BookTickerResponse = response.json().await?;

        Ok(Ticker {
            bid: parse_decimal("bidPrice", &ticker.bid_price)?,
            ask: parse_decimal("askPrice", &ticker.ask_price)?,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_order_book(&self, pair: &AssetPair) -> Result<OrderBook> {
        let response = self
            .public_get(
                "/api/v3/depth",
                &[
                    ("symbol", Self::symbol(pair)),
                    ("limit", DEPTH_LIMIT.to_string()),
                ],
            )
            .await?;
        let depth: DepthResponse = response.json().await?;

        Ok(OrderBook::new(
            pair.clone(),
            Self::convert_levels(depth.bids, "bid")?,
            Self::convert_levels(depth.asks, "ask")?,
        ))
    }

    #[instrument(skip(self))]
    async fn fetch_open_orders(&self, pair: &AssetPair) -> Result<Vec<OpenOrder>> {
        let response = self
            .signed_request(
                Method::GET,
                "/api/v3/openOrders",
                &[("symbol", Self::symbol(pair))],
            )
            .await?;
        let orders: Vec<BinanceOrder> = response.json().await?;

        orders
            .into_iter()
            .map(|order| {
                let side = match order.side.as_str() {
                    "BUY" => Side::Buy,
                    "SELL" => Side::Sell,
                    other => {
                        return Err(ClientError::InvalidResponse(format!(
                            "Unknown order side: {}",
                            other
                        )))
                    }
                };
                Ok(OpenOrder {
                    id: order.order_id.to_string(),
                    pair: pair.clone(),
                    side,
                    price: parse_decimal("price", &order.price)?,
                    amount: parse_decimal("origQty", &order.orig_qty)?,
                    filled: parse_decimal("executedQty", &order.executed_qty)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, order_id: &str, pair: &AssetPair) -> Result<()> {
        self.signed_request(
            Method::DELETE,
            "/api/v3/order",
            &[
                ("symbol", Self::symbol(pair)),
                ("orderId", order_id.to_string()),
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_market_order(
        &self,
        pair: &AssetPair,
        side: Side,
        amount: Decimal,
    ) -> Result<String> {
        self.place_order(pair, side, amount, None).await
    }

    #[instrument(skip(self))]
    async fn create_limit_order(
        &self,
        pair: &AssetPair,
        side: Side,
        amount: Decimal,
        price: Decimal,
    ) -> Result<String> {
        self.place_order(pair, side, amount, Some(price)).await
    }
}
