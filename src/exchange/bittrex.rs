//! REST API client for Bittrex v3

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::auth::BittrexAuthHeaders;
use super::messages::*;
use super::rate_limit::RateLimiter;
use crate::common::errors::{ClientError, Result};
use crate::common::traits::ExchangeGateway;
use crate::common::types::{
    AssetPair, Balances, Exchange, OpenOrder, OrderBook, PriceLevel, Side, Ticker,
};
use crate::config::types::{ApiCredentials, BittrexConfig};

/// Levels requested from the order book endpoint (1, 25 or 500)
const DEPTH_LIMIT: u32 = 25;

/// REST API client for Bittrex
#[derive(Debug, Clone)]
pub struct BittrexRestClient {
    /// HTTP client
    client: Client,
    /// Base URL for the v3 API
    base_url: String,
    /// API credentials for signed endpoints
    credentials: Option<ApiCredentials>,
    /// Request budget shared by every clone of this client
    limiter: Arc<RateLimiter>,
}

impl BittrexRestClient {
    /// Create a new REST client (unauthenticated)
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a new REST client with custom timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        url::Url::parse(base_url)
            .map_err(|e| ClientError::Configuration(format!("Invalid Bittrex URL {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
            limiter: Arc::new(RateLimiter::new(10, Duration::from_secs(1))),
        })
    }

    /// Build a client from configuration
    pub fn from_config(config: &BittrexConfig, timeout: Duration) -> Result<Self> {
        let mut client = Self::with_timeout(&config.rest_url, timeout)?;
        client.limiter = Arc::new(RateLimiter::new(
            config.requests_per_window,
            Duration::from_secs(1),
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

    /// Exchange symbol for a pair, e.g. `ADA-ETH`
    pub fn symbol(pair: &AssetPair) -> String {
        format!("{}-{}", pair.base, pair.quote)
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    async fn public_get(&self, path: &str) -> Result<Response> {
        self.limiter.acquire().await;
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        Self::check_response(response).await
    }

    async fn signed_request(&self, method: Method, path: &str, body: Option<String>) -> Result<Response> {
        let creds = self.credentials.as_ref().ok_or_else(|| {
            ClientError::Authentication("Bittrex API credentials are not configured".to_string())
        })?;

        let url = format!("{}{}", self.base_url, path);
        let body = body.unwrap_or_default();
        let headers = BittrexAuthHeaders::generate(
            &creds.api_key,
            &creds.api_secret,
            &url,
            method.as_str(),
            &body,
        )?;

        self.limiter.acquire().await;
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, &url);
        if !body.is_empty() {
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }
        let response = headers.apply_to_request(request).send().await?;
        Self::check_response(response).await
    }

    async fn check_response(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ClientError::RateLimit {
                message: "Bittrex returned status 429".to_string(),
                retry_after_seconds,
            });
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<BittrexApiError>(&body) {
            Ok(err) if err.code == "MARKET_DOES_NOT_EXIST" => {
                Err(ClientError::MarketNotFound(err.code))
            }
            Ok(err) if err.code == "INSUFFICIENT_FUNDS" => {
                Err(ClientError::InsufficientBalance(err.code))
            }
            Ok(err) => Err(ClientError::Exchange {
                code: i64::from(status.as_u16()),
                message: match err.detail {
                    Some(detail) => format!("{}: {}", err.code, detail),
                    None => err.code,
                },
            }),
            Err(_) => Err(ClientError::InvalidResponse(format!(
                "Server returned status {}: {}",
                status, body
            ))),
        }
    }

    async fn place_order(
        &self,
        pair: &AssetPair,
        side: Side,
        amount: Decimal,
        price: Option<Decimal>,
    ) -> Result<String> {
        let order = BittrexNewOrder {
            market_symbol: Self::symbol(pair),
            direction: side.to_string(),
            order_type: if price.is_some() { "LIMIT" } else { "MARKET" }.to_string(),
            quantity: amount.round_dp(8).normalize().to_string(),
            limit: price.map(|p| p.normalize().to_string()),
            time_in_force: if price.is_some() {
                "GOOD_TIL_CANCELLED"
            } else {
                "IMMEDIATE_OR_CANCEL"
            }
            .to_string(),
        };
        let body = serde_json::to_string(&order)?;

        let response = self
            .signed_request(Method::POST, "/orders", Some(body))
            .await?;
        let created: BittrexOrder = response.json().await?;
        Ok(created.id)
    }

    fn convert_levels(levels: Vec<BittrexLevel>, side: &str) -> Result<Vec<PriceLevel>> {
        levels
            .into_iter()
            .map(|level| {
                Ok(PriceLevel {
                    price: parse_decimal(&format!("{} rate", side), &level.rate)?,
                    size: parse_decimal(&format!("{} quantity", side), &level.quantity)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ExchangeGateway for BittrexRestClient {
    fn exchange(&self) -> Exchange {
        Exchange::Bittrex
    }

    #[instrument(skip(self))]
    async fn fetch_balance(&self) -> Result<Balances> {
        let response = self.signed_request(Method::GET, "/balances", None).await?;
        let entries: Vec<BittrexBalance> = response.json().await?;

        let mut balances = Balances::new();
        for entry in entries {
            balances.set(
                entry.currency_symbol,
                parse_decimal("available", &entry.available)?,
            );
        }
        Ok(balances)
    }

    #[instrument(skip(self))]
    async fn fetch_ticker(&self, pair: &AssetPair) -> Result<Ticker> {
        let path = format!("/markets/{}/ticker", Self::symbol(pair));
        let response = self.public_get(&path).await?;
        let ticker: BittrexTicker = response.json().await?;

        Ok(Ticker {
            bid: parse_decimal("bidRate", &ticker.bid_rate)?,
            ask: parse_decimal("askRate", &ticker.ask_rate)?,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_order_book(&self, pair: &AssetPair) -> Result<OrderBook> {
        let path = format!(
            "/markets/{}/orderbook?depth={}",
            Self::symbol(pair),
            DEPTH_LIMIT
        );
        let response = self.public_get(&path).await?;
        let book: BittrexOrderBook = response.json().await?;

        Ok(OrderBook::new(
            pair.clone(),
            Self::convert_levels(book.bid, "bid")?,
            Self::convert_levels(book.ask, "ask")?,
        ))
    }

    #[instrument(skip(self))]
    async fn fetch_open_orders(&self, pair: &AssetPair) -> Result<Vec<OpenOrder>> {
        let path = format!("/orders/open?marketSymbol={}", Self::symbol(pair));
        let response = self.signed_request(Method::GET, &path, None).await?;
        let orders: Vec<BittrexOrder> = response.json().await?;

        orders
            .into_iter()
            .map(|order| {
                let side = match order.direction.as_str() {
                    "BUY" => Side::Buy,
                    "SELL" => Side::Sell,
                    other => {
                        return Err(ClientError::InvalidResponse(format!(
                            "Unknown order direction: {}",
                            other
                        )))
                    }
                };
                let optional = |field: &str, value: Option<String>| -> Result<Decimal> {
                    value
                        .map(|v| parse_decimal(field, &v))
                        .unwrap_or(Ok(Decimal::ZERO))
                };
                Ok(OpenOrder {
                    id: order.id,
                    pair: pair.clone(),
                    side,
                    price: optional("limit", order.limit)?,
                    amount: optional("quantity", order.quantity)?,
                    filled: optional("fillQuantity", order.fill_quantity)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, order_id: &str, _pair: &AssetPair) -> Result<()> {
        let path = format!("/orders/{}", order_id);
        self.signed_request(Method::DELETE, &path, None).await?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = BittrexRestClient::new("https://api.bittrex.com/v3");
        assert!(client.is_ok());
    }

    #[test]
    fn test_symbol() {
        assert_eq!(BittrexRestClient::symbol(&AssetPair::new("ada", "eth")), "ADA-ETH");
    }

    #[tokio::test]
    async fn test_signed_request_without_credentials_fails() {
        let client = BittrexRestClient::new("https://api.bittrex.com/v3").unwrap();
        let result = client.fetch_balance().await;
        assert!(matches!(result, Err(ClientError::Authentication(_))));
    }
}
