//! Order placement with fill detection
//!
//! The executor is where gateway errors stop being errors: every failure
//! comes back as [`OrderOutcome::Error`] and callers decide what it means.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::types::{AmountSpec, OrderOutcome, TradeLeg};
use crate::common::errors::{ClientError, Result};
use crate::common::traits::ExchangeGateway;
use crate::common::types::{AssetPair, Side};

/// Places single orders through a gateway
pub struct OrderExecutor {
    gateway: Arc<dyn ExchangeGateway>,
    /// Extra timeout periods granted to a partially filled limit order
    partial_fill_waits: u32,
}

impl OrderExecutor {
    pub fn new(gateway: Arc<dyn ExchangeGateway>, partial_fill_waits: u32) -> Self {
        Self {
            gateway,
            partial_fill_waits,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn ExchangeGateway> {
        &self.gateway
    }

    /// Quantity of the pair's base asset an [`AmountSpec`] resolves to.
    ///
    /// Percentage buys spend a fraction of the quote balance, converted at
    /// the limit price when one is given and at a fresh ask otherwise.
    /// Percentage sells take a fraction of the base balance. The balance is
    /// read on every call, so callers that place several orders against one
    /// budget should resolve it once and pass absolute amounts.
    pub async fn resolve_amount(
        &self,
        pair: &AssetPair,
        side: Side,
        amount: AmountSpec,
        limit_price: Option<Decimal>,
    ) -> Result<Decimal> {
        let fraction = match amount {
            AmountSpec::Absolute(quantity) => return Ok(quantity),
            AmountSpec::Percentage(fraction) => fraction,
        };

        let balances = self.gateway.fetch_balance().await?;
        match side {
            Side::Sell => Ok(balances.free(&pair.base) * fraction),
            Side::Buy => {
                let spend = balances.free(&pair.quote) * fraction;
                let price = match limit_price {
                    Some(price) => price,
                    None => self.gateway.fetch_ticker(pair).await?.ask,
                };
                spend.checked_div(price).ok_or_else(|| {
                    ClientError::InvalidResponse(format!("cannot convert at price {} on {}", price, pair))
                })
            }
        }
    }

    /// Place one order and report whether it filled, and how much traded.
    ///
    /// Market orders are reported filled once accepted. A limit order with a
    /// timeout is checked after the timeout and canceled if still open; one
    /// without a timeout is reported unfilled straight away.
    #[instrument(skip_all, fields(leg = %leg))]
    pub async fn place_order(&self, leg: &TradeLeg) -> OrderOutcome {
        match self.try_place(leg).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Order failed: {}", e);
                OrderOutcome::Error(e.to_string())
            }
        }
    }

    async fn try_place(&self, leg: &TradeLeg) -> Result<OrderOutcome> {
        let amount = self
            .resolve_amount(&leg.pair, leg.side, leg.amount, leg.limit_price)
            .await?;
        if amount <= Decimal::ZERO {
            return Ok(OrderOutcome::Error(format!(
                "nothing to {} on {}",
                leg.side.to_string().to_lowercase(),
                leg.pair
            )));
        }

        let Some(price) = leg.limit_price else {
            let order_id = self
                .gateway
                .create_market_order(&leg.pair, leg.side, amount)
                .await?;
            info!(order_id = %order_id, "Market {} {} {}", leg.side, amount, leg.pair);
            return Ok(OrderOutcome::Filled(amount));
        };

        let order_id = self
            .gateway
            .create_limit_order(&leg.pair, leg.side, amount, price)
            .await?;
        debug!(order_id = %order_id, "Limit {} {} {} @ {}", leg.side, amount, leg.pair, price);

        match leg.timeout {
            Some(timeout) => self.await_fill(&order_id, &leg.pair, amount, timeout).await,
            None => Ok(OrderOutcome::Unfilled(Decimal::ZERO)),
        }
    }

    /// Wait out a resting limit order, then cancel whatever is left
    async fn await_fill(
        &self,
        order_id: &str,
        pair: &AssetPair,
        amount: Decimal,
        timeout: Duration,
    ) -> Result<OrderOutcome> {
        let mut extra_waits = self.partial_fill_waits;
        loop {
            tokio::time::sleep(timeout).await;

            let open = self.gateway.fetch_open_orders(pair).await?;
            let Some(order) = open.iter().find(|o| o.id == order_id) else {
                info!(order_id = %order_id, "Limit order filled");
                return Ok(OrderOutcome::Filled(amount));
            };

            if order.is_partially_filled() && extra_waits > 0 {
                extra_waits -= 1;
                debug!(
                    order_id = %order_id,
                    filled = %order.filled,
                    amount = %order.amount,
                    "Partially filled, waiting ({} waits left)",
                    extra_waits
                );
                continue;
            }

            self.gateway.cancel_order(order_id, pair).await?;
            debug!(order_id = %order_id, filled = %order.filled, "Canceled unfilled limit order");
            return Ok(OrderOutcome::Unfilled(order.filled));
        }
    }
}
