//! Expected return of the two triangular paths for one asset
//!
//! Forward:  base -> asset -> anchor -> base
//!   (1 / ask(asset/base)) * buy  *  bid(asset/anchor) * sell  *  (1 / ask(base/anchor)) * buy
//! Backward: base -> anchor -> asset -> base
//!   bid(base/anchor) * sell  *  (1 / ask(asset/anchor)) * buy  *  bid(asset/base) * sell
//!
//! The result is `(product - 1) * 100`. Estimates are advisory; realized
//! profit is always measured from balances after a run.

use rust_decimal::Decimal;
use tracing::debug;

use super::fees::ExchangeFees;
use super::pricing::limit_price;
use super::types::{
    ArbitrageEstimate, Direction, LegQuote, PathQuotes, Triangle, DEGENERATE_RETURN,
    INSUFFICIENT_DEPTH_RETURN,
};
use crate::common::errors::Result;
use crate::common::types::{AssetPair, Exchange, Side};
use crate::config::types::{PriceSource, TradingConfig};
use crate::market::MarketDataCache;

/// Why a path could not be priced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unpriceable {
    Degenerate,
    Thin,
}

/// Percent return of the forward path, `None` when a price is not positive
pub fn forward_return(
    asset_base_ask: Decimal,
    asset_anchor_bid: Decimal,
    base_anchor_ask: Decimal,
    fees: &ExchangeFees,
) -> Option<Decimal> {
    if [asset_base_ask, asset_anchor_bid, base_anchor_ask]
        .iter()
        .any(|p| *p <= Decimal::ZERO)
    {
        return None;
    }
    let step1 = Decimal::ONE.checked_div(asset_base_ask)?.checked_mul(fees.buy_factor)?;
    let step2 = step1.checked_mul(asset_anchor_bid)?.checked_mul(fees.sell_factor)?;
    let step3 = step2.checked_div(base_anchor_ask)?.checked_mul(fees.buy_factor)?;
    (step3 - Decimal::ONE).checked_mul(Decimal::ONE_HUNDRED)
}

/// Percent return of the backward path, `None` when a price is not positive
pub fn backward_return(
    base_anchor_bid: Decimal,
    asset_anchor_ask: Decimal,
    asset_base_bid: Decimal,
    fees: &ExchangeFees,
) -> Option<Decimal> {
    if [base_anchor_bid, asset_anchor_ask, asset_base_bid]
        .iter()
        .any(|p| *p <= Decimal::ZERO)
    {
        return None;
    }
    let step1 = base_anchor_bid.checked_mul(fees.sell_factor)?;
    let step2 = step1.checked_div(asset_anchor_ask)?.checked_mul(fees.buy_factor)?;
    let step3 = step2.checked_mul(asset_base_bid)?.checked_mul(fees.sell_factor)?;
    (step3 - Decimal::ONE).checked_mul(Decimal::ONE_HUNDRED)
}

/// Build an estimate from the three leg prices of a path
pub fn estimate_from_quotes(
    asset: &str,
    direction: Direction,
    quotes: PathQuotes,
    fees: &ExchangeFees,
) -> ArbitrageEstimate {
    let [first, second, third] = &quotes.legs;
    let return_pct = match direction {
        Direction::Forward => forward_return(first.price, second.price, third.price, fees),
        Direction::Backward => backward_return(first.price, second.price, third.price, fees),
    };

    match return_pct {
        Some(return_pct) => ArbitrageEstimate {
            direction,
            asset: asset.to_string(),
            return_pct: return_pct.round_dp(6),
            quotes: Some(quotes),
        },
        None => sentinel(asset, direction, Unpriceable::Degenerate),
    }
}

fn sentinel(asset: &str, direction: Direction, reason: Unpriceable) -> ArbitrageEstimate {
    ArbitrageEstimate {
        direction,
        asset: asset.to_string(),
        return_pct: match reason {
            Unpriceable::Degenerate => DEGENERATE_RETURN,
            Unpriceable::Thin => INSUFFICIENT_DEPTH_RETURN,
        },
        quotes: None,
    }
}

/// Computes forward and backward estimates from the per-cycle cache
#[derive(Debug, Clone)]
pub struct ArbitrageEstimator {
    fees: ExchangeFees,
    source: PriceSource,
    skip_levels: usize,
    notional: Decimal,
}

impl ArbitrageEstimator {
    pub fn new(exchange: Exchange, trading: &TradingConfig) -> Self {
        Self {
            fees: ExchangeFees::for_exchange(exchange),
            source: trading.price_source,
            skip_levels: trading.depth_skip_levels,
            notional: trading.estimation_notional,
        }
    }

    pub fn fees(&self) -> &ExchangeFees {
        &self.fees
    }

    /// Estimate one direction. Fetch failures propagate; unpriceable paths
    /// come back as sentinel estimates.
    pub async fn estimate(
        &self,
        cache: &MarketDataCache,
        triangle: &Triangle,
        direction: Direction,
    ) -> Result<ArbitrageEstimate> {
        let quotes = match self.source {
            PriceSource::Ticker => self.ticker_quotes(cache, triangle, direction).await?,
            PriceSource::OrderBook => self.depth_quotes(cache, triangle, direction).await?,
        };

        let estimate = match quotes {
            Ok(quotes) => estimate_from_quotes(&triangle.asset, direction, quotes, &self.fees),
            Err(reason) => sentinel(&triangle.asset, direction, reason),
        };
        debug!(
            asset = %triangle.asset,
            direction = %direction,
            return_pct = %estimate.return_pct,
            "Estimated arbitrage"
        );
        Ok(estimate)
    }

    pub async fn estimate_forward(
        &self,
        cache: &MarketDataCache,
        triangle: &Triangle,
    ) -> Result<ArbitrageEstimate> {
        self.estimate(cache, triangle, Direction::Forward).await
    }

    pub async fn estimate_backward(
        &self,
        cache: &MarketDataCache,
        triangle: &Triangle,
    ) -> Result<ArbitrageEstimate> {
        self.estimate(cache, triangle, Direction::Backward).await
    }

    async fn ticker_quotes(
        &self,
        cache: &MarketDataCache,
        triangle: &Triangle,
        direction: Direction,
    ) -> Result<std::result::Result<PathQuotes, Unpriceable>> {
        let legs = path_legs(triangle, direction);
        let mut priced = Vec::with_capacity(3);
        for (pair, side) in legs {
            let ticker = cache.get_ticker(&pair).await?;
            let price = match side {
                Side::Buy => ticker.ask,
                Side::Sell => ticker.bid,
            };
            priced.push(LegQuote { pair, side, price });
        }
        Ok(into_quotes(priced))
    }

    /// Walk the path with the notional, pricing each leg at the depth-safe
    /// level able to absorb the quantity arriving from the previous leg.
    async fn depth_quotes(
        &self,
        cache: &MarketDataCache,
        triangle: &Triangle,
        direction: Direction,
    ) -> Result<std::result::Result<PathQuotes, Unpriceable>> {
        // Quantity held entering each leg, in the currency being spent
        let mut holding = self.notional;
        let mut priced = Vec::with_capacity(3);

        for (pair, side) in path_legs(triangle, direction) {
            let book = cache.get_order_book(&pair).await?;
            let levels = book.side(side.book_side());

            // Size of the leg in units of the pair's base asset
            let amount = match side {
                Side::Sell => holding,
                Side::Buy => {
                    let Some(best_ask) = book.best_ask() else {
                        return Ok(Err(Unpriceable::Thin));
                    };
                    match holding.checked_div(best_ask.price) {
                        Some(amount) if best_ask.price > Decimal::ZERO => amount,
                        _ => return Ok(Err(Unpriceable::Degenerate)),
                    }
                }
            };

            let Some(price) = limit_price(levels, side, self.skip_levels, amount) else {
                return Ok(Err(Unpriceable::Thin));
            };

            holding = match side {
                Side::Sell => holding * price * self.fees.sell_factor,
                Side::Buy => match holding.checked_div(price) {
                    Some(received) if price > Decimal::ZERO => received * self.fees.buy_factor,
                    _ => return Ok(Err(Unpriceable::Degenerate)),
                },
            };
            priced.push(LegQuote { pair, side, price });
        }

        debug!(asset = %triangle.asset, "Depth walk ends holding {} {}", holding, triangle.base);
        Ok(into_quotes(priced))
    }
}

/// Pairs and sides of the three legs of a path, in execution order
pub fn path_legs(triangle: &Triangle, direction: Direction) -> [(AssetPair, Side); 3] {
    match direction {
        Direction::Forward => [
            (triangle.asset_base(), Side::Buy),
            (triangle.asset_anchor(), Side::Sell),
            (triangle.base_anchor(), Side::Buy),
        ],
        Direction::Backward => [
            (triangle.base_anchor(), Side::Sell),
            (triangle.asset_anchor(), Side::Buy),
            (triangle.asset_base(), Side::Sell),
        ],
    }
}

fn into_quotes(priced: Vec<LegQuote>) -> std::result::Result<PathQuotes, Unpriceable> {
    let legs: [LegQuote; 3] = priced.try_into().map_err(|_| Unpriceable::Thin)?;
    Ok(PathQuotes { legs })
}
