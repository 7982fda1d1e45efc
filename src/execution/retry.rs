//! Walk the book until filled
//!
//! One fresh book snapshot per call. The amount is turned into a fixed budget
//! before the first attempt; levels are then tried best-first, one limit
//! order at a time, each for whatever part of the budget is still open.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::executor::OrderExecutor;
use super::types::{AmountSpec, BestPriceOutcome, Execution, OrderOutcome, TradeLeg};
use crate::common::errors::{ClientError, Result};
use crate::common::types::{AssetPair, Side};

/// What is left to trade, in the unit the budget was set in
#[derive(Debug, Clone, Copy, PartialEq)]
enum Budget {
    /// Quantity of the pair's base asset
    Base(Decimal),
    /// Quote currency to spend
    Quote(Decimal),
}

impl Budget {
    /// Base quantity to order at `price`
    fn quantity_at(self, price: Decimal) -> Option<Decimal> {
        match self {
            Budget::Base(quantity) => Some(quantity),
            Budget::Quote(value) => value.checked_div(price),
        }
    }

    fn consume(self, quantity: Decimal, price: Decimal) -> Self {
        match self {
            Budget::Base(left) => Budget::Base(left - quantity),
            Budget::Quote(left) => Budget::Quote(left - quantity * price),
        }
    }

    fn is_spent(self) -> bool {
        match self {
            Budget::Base(left) | Budget::Quote(left) => left <= Decimal::ZERO,
        }
    }
}

pub struct BestPriceRetry {
    executor: Arc<OrderExecutor>,
    max_tries: usize,
    wait: Duration,
}

impl BestPriceRetry {
    pub fn new(executor: Arc<OrderExecutor>, max_tries: usize, wait: Duration) -> Self {
        Self {
            executor,
            max_tries,
            wait,
        }
    }

    pub fn max_tries(&self) -> usize {
        self.max_tries
    }

    /// Try up to `max_tries` price levels, stopping once the budget is filled.
    ///
    /// A percentage amount is applied to the balance once, before the first
    /// attempt. Partial fills of canceled attempts count against the budget,
    /// so the walk never trades more than that first resolution allowed.
    /// Errors from an attempt count as a miss and the walk moves on.
    pub async fn execute(&self, pair: &AssetPair, side: Side, amount: AmountSpec) -> BestPriceOutcome {
        let book = match self.executor.gateway().fetch_order_book(pair).await {
            Ok(book) => book,
            Err(e) => {
                warn!(pair = %pair, "Order book unavailable: {}", e);
                return BestPriceOutcome::NotStarted(format!("no order book: {}", e));
            }
        };

        let mut budget = match self.budget(pair, side, amount).await {
            Ok(budget) if !budget.is_spent() => budget,
            Ok(_) => {
                warn!(pair = %pair, "Nothing to {}", side.to_string().to_lowercase());
                return BestPriceOutcome::NotStarted(format!("empty balance for {}", pair));
            }
            Err(e) => {
                warn!(pair = %pair, "Cannot size {}: {}", side, e);
                return BestPriceOutcome::NotStarted(format!("cannot size order: {}", e));
            }
        };

        let levels = book.sorted_side(side.book_side());
        let mut execution = Execution::default();
        let mut attempts = 0;
        for level in levels.iter().take(self.max_tries) {
            let Some(quantity) = budget.quantity_at(level.price) else {
                debug!(pair = %pair, price = %level.price, "Unusable level");
                continue;
            };
            attempts += 1;
            let leg = TradeLeg::limit(pair.clone(), side, AmountSpec::Absolute(quantity), level.price)
                .with_timeout(self.wait);

            let outcome = self.executor.place_order(&leg).await;
            execution.record(outcome.executed(), level.price);
            budget = budget.consume(outcome.executed(), level.price);

            match outcome {
                OrderOutcome::Filled(_) => {
                    info!(pair = %pair, price = %level.price, attempts, "{} filled", side);
                    return BestPriceOutcome::Filled {
                        price: level.price,
                        attempts,
                        execution,
                    };
                }
                OrderOutcome::Unfilled(executed) => {
                    debug!(
                        pair = %pair,
                        price = %level.price,
                        attempt = attempts,
                        executed = %executed,
                        "Not filled"
                    );
                }
                OrderOutcome::Error(message) => {
                    debug!(pair = %pair, price = %level.price, attempt = attempts, "Attempt failed: {}", message);
                }
            }

            if budget.is_spent() {
                info!(pair = %pair, attempts, "{} filled across partial fills", side);
                return BestPriceOutcome::Filled {
                    price: level.price,
                    attempts,
                    execution,
                };
            }
        }

        warn!(
            pair = %pair,
            attempts,
            executed = %execution.quantity,
            "Could not {} within the book",
            side.to_string().to_lowercase()
        );
        BestPriceOutcome::Exhausted { attempts, execution }
    }

    /// Fix the walk's budget from a single balance read
    async fn budget(&self, pair: &AssetPair, side: Side, amount: AmountSpec) -> Result<Budget> {
        let fraction = match amount {
            AmountSpec::Absolute(quantity) => return Ok(Budget::Base(quantity)),
            AmountSpec::Percentage(fraction) => fraction,
        };
        if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
            return Err(ClientError::Internal(format!("fraction {} out of range", fraction)));
        }

        let balances = self.executor.gateway().fetch_balance().await?;
        Ok(match side {
            Side::Buy => Budget::Quote(balances.free(&pair.quote) * fraction),
            Side::Sell => Budget::Base(balances.free(&pair.base) * fraction),
        })
    }
}
