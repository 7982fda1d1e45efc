//! Three-leg arbitrage runs
//!
//! ```text
//! Start -> Leg1 -> Leg2 -> Leg3 -> Completed
//!            |       |
//!            |       +--> revert Leg1 --> PartiallyReverted
//!            +--> unwind residue -----> Aborted
//! ```
//!
//! Every run ends by appending its diff to the ledger and alerting the
//! operator. Runs that traded measure the diff by reading the base balance
//! back; a run whose first leg traded nothing records zero without a read.
//! Reverts size themselves from the fills of the leg they undo.
//! Runs are never interrupted between legs.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::executor::OrderExecutor;
use super::retry::BestPriceRetry;
use super::types::{
    AmountSpec, ArbitrageRun, BestPriceOutcome, Execution, LegRecord, LegRole, RunStatus, TradeLeg,
};
use crate::common::errors::{ClientError, Result};
use crate::common::traits::{ExchangeGateway, Notifier};
use crate::common::types::{AssetPair, Balances, Side};
use crate::config::types::TradingConfig;
use crate::reporting::BalanceLedger;
use crate::strategy::{Direction, Triangle};

/// Balance reads attempted before a run gives up on measuring itself
const BALANCE_READ_ATTEMPTS: usize = 3;

pub struct ArbitrageOrchestrator {
    gateway: Arc<dyn ExchangeGateway>,
    executor: Arc<OrderExecutor>,
    retry: BestPriceRetry,
    ledger: Arc<BalanceLedger>,
    notifier: Arc<dyn Notifier>,
    /// Share of the starting balance committed by the first leg
    balance_fraction: Decimal,
    report_currency: Option<String>,
    /// Pause between balance read attempts
    retry_pause: Duration,
}

impl ArbitrageOrchestrator {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        trading: &TradingConfig,
        ledger: Arc<BalanceLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let executor = Arc::new(OrderExecutor::new(gateway.clone(), trading.partial_fill_waits));
        let retry = BestPriceRetry::new(
            executor.clone(),
            trading.max_orderbook_tries,
            trading.limit_order_wait(),
        );

        Self {
            gateway,
            executor,
            retry,
            ledger,
            notifier,
            balance_fraction: trading.balance_fraction,
            report_currency: trading.report_currency.clone(),
            retry_pause: trading.limit_order_wait(),
        }
    }

    /// Execute one direction of a triangle through to a terminal state.
    ///
    /// Fails only when balances cannot be read before the first leg or
    /// after the last one; in both cases no measurement is recorded.
    pub async fn run(&self, triangle: &Triangle, direction: Direction) -> Result<ArbitrageRun> {
        self.notifier
            .log(&format!("Arbitrage: {}", triangle.path(direction)))
            .await;

        match direction {
            Direction::Forward => self.run_forward(triangle).await,
            Direction::Backward => self.run_backward(triangle).await,
        }
    }

    /// base -> asset -> anchor -> base
    async fn run_forward(&self, triangle: &Triangle) -> Result<ArbitrageRun> {
        let before = self.balances().await?.free(&triangle.base);
        let mut legs = Vec::with_capacity(4);

        let leg1 = self
            .best_effort(
                LegRole::First,
                triangle.asset_base(),
                Side::Buy,
                AmountSpec::Percentage(self.balance_fraction),
            )
            .await;
        let leg1_filled = leg1.filled;
        let bought = leg1.execution;
        legs.push(leg1);

        if !leg1_filled {
            if !bought.is_empty() {
                legs.push(self.unwind(triangle.asset_base(), Side::Sell, bought.quantity).await);
            }
            return self
                .finish(triangle, Direction::Forward, legs, before, !bought.is_empty(), RunStatus::Aborted)
                .await;
        }

        let leg2 = self
            .best_effort(
                LegRole::Second,
                triangle.asset_anchor(),
                Side::Sell,
                AmountSpec::Percentage(Decimal::ONE),
            )
            .await;
        let leg2_filled = leg2.filled;
        legs.push(leg2);

        if !leg2_filled {
            legs.push(self.unwind(triangle.asset_base(), Side::Sell, bought.quantity).await);
            return self
                .finish(triangle, Direction::Forward, legs, before, true, RunStatus::PartiallyReverted)
                .await;
        }

        legs.push(
            self.market(
                LegRole::Third,
                triangle.base_anchor(),
                Side::Buy,
                AmountSpec::Percentage(Decimal::ONE),
            )
            .await,
        );
        self.finish(triangle, Direction::Forward, legs, before, true, RunStatus::Completed)
            .await
    }

    /// base -> anchor -> asset -> base
    async fn run_backward(&self, triangle: &Triangle) -> Result<ArbitrageRun> {
        let before = self.balances().await?.free(&triangle.base);
        let mut legs = Vec::with_capacity(4);

        let leg1 = self
            .best_effort(
                LegRole::First,
                triangle.base_anchor(),
                Side::Sell,
                AmountSpec::Percentage(self.balance_fraction),
            )
            .await;
        let leg1_filled = leg1.filled;
        let sold = leg1.execution;
        legs.push(leg1);

        // Anchor received by leg 1 is what a revert spends to buy base back
        if !leg1_filled {
            if !sold.is_empty() {
                legs.push(self.unwind(triangle.base_anchor(), Side::Buy, sold.notional).await);
            }
            return self
                .finish(triangle, Direction::Backward, legs, before, !sold.is_empty(), RunStatus::Aborted)
                .await;
        }

        let leg2 = self
            .best_effort(
                LegRole::Second,
                triangle.asset_anchor(),
                Side::Buy,
                AmountSpec::Percentage(Decimal::ONE),
            )
            .await;
        let leg2_filled = leg2.filled;
        legs.push(leg2);

        if !leg2_filled {
            legs.push(self.unwind(triangle.base_anchor(), Side::Buy, sold.notional).await);
            return self
                .finish(triangle, Direction::Backward, legs, before, true, RunStatus::PartiallyReverted)
                .await;
        }

        let leg3 = self
            .best_effort(
                LegRole::Third,
                triangle.asset_base(),
                Side::Sell,
                AmountSpec::Percentage(Decimal::ONE),
            )
            .await;
        let leg3_filled = leg3.filled;
        legs.push(leg3);

        if !leg3_filled {
            // Close at market rather than stay long the asset
            legs.push(
                self.market(
                    LegRole::Third,
                    triangle.asset_base(),
                    Side::Sell,
                    AmountSpec::Percentage(Decimal::ONE),
                )
                .await,
            );
        }
        self.finish(triangle, Direction::Backward, legs, before, true, RunStatus::Completed)
            .await
    }

    async fn best_effort(
        &self,
        role: LegRole,
        pair: AssetPair,
        side: Side,
        amount: AmountSpec,
    ) -> LegRecord {
        let outcome = self.retry.execute(&pair, side, amount).await;
        let detail = match &outcome {
            BestPriceOutcome::Filled { price, .. } => format!("filled @ {}", price),
            BestPriceOutcome::Exhausted { attempts, execution } if !execution.is_empty() => format!(
                "unfilled after {} attempts, {} executed",
                attempts,
                execution.quantity.normalize()
            ),
            BestPriceOutcome::Exhausted { attempts, .. } => format!("unfilled after {} attempts", attempts),
            BestPriceOutcome::NotStarted(message) => format!("not started: {}", message),
        };
        info!(role = %role, pair = %pair, side = %side, "{}", detail);

        LegRecord {
            role,
            attempts: outcome.attempts(),
            filled: outcome.is_filled(),
            execution: outcome.execution(),
            detail,
            pair,
            side,
        }
    }

    async fn market(&self, role: LegRole, pair: AssetPair, side: Side, amount: AmountSpec) -> LegRecord {
        let leg = TradeLeg::market(pair.clone(), side, amount);
        let outcome = self.executor.place_order(&leg).await;
        if outcome.is_filled() {
            info!(role = %role, "{}: {}", leg, outcome);
        } else if role == LegRole::Revert {
            error!(role = %role, "{}: {}", leg, outcome);
        } else {
            warn!(role = %role, "{}: {}", leg, outcome);
        }

        LegRecord {
            role,
            pair,
            side,
            attempts: 1,
            filled: outcome.is_filled(),
            execution: Execution {
                quantity: outcome.executed(),
                notional: Decimal::ZERO,
            },
            detail: outcome.to_string(),
        }
    }

    /// Market order giving back `held` units of the currency a leg bought.
    ///
    /// Sells trade `held` of the pair's base directly; buys convert `held`
    /// units of the quote at a fresh ask. The amount is capped at what the
    /// account still holds.
    async fn unwind(&self, pair: AssetPair, side: Side, held: Decimal) -> LegRecord {
        let currency = match side {
            Side::Sell => &pair.base,
            Side::Buy => &pair.quote,
        };
        let held = match self.balances().await {
            Ok(balances) => held.min(balances.free(currency)),
            Err(e) => {
                warn!("Unwinding without a fresh balance: {}", e);
                held
            }
        };

        let amount = match side {
            Side::Sell => Ok(held),
            Side::Buy => self.convert_at_ask(&pair, held).await,
        };

        match amount {
            Ok(amount) => {
                debug!(pair = %pair, side = %side, amount = %amount, "Unwinding");
                self.market(LegRole::Revert, pair, side, AmountSpec::Absolute(amount))
                    .await
            }
            Err(e) => {
                error!(pair = %pair, "Cannot price unwind: {}", e);
                LegRecord {
                    role: LegRole::Revert,
                    pair,
                    side,
                    attempts: 0,
                    filled: false,
                    execution: Execution::default(),
                    detail: e.to_string(),
                }
            }
        }
    }

    async fn convert_at_ask(&self, pair: &AssetPair, quote_amount: Decimal) -> Result<Decimal> {
        let ask = self.gateway.fetch_ticker(pair).await?.ask;
        quote_amount
            .checked_div(ask)
            .ok_or_else(|| ClientError::InvalidResponse(format!("zero ask on {}", pair)))
    }

    async fn balances(&self) -> Result<Balances> {
        let mut attempt = 1;
        loop {
            match self.gateway.fetch_balance().await {
                Ok(balances) => return Ok(balances),
                Err(e) if e.is_transient() && attempt < BALANCE_READ_ATTEMPTS => {
                    debug!(attempt, "Balance read failed: {}", e);
                    attempt += 1;
                    tokio::time::sleep(self.retry_pause).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn finish(
        &self,
        triangle: &Triangle,
        direction: Direction,
        legs: Vec<LegRecord>,
        balance_before: Decimal,
        traded: bool,
        status: RunStatus,
    ) -> Result<ArbitrageRun> {
        // Other workers trade the same account, so a run that never traded
        // must not pick up their balance changes
        let balance_after = if !traded {
            balance_before
        } else {
            match self.balances().await {
                Ok(balances) => balances.free(&triangle.base),
                Err(e) => {
                    error!(asset = %triangle.asset, "Cannot measure run: {}", e);
                    self.notifier
                        .alert(&format!(
                            "Arbitrage {} ({}), {}, balance unavailable: {}",
                            triangle.asset, direction, status, e
                        ))
                        .await;
                    return Err(e);
                }
            }
        };
        let realized_diff = balance_after - balance_before;

        let cumulative = match self.ledger.append(realized_diff).await {
            Ok(entry) => entry.balance,
            Err(e) => {
                warn!("Ledger append failed: {}", e);
                self.ledger.baseline().await + realized_diff
            }
        };

        self.report_fiat(&triangle.base, realized_diff).await;
        self.notifier
            .alert(&format!(
                "Arbitrage {} ({}), {}, diff: {:.6} {}, balance: {:.6} {}",
                triangle.asset, direction, status, realized_diff, triangle.base, cumulative, triangle.base
            ))
            .await;

        Ok(ArbitrageRun {
            asset: triangle.asset.clone(),
            direction,
            legs,
            balance_before,
            balance_after,
            realized_diff,
            status,
        })
    }

    /// Value a base-currency diff in the report currency, best effort
    async fn report_fiat(&self, base: &str, diff: Decimal) {
        let Some(currency) = self.report_currency.as_deref() else {
            return;
        };
        if currency.eq_ignore_ascii_case(base) {
            return;
        }

        let pair = AssetPair::new(base, currency);
        match self.gateway.fetch_ticker(&pair).await {
            Ok(ticker) => {
                let value = diff * ticker.mid();
                self.notifier
                    .log(&format!("Difference: {:.6} {} = {:.2} {}", diff, base, value, pair.quote))
                    .await;
            }
            Err(e) => debug!(pair = %pair, "No fiat valuation: {}", e),
        }
    }
}
