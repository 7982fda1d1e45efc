use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::types::{AssetPair, Side};
use crate::strategy::Direction;

/// How much of an order to trade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AmountSpec {
    /// Fraction in (0, 1] of the relevant free balance: the quote asset
    /// for buys, the base asset for sells
    Percentage(Decimal),
    /// Quantity of the pair's base asset
    Absolute(Decimal),
}

impl std::fmt::Display for AmountSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmountSpec::Percentage(fraction) => {
                write!(f, "{}% of balance", (fraction * Decimal::ONE_HUNDRED).normalize())
            }
            AmountSpec::Absolute(amount) => write!(f, "{}", amount.normalize()),
        }
    }
}

/// One order within an arbitrage run
#[derive(Debug, Clone, PartialEq)]
pub struct TradeLeg {
    pub pair: AssetPair,
    pub side: Side,
    pub amount: AmountSpec,
    /// Market order when `None`
    pub limit_price: Option<Decimal>,
    /// How long a limit order may rest before it is checked and canceled
    pub timeout: Option<Duration>,
}

impl TradeLeg {
    pub fn market(pair: AssetPair, side: Side, amount: AmountSpec) -> Self {
        Self {
            pair,
            side,
            amount,
            limit_price: None,
            timeout: None,
        }
    }

    pub fn limit(pair: AssetPair, side: Side, amount: AmountSpec, price: Decimal) -> Self {
        Self {
            pair,
            side,
            amount,
            limit_price: Some(price),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_market(&self) -> bool {
        self.limit_price.is_none()
    }
}

impl std::fmt::Display for TradeLeg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.side, self.amount, self.pair)?;
        match self.limit_price {
            Some(price) => write!(f, " @ {}", price),
            None => write!(f, " @ market"),
        }
    }
}

/// Result of placing one order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    /// Fully executed; carries the base quantity traded
    Filled(Decimal),
    /// Not fully executed; carries the base quantity traded before the
    /// order was canceled
    Unfilled(Decimal),
    /// The gateway rejected or failed the request
    Error(String),
}

impl OrderOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, OrderOutcome::Filled(_))
    }

    /// Base quantity that changed hands, whatever the outcome
    pub fn executed(&self) -> Decimal {
        match self {
            OrderOutcome::Filled(quantity) | OrderOutcome::Unfilled(quantity) => *quantity,
            OrderOutcome::Error(_) => Decimal::ZERO,
        }
    }
}

impl std::fmt::Display for OrderOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderOutcome::Filled(quantity) => write!(f, "filled {}", quantity.normalize()),
            OrderOutcome::Unfilled(quantity) if quantity.is_zero() => write!(f, "unfilled"),
            OrderOutcome::Unfilled(quantity) => {
                write!(f, "unfilled, {} executed before cancel", quantity.normalize())
            }
            OrderOutcome::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// Running total of what a leg actually traded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Execution {
    /// Base quantity traded
    pub quantity: Decimal,
    /// Quote value of that quantity at the prices it traded at. Zero for
    /// market orders, whose fill price is not reported.
    pub notional: Decimal,
}

impl Execution {
    pub fn record(&mut self, quantity: Decimal, price: Decimal) {
        self.quantity += quantity;
        self.notional += quantity * price;
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero()
    }
}

/// Result of walking a book with limit orders
#[derive(Debug, Clone, PartialEq)]
pub enum BestPriceOutcome {
    /// The budget was filled by the `attempts`-th try
    Filled {
        price: Decimal,
        attempts: usize,
        execution: Execution,
    },
    /// No attempt completed the budget; `execution` holds partial fills
    Exhausted { attempts: usize, execution: Execution },
    /// The book or the balance could not be read, or there was nothing to
    /// trade; no order was placed
    NotStarted(String),
}

impl BestPriceOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, BestPriceOutcome::Filled { .. })
    }

    pub fn attempts(&self) -> usize {
        match self {
            BestPriceOutcome::Filled { attempts, .. } | BestPriceOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
            BestPriceOutcome::NotStarted(_) => 0,
        }
    }

    pub fn execution(&self) -> Execution {
        match self {
            BestPriceOutcome::Filled { execution, .. } | BestPriceOutcome::Exhausted { execution, .. } => {
                *execution
            }
            BestPriceOutcome::NotStarted(_) => Execution::default(),
        }
    }
}

/// Role of a leg within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegRole {
    First,
    Second,
    Third,
    /// Compensating order after a failed leg
    Revert,
}

impl std::fmt::Display for LegRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LegRole::First => write!(f, "leg 1"),
            LegRole::Second => write!(f, "leg 2"),
            LegRole::Third => write!(f, "leg 3"),
            LegRole::Revert => write!(f, "revert"),
        }
    }
}

/// What happened to one leg of a run
#[derive(Debug, Clone, PartialEq)]
pub struct LegRecord {
    pub role: LegRole,
    pub pair: AssetPair,
    pub side: Side,
    /// Limit attempts made, 1 for market orders
    pub attempts: usize,
    pub filled: bool,
    /// What the leg traded, including partial fills of unfilled legs
    pub execution: Execution,
    pub detail: String,
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// All three legs were placed
    Completed,
    /// The second leg failed and the first was unwound
    PartiallyReverted,
    /// The first leg failed; any partial fill was unwound
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::PartiallyReverted => write!(f, "partially reverted"),
            RunStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// One triggered opportunity from start to terminal state
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageRun {
    pub asset: String,
    pub direction: Direction,
    pub legs: Vec<LegRecord>,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    /// `balance_after - balance_before`, from gateway balances only.
    /// Zero without a balance read when the run never traded.
    pub realized_diff: Decimal,
    pub status: RunStatus,
}
