//! Order execution: single orders, book-walking retries, and full runs
//!
//! - [`OrderExecutor`]: places one order, maps gateway errors to [`OrderOutcome::Error`]
//! - [`BestPriceRetry`]: limit orders level by level until a fixed budget is filled
//! - [`ArbitrageOrchestrator`]: drives the three legs of a run and its failure paths

pub mod executor;
pub mod orchestrator;
pub mod retry;
pub mod types;

pub use executor::OrderExecutor;
pub use orchestrator::ArbitrageOrchestrator;
pub use retry::BestPriceRetry;
pub use types::{
    AmountSpec, ArbitrageRun, BestPriceOutcome, Execution, LegRecord, LegRole, OrderOutcome,
    RunStatus, TradeLeg,
};
