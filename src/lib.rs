//! Triarb Library
//!
//! An unattended triangular-arbitrage engine for centralized crypto
//! exchanges: scans an asset universe, estimates forward and backward
//! returns around base/anchor/asset triangles, and executes the three legs
//! when an estimate clears the configured threshold.

pub mod common;
pub mod config;
pub mod exchange;
pub mod execution;
pub mod market;
pub mod reporting;
pub mod scan;
pub mod strategy;

// Re-export commonly used types
pub use common::errors::{ClientError, Result};
pub use common::traits::{ExchangeGateway, Notifier};
pub use common::types::{
    AssetPair, Balances, BookSide, Exchange, OpenOrder, OrderBook, PriceLevel, Side, Ticker,
};
pub use config::types::AppConfig;
pub use exchange::{BinanceRestClient, BittrexRestClient};
pub use market::MarketDataCache;
pub use reporting::{BalanceLedger, NotificationSink};
pub use scan::ScanScheduler;

// Trading core
pub use execution::{
    AmountSpec, ArbitrageOrchestrator, ArbitrageRun, BestPriceRetry, OrderExecutor, OrderOutcome,
    RunStatus, TradeLeg,
};
pub use strategy::{ArbitrageEstimate, ArbitrageEstimator, Direction, Triangle};
