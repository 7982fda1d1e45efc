//! Strategy module for opportunity detection
//!
//! This module turns cached market data into an expected return for each
//! direction around a triangle.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 PER ASSET, PER SCAN CYCLE                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  MarketDataCache (tickers / order books, one fetch each)    │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  ArbitrageEstimator                                         │
//! │    - ticker mode: top-of-book bid/ask                       │
//! │    - order-book mode: limit_price() per leg                 │
//! │    - fee factors from ExchangeFees                          │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  ArbitrageEstimate { direction, asset, return_pct }         │
//! │    - sentinels -1 / -100 never exceed a threshold           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`ExchangeFees`] / [`fee_factor`]: static per-exchange retention factors
//! - [`limit_price`]: depth-safe limit price from one side of a book
//! - [`ArbitrageEstimator`]: forward/backward expected returns
//! - [`ArbitrageEstimate`]: result, with the quotes it was built from

mod estimator;
mod fees;
mod pricing;
mod types;

pub use types::{
    ArbitrageEstimate,
    Direction,
    LegQuote,
    PathQuotes,
    Triangle,
    DEGENERATE_RETURN,
    INSUFFICIENT_DEPTH_RETURN,
};

pub use estimator::{
    backward_return,
    estimate_from_quotes,
    forward_return,
    path_legs,
    ArbitrageEstimator,
};

pub use fees::{fee_factor, ExchangeFees};
pub use pricing::limit_price;
