//! Market data access for the scan loop

pub mod cache;

pub use cache::{CacheKey, DataKind, MarketDataCache};
