//! Per-cycle memo of ticker and order-book fetches
//!
//! Entries live until [`MarketDataCache::flush`] is called; a hit returns the
//! stored value no matter how much wall-clock time has passed. The scan
//! scheduler flushes after every batch so no decision ever reads data from a
//! previous batch.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::common::errors::Result;
use crate::common::traits::ExchangeGateway;
use crate::common::types::{AssetPair, BookSide, Exchange, OrderBook, PriceLevel, Ticker};

/// Kind of market data stored under a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Ticker,
    OrderBook,
}

/// Cache key: (exchange, pair, kind)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub exchange: Exchange,
    pub pair: AssetPair,
    pub kind: DataKind,
}

#[derive(Debug, Clone)]
enum CachedData {
    Ticker(Ticker),
    OrderBook(Arc<OrderBook>),
}

/// Thread-safe market data cache bound to one gateway.
///
/// Concurrent misses on the same key are not deduplicated: each caller
/// fetches, the first to store wins, and later writers get the stored value.
pub struct MarketDataCache {
    gateway: Arc<dyn ExchangeGateway>,
    entries: RwLock<HashMap<CacheKey, CachedData>>,
    /// Incremented on every flush
    generation: AtomicU64,
}

impl MarketDataCache {
    pub fn new(gateway: Arc<dyn ExchangeGateway>) -> Self {
        Self {
            gateway,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn exchange(&self) -> Exchange {
        self.gateway.exchange()
    }

    fn key(&self, pair: &AssetPair, kind: DataKind) -> CacheKey {
        CacheKey {
            exchange: self.exchange(),
            pair: pair.clone(),
            kind,
        }
    }

    /// Ticker for a pair, fetched at most once per cycle.
    ///
    /// A failed fetch is returned to the caller and not stored.
    pub async fn get_ticker(&self, pair: &AssetPair) -> Result<Ticker> {
        let key = self.key(pair, DataKind::Ticker);
        if let Some(CachedData::Ticker(ticker)) = self.entries.read().get(&key) {
            return Ok(*ticker);
        }

        debug!(pair = %pair, "Ticker cache miss");
        let fetched = self.gateway.fetch_ticker(pair).await?;

        let mut entries = self.entries.write();
        match entries.entry(key).or_insert(CachedData::Ticker(fetched)) {
            CachedData::Ticker(stored) => Ok(*stored),
            CachedData::OrderBook(_) => Ok(fetched),
        }
    }

    /// Full order book for a pair, fetched at most once per cycle
    pub async fn get_order_book(&self, pair: &AssetPair) -> Result<Arc<OrderBook>> {
        let key = self.key(pair, DataKind::OrderBook);
        if let Some(CachedData::OrderBook(book)) = self.entries.read().get(&key) {
            return Ok(Arc::clone(book));
        }

        debug!(pair = %pair, "Order book cache miss");
        let fetched = Arc::new(self.gateway.fetch_order_book(pair).await?);

        let mut entries = self.entries.write();
        match entries
            .entry(key)
            .or_insert_with(|| CachedData::OrderBook(Arc::clone(&fetched)))
        {
            CachedData::OrderBook(stored) => Ok(Arc::clone(stored)),
            CachedData::Ticker(_) => Ok(fetched),
        }
    }

    /// One side of a pair's order book, as sent by the exchange
    pub async fn get_order_book_side(&self, pair: &AssetPair, side: BookSide) -> Result<Vec<PriceLevel>> {
        let book = self.get_order_book(pair).await?;
        Ok(book.side(side).to_vec())
    }

    /// Drop every entry. Must be called between scan batches.
    pub fn flush(&self) {
        let mut entries = self.entries.write();
        let dropped = entries.len();
        entries.clear();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(dropped, generation, "Market data cache flushed");
    }

    /// Number of flushes so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
