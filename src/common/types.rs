//! Unified types used across the gateways and the trading core

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Supported exchange identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Bittrex,
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exchange::Binance => write!(f, "Binance"),
            Exchange::Bittrex => write!(f, "Bittrex"),
        }
    }
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side of the book an order on this side trades against
    pub fn book_side(&self) -> BookSide {
        match self {
            Side::Buy => BookSide::Asks,
            Side::Sell => BookSide::Bids,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Market identifier, e.g. `ALT/ETH`: `base` is traded, priced in `quote`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetPair {
    pub base: String,
    pub quote: String,
}

impl AssetPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }
}

impl std::fmt::Display for AssetPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Top-of-book snapshot taken at fetch time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl Ticker {
    pub fn new(bid: Decimal, ask: Decimal) -> Self {
        Self { bid, ask }
    }

    /// Midpoint between bid and ask
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

/// A single price level in an order book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price at this level
    pub price: Decimal,
    /// Total size/quantity at this price level, in units of the pair's base
    pub size: Decimal,
}

impl PriceLevel {
    /// Create a new price level
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Which side of the book to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bids,
    Asks,
}

/// Full order book for a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    /// Market this book belongs to
    pub pair: AssetPair,
    /// Bid (buy) orders, in whatever order the exchange sent them
    pub bids: Vec<PriceLevel>,
    /// Ask (sell) orders, in whatever order the exchange sent them
    pub asks: Vec<PriceLevel>,
    /// Timestamp of this snapshot
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    pub fn new(pair: AssetPair, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self {
            pair,
            bids,
            asks,
            timestamp: Utc::now(),
        }
    }

    /// Levels of one side, unsorted
    pub fn side(&self, side: BookSide) -> &[PriceLevel] {
        match side {
            BookSide::Bids => &self.bids,
            BookSide::Asks => &self.asks,
        }
    }

    /// Levels of one side sorted best-first: asks ascending, bids descending
    pub fn sorted_side(&self, side: BookSide) -> Vec<PriceLevel> {
        let mut levels = self.side(side).to_vec();
        match side {
            BookSide::Asks => levels.sort_by(|a, b| a.price.cmp(&b.price)),
            BookSide::Bids => levels.sort_by(|a, b| b.price.cmp(&a.price)),
        }
        levels
    }

    /// Get the best bid (highest buy order)
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.iter().max_by(|a, b| a.price.cmp(&b.price)).cloned()
    }

    /// Get the best ask (lowest sell order)
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.iter().min_by(|a, b| a.price.cmp(&b.price)).cloned()
    }
}

/// An order still resting on the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub id: String,
    pub pair: AssetPair,
    pub side: Side,
    pub price: Decimal,
    /// Original quantity
    pub amount: Decimal,
    /// Quantity executed so far
    pub filled: Decimal,
}

impl OpenOrder {
    pub fn is_partially_filled(&self) -> bool {
        self.filled > Decimal::ZERO
    }
}

/// Free balance per asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    free: HashMap<String, Decimal>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, asset: impl Into<String>, amount: Decimal) -> Self {
        self.set(asset, amount);
        self
    }

    pub fn set(&mut self, asset: impl Into<String>, amount: Decimal) {
        self.free.insert(asset.into().to_uppercase(), amount);
    }

    /// Free amount of an asset, zero when the exchange did not report it
    pub fn free(&self, asset: &str) -> Decimal {
        self.free
            .get(&asset.to_uppercase())
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}
