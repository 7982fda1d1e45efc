use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::types::{AssetPair, Side};

/// Returned when a path price is zero and the product cannot be formed
pub const DEGENERATE_RETURN: Decimal = dec!(-1);

/// Returned when a book is too thin to price one of the legs
pub const INSUFFICIENT_DEPTH_RETURN: Decimal = dec!(-100);

/// Direction around the triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// base -> asset -> anchor -> base
    Forward,
    /// base -> anchor -> asset -> base
    Backward,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

/// The three currencies of one arbitrage cycle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triangle {
    pub base: String,
    pub anchor: String,
    pub asset: String,
}

impl Triangle {
    pub fn new(base: impl Into<String>, anchor: impl Into<String>, asset: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            anchor: anchor.into().to_uppercase(),
            asset: asset.into().to_uppercase(),
        }
    }

    /// e.g. ALT/ETH
    pub fn asset_base(&self) -> AssetPair {
        AssetPair::new(&self.asset, &self.base)
    }

    /// e.g. ALT/BTC
    pub fn asset_anchor(&self) -> AssetPair {
        AssetPair::new(&self.asset, &self.anchor)
    }

    /// e.g. ETH/BTC
    pub fn base_anchor(&self) -> AssetPair {
        AssetPair::new(&self.base, &self.anchor)
    }

    /// Human readable path, e.g. `ETH -> ALT -> BTC -> ETH`
    pub fn path(&self, direction: Direction) -> String {
        match direction {
            Direction::Forward => format!(
                "{} -> {} -> {} -> {}",
                self.base, self.asset, self.anchor, self.base
            ),
            Direction::Backward => format!(
                "{} -> {} -> {} -> {}",
                self.base, self.anchor, self.asset, self.base
            ),
        }
    }
}

/// Price a leg was estimated at
#[derive(Debug, Clone, PartialEq)]
pub struct LegQuote {
    pub pair: AssetPair,
    pub side: Side,
    pub price: Decimal,
}

impl std::fmt::Display for LegQuote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} @ {}", self.side, self.pair, self.price)
    }
}

/// Prices used along one path, in the order the legs execute
#[derive(Debug, Clone, PartialEq)]
pub struct PathQuotes {
    pub legs: [LegQuote; 3],
}

/// Expected return of one direction for one asset, recomputed every cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageEstimate {
    pub direction: Direction,
    pub asset: String,
    /// Percent return net of fees, or one of the sentinels
    pub return_pct: Decimal,
    /// Prices the estimate was built from, absent for sentinels
    pub quotes: Option<PathQuotes>,
}

impl ArbitrageEstimate {
    pub fn is_degenerate(&self) -> bool {
        self.return_pct == DEGENERATE_RETURN && self.quotes.is_none()
    }

    pub fn is_insufficient_depth(&self) -> bool {
        self.return_pct == INSUFFICIENT_DEPTH_RETURN && self.quotes.is_none()
    }

    /// Whether this estimate should trigger a run. Sentinels never do,
    /// whatever the threshold.
    pub fn exceeds(&self, threshold_pct: Decimal) -> bool {
        self.quotes.is_some() && self.return_pct > threshold_pct
    }
}
