//! Depth-safe limit prices
//!
//! The first `skip_levels` best levels of a book are usually thin and move
//! fastest, so they are never used to price a leg.

use rust_decimal::Decimal;

use crate::common::types::{PriceLevel, Side};

/// Limit price for trading `amount` on `side`, or `None` when the book
/// cannot safely price the leg.
///
/// Buys read asks from cheapest up, sells read bids from highest down.
/// After skipping `skip_levels` levels, the first level whose size covers
/// `amount` gives the price.
pub fn limit_price(
    levels: &[PriceLevel],
    side: Side,
    skip_levels: usize,
    amount: Decimal,
) -> Option<Decimal> {
    if levels.len() < skip_levels {
        return None;
    }

    let mut sorted = levels.to_vec();
    match side {
        Side::Buy => sorted.sort_by(|a, b| a.price.cmp(&b.price)),
        Side::Sell => sorted.sort_by(|a, b| b.price.cmp(&a.price)),
    }

    sorted
        .into_iter()
        .skip(skip_levels)
        .find(|level| level.size >= amount)
        .map(|level| level.price)
}
