use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::common::types::{Exchange, Side};

/// Fee configuration for an exchange
///
/// Factors are the fraction of an order's proceeds kept after the taker
/// fee, so a 0.1% fee is a factor of 0.999.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeFees {
    pub exchange: Exchange,
    /// Retention factor on buys
    pub buy_factor: Decimal,
    /// Retention factor on sells
    pub sell_factor: Decimal,
}

impl ExchangeFees {
    /// Binance spot fee structure
    /// - 0.1% taker fee on both sides
    pub fn binance() -> Self {
        Self {
            exchange: Exchange::Binance,
            buy_factor: dec!(0.999),
            sell_factor: dec!(0.999),
        }
    }

    /// Bittrex fee structure
    /// - 0.25% on both sides
    pub fn bittrex() -> Self {
        Self {
            exchange: Exchange::Bittrex,
            buy_factor: dec!(0.9975),
            sell_factor: dec!(0.9975),
        }
    }

    /// Get fees for an exchange
    pub fn for_exchange(exchange: Exchange) -> Self {
        match exchange {
            Exchange::Binance => Self::binance(),
            Exchange::Bittrex => Self::bittrex(),
        }
    }

    pub fn factor(&self, side: Side) -> Decimal {
        match side {
            Side::Buy => self.buy_factor,
            Side::Sell => self.sell_factor,
        }
    }
}

/// Retention factor in (0, 1] for one side of a trade on an exchange
pub fn fee_factor(exchange: Exchange, side: Side) -> Decimal {
    ExchangeFees::for_exchange(exchange).factor(side)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binance_fees() {
        assert_eq!(fee_factor(Exchange::Binance, Side::Buy), dec!(0.999));
        assert_eq!(fee_factor(Exchange::Binance, Side::Sell), dec!(0.999));
    }

    #[test]
    fn test_bittrex_fees() {
        let fees = ExchangeFees::bittrex();
        assert_eq!(fees.factor(Side::Buy), dec!(0.9975));
    }

    #[test]
    fn test_factors_are_retention_fractions() {
        for exchange in [Exchange::Binance, Exchange::Bittrex] {
            for side in [Side::Buy, Side::Sell] {
                let factor = fee_factor(exchange, side);
                assert!(factor > Decimal::ZERO && factor <= Decimal::ONE);
            }
        }
    }
}
