//! Pre-authorization hold
//!
//! A buy order withholds its estimated cost from the provisional balance at
//! intake. The cost is in the wallet's currency, money-rounded.

use rust_decimal::Decimal;
use types::numeric::{round_money, Price, Quantity};

use crate::errors::CheckError;

/// `unit_price × quantity × fx_rate`, rounded to money scale
pub fn estimated_cost(unit_price: Price, quantity: Quantity, fx_rate: Decimal) -> Decimal {
    round_money(unit_price.times(quantity) * fx_rate)
}

/// The hold may consume the whole available amount but never more
pub fn check_hold(cost: Decimal, available: Decimal) -> Result<(), CheckError> {
    if cost > available {
        return Err(CheckError::InsufficientFunds {
            required: cost,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn qty(n: i64) -> Quantity {
        Quantity::try_new(n).unwrap()
    }

    #[test]
    fn test_cost_same_currency() {
        assert_eq!(estimated_cost(Price::from_u64(8), qty(5), Decimal::ONE), Decimal::from(40));
    }

    #[test]
    fn test_cost_is_rounded_half_up() {
        // 3 × 1.115 × 1 = 3.345
        let price = Price::from_str("1.115").unwrap();
        assert_eq!(
            estimated_cost(price, qty(3), Decimal::ONE),
            Decimal::from_str_exact("3.35").unwrap()
        );
    }

    #[test]
    fn test_cost_converted() {
        // 10 × 2 × 0.032
        let cost = estimated_cost(Price::from_u64(10), qty(2), Decimal::from_str_exact("0.032").unwrap());
        assert_eq!(cost, Decimal::from_str_exact("0.64").unwrap());
    }

    #[test]
    fn test_exact_balance_is_enough() {
        assert!(check_hold(Decimal::from(40), Decimal::from(40)).is_ok());
        assert_eq!(
            check_hold(Decimal::from(41), Decimal::from(40)),
            Err(CheckError::InsufficientFunds {
                required: Decimal::from(41),
                available: Decimal::from(40)
            })
        );
    }

    proptest! {
        #[test]
        fn prop_hold_never_exceeds_available(
            cents in 0u32..1_000_000,
            n in 1i64..1_000,
            available_cents in 0i64..100_000_000,
        ) {
            let price = Price::try_new(Decimal::new(cents as i64, 2)).unwrap();
            let available = Decimal::new(available_cents, 2);
            let cost = estimated_cost(price, qty(n), Decimal::ONE);
            prop_assert_eq!(cost, price.times(qty(n)));
            prop_assert_eq!(check_hold(cost, available).is_ok(), cost <= available);
        }
    }
}
