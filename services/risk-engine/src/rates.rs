//! Currency exchange rates
//!
//! A rate converts an amount in `from` into `to`: `amount × rate(from, to)`.
//! Pairs are directional; the table does not derive a missing reverse rate.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::errors::CheckError;

/// Directional exchange rate table
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: HashMap<(String, String), Decimal>,
}

impl RateTable {
    /// Table with no pairs; only same-currency conversions succeed
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    /// USD / CNY / TWD pairs
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for (from, to, rate) in [
            ("USD", "CNY", Decimal::new(65, 1)),
            ("CNY", "USD", Decimal::new(15, 2)),
            ("TWD", "USD", Decimal::new(32, 3)),
            ("USD", "TWD", Decimal::from(32)),
            ("TWD", "CNY", Decimal::new(23, 2)),
            ("CNY", "TWD", Decimal::new(44, 1)),
        ] {
            table.rates.insert((from.to_string(), to.to_string()), rate);
        }
        table
    }

    /// Add or replace a pair; the rate must be positive
    pub fn set(&mut self, from: &str, to: &str, rate: Decimal) -> Result<(), CheckError> {
        if rate <= Decimal::ZERO {
            return Err(CheckError::invalid("rate", format!("{from}->{to} must be positive, got {rate}")));
        }
        let (from, to) = (normalize(from), normalize(to));
        if from.is_empty() || to.is_empty() {
            return Err(CheckError::invalid("currency", "must not be blank"));
        }
        self.rates.insert((from, to), rate);
        Ok(())
    }

    /// Rate converting `from` into `to`
    pub fn rate(&self, from: &str, to: &str) -> Result<Decimal, CheckError> {
        let (from, to) = (normalize(from), normalize(to));
        if from == to {
            return Ok(Decimal::ONE);
        }
        self.rates
            .get(&(from.clone(), to.clone()))
            .copied()
            .ok_or(CheckError::UnsupportedPair { from, to })
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn normalize(currency: &str) -> String {
    currency.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_currency_is_identity() {
        let table = RateTable::empty();
        assert_eq!(table.rate("USD", "USD").unwrap(), Decimal::ONE);
        assert_eq!(table.rate("eur", "EUR").unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_builtin_pairs() {
        let table = RateTable::builtin();
        assert_eq!(table.len(), 6);
        assert_eq!(table.rate("USD", "CNY").unwrap(), Decimal::from_str_exact("6.5").unwrap());
        assert_eq!(table.rate("CNY", "USD").unwrap(), Decimal::from_str_exact("0.15").unwrap());
        assert_eq!(table.rate("TWD", "USD").unwrap(), Decimal::from_str_exact("0.032").unwrap());
        assert_eq!(table.rate("USD", "TWD").unwrap(), Decimal::from(32));
        assert_eq!(table.rate("TWD", "CNY").unwrap(), Decimal::from_str_exact("0.23").unwrap());
        assert_eq!(table.rate("cny", "twd").unwrap(), Decimal::from_str_exact("4.4").unwrap());
    }

    #[test]
    fn test_unknown_pair_is_rejected() {
        let err = RateTable::builtin().rate("USD", "JPY").unwrap_err();
        assert_eq!(
            err,
            CheckError::UnsupportedPair {
                from: "USD".to_string(),
                to: "JPY".to_string()
            }
        );
    }

    #[test]
    fn test_override_replaces_pair() {
        let mut table = RateTable::builtin();
        table.set("usd", "cny", Decimal::from(7)).unwrap();
        assert_eq!(table.rate("USD", "CNY").unwrap(), Decimal::from(7));
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn test_non_positive_rate_refused() {
        let mut table = RateTable::empty();
        assert!(table.set("USD", "JPY", Decimal::ZERO).is_err());
        assert!(table.set("USD", "JPY", Decimal::from(-1)).is_err());
        assert!(table.set(" ", "JPY", Decimal::ONE).is_err());
        assert!(table.is_empty());
    }
}
