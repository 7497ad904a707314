//! Product listings and the cached market price

use crate::ids::{ProductName, UserId};
use crate::numeric::Price;
use serde::{Deserialize, Serialize};

/// A listed product as held by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: ProductName,
    pub quantity_listed: i64,
    pub currency: String,
    /// Listing price the market price is seeded from
    pub base_price: Price,
    pub listed_by: Option<UserId>,
    pub listed_at: i64, // Unix nanos
}

impl Product {
    pub fn new(
        name: ProductName,
        quantity_listed: i64,
        currency: impl Into<String>,
        base_price: Price,
        timestamp: i64,
    ) -> Self {
        Self {
            name,
            quantity_listed,
            currency: currency.into(),
            base_price,
            listed_by: None,
            listed_at: timestamp,
        }
    }

    pub fn listed_by(mut self, user: UserId) -> Self {
        self.listed_by = Some(user);
        self
    }

    /// Market price entry used when the cache has none yet
    pub fn seed_price(&self) -> MarketPrice {
        MarketPrice {
            quantity_listed: self.quantity_listed,
            currency: self.currency.clone(),
            last_price: self.base_price,
        }
    }
}

/// Per-product last traded price
///
/// `last_price` is a [`Price`] and therefore never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    pub quantity_listed: i64,
    pub currency: String,
    pub last_price: Price,
}

impl MarketPrice {
    /// Same entry with a new last traded price
    pub fn with_last_price(&self, last_price: Price) -> Self {
        Self {
            last_price,
            ..self.clone()
        }
    }
}

/// A product with its base and current price, as listed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductQuote {
    pub product_name: ProductName,
    pub product_count: i64,
    pub currency: String,
    pub base_amount: Price,
    pub now_amount: Price,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_price_from_listing() {
        let product = Product::new(ProductName::new("Widget"), 100, "USD", Price::from_u64(10), 0);
        let seeded = product.seed_price();

        assert_eq!(seeded.last_price, Price::from_u64(10));
        assert_eq!(seeded.quantity_listed, 100);
        assert_eq!(seeded.currency, "USD");
    }

    #[test]
    fn test_with_last_price_keeps_listing() {
        let price = MarketPrice {
            quantity_listed: 3,
            currency: "TWD".to_string(),
            last_price: Price::from_u64(30),
        };
        let updated = price.with_last_price(Price::from_u64(25));

        assert_eq!(updated.last_price, Price::from_u64(25));
        assert_eq!(updated.quantity_listed, 3);
    }
}
