//! Wallet and inventory types
//!
//! The durable wallet lives in the ledger. The provisional ("spendable now")
//! balance lives in a cache and is only ever a number keyed by user, so it
//! has no type of its own here.

use crate::ids::{ProductName, UserId};
use crate::numeric::Quantity;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Durable wallet balance of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub currency: String,
    pub balance: Decimal,
}

impl Wallet {
    pub fn new(user_id: UserId, currency: impl Into<String>, balance: Decimal) -> Self {
        Self {
            user_id,
            currency: currency.into(),
            balance,
        }
    }

    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

/// Holding of one product by one user (the user's backpack)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub user_id: UserId,
    pub product: ProductName,
    pub quantity_held: i64,
}

impl InventoryEntry {
    /// First acquisition of a product
    pub fn acquired(user_id: UserId, product: ProductName, quantity: Quantity) -> Self {
        Self {
            user_id,
            product,
            quantity_held: quantity.as_i64(),
        }
    }

    /// Subsequent acquisition
    pub fn add(&mut self, quantity: Quantity) {
        self.quantity_held += quantity.as_i64();
    }
}
