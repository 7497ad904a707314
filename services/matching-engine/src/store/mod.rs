//! Ports to the external stores
//!
//! - [`LedgerStore`]: durable orders, wallets, inventory and product listings
//! - [`BalanceCache`]: per-user provisional ("spendable now") balance
//! - [`MarketPriceCache`]: per-product last traded price
//!
//! Every ledger mutation is expressed as a [`LedgerRecord`] so that the
//! durable adapter can journal exactly what the in-memory one applies.

pub mod memory;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use types::account::{InventoryEntry, Wallet};
use types::ids::{OrderId, ProductName, UserId};
use types::market::{MarketPrice, Product};
use types::order::{Order, OrderStatus};
use types::trade::SettlementRecord;

use crate::errors::{CacheError, StoreError};

pub use memory::{LedgerState, MemoryBalanceCache, MemoryLedger, MemoryPriceCache};

/// One atomic ledger mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerRecord {
    /// New `Wait` order persisted by intake
    OrderPlaced(Order),
    /// Status change guarded by the expected current status
    OrderTransitioned {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: i64,
    },
    /// Inventory credit, both order records and both wallet movements
    SettlementCommitted(SettlementRecord),
    WalletOpened(Wallet),
    ProductListed(Product),
}

impl LedgerRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerRecord::OrderPlaced(_) => "order_placed",
            LedgerRecord::OrderTransitioned { .. } => "order_transitioned",
            LedgerRecord::SettlementCommitted(_) => "settlement_committed",
            LedgerRecord::WalletOpened(_) => "wallet_opened",
            LedgerRecord::ProductListed(_) => "product_listed",
        }
    }
}

/// Durable ledger of orders, wallets, inventory and listings
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist a new `Wait` order
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// All `Wait` orders in insertion order
    async fn pending_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Compare-and-set the status of an order
    async fn transition(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: i64,
    ) -> Result<Order, StoreError>;

    /// Apply a settlement as one transaction, all or nothing
    async fn commit_settlement(&self, record: &SettlementRecord) -> Result<(), StoreError>;

    async fn wallet(&self, user: UserId) -> Result<Option<Wallet>, StoreError>;

    async fn open_wallet(&self, wallet: &Wallet) -> Result<(), StoreError>;

    async fn wallets(&self) -> Result<Vec<Wallet>, StoreError>;

    async fn inventory(&self, user: UserId) -> Result<Vec<InventoryEntry>, StoreError>;

    async fn product(&self, name: &ProductName) -> Result<Option<Product>, StoreError>;

    async fn list_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn products(&self) -> Result<Vec<Product>, StoreError>;

    /// Highest intake sequence ever persisted, 0 if none
    async fn last_order_sequence(&self) -> Result<u64, StoreError>;
}

/// Provisional balance cache
#[async_trait]
pub trait BalanceCache: Send + Sync {
    async fn available(&self, user: UserId) -> Result<Option<Decimal>, CacheError>;

    /// Set the balance only if the user has no entry yet
    async fn seed(&self, user: UserId, amount: Decimal) -> Result<(), CacheError>;

    /// Debit `amount` unless that would make the balance negative
    ///
    /// Returns the balance after the debit.
    async fn try_debit(&self, user: UserId, amount: Decimal) -> Result<Decimal, CacheError>;

    /// Credit `amount`, returning the balance after the credit
    async fn credit(&self, user: UserId, amount: Decimal) -> Result<Decimal, CacheError>;
}

/// Market price cache, one hash field per product
#[async_trait]
pub trait MarketPriceCache: Send + Sync {
    /// Batch read; products without an entry are absent from the result
    async fn get_many(
        &self,
        products: &[ProductName],
    ) -> Result<HashMap<ProductName, MarketPrice>, CacheError>;

    async fn get_all(&self) -> Result<HashMap<ProductName, MarketPrice>, CacheError>;

    async fn set(&self, product: &ProductName, price: &MarketPrice) -> Result<(), CacheError>;
}
