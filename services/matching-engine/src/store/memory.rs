//! In-memory store adapters
//!
//! [`LedgerState`] is the ledger's state machine: every mutation is a
//! [`LedgerRecord`] that is fully validated before anything is changed, so a
//! rejected record leaves the state untouched. [`MemoryLedger`] wraps it for
//! tests and single-process deployments; the persistence crate journals the
//! same records before applying them.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use types::account::{InventoryEntry, Wallet};
use types::ids::{OrderId, ProductName, UserId};
use types::market::{MarketPrice, Product};
use types::order::{Order, OrderStatus, Side};
use types::trade::SettlementRecord;
use types::wire::MarketPriceEntry;

use super::{BalanceCache, LedgerRecord, LedgerStore, MarketPriceCache};
use crate::errors::{CacheError, StoreError};

/// Ledger contents and the rules for changing them
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    orders: HashMap<OrderId, Order>,
    /// Order ids in insertion order
    order_log: Vec<OrderId>,
    wallets: HashMap<UserId, Wallet>,
    inventory: HashMap<UserId, BTreeMap<ProductName, InventoryEntry>>,
    products: BTreeMap<ProductName, Product>,
    settlements: Vec<SettlementRecord>,
    last_sequence: u64,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a record against the current state without applying it
    pub fn validate(&self, record: &LedgerRecord) -> Result<(), StoreError> {
        match record {
            LedgerRecord::OrderPlaced(order) => {
                if self.orders.contains_key(&order.order_id) {
                    return Err(StoreError::Duplicate {
                        entity: "order",
                        key: order.order_id.to_string(),
                    });
                }
                if !order.is_waiting() {
                    return Err(StoreError::Inconsistent(format!(
                        "new order {} must be wait, got {}",
                        order.order_id, order.status
                    )));
                }
                Ok(())
            }
            LedgerRecord::OrderTransitioned { order_id, from, to, .. } => {
                let current = self.require_order(order_id)?;
                if current.status != *from || !from.can_transition_to(*to) {
                    return Err(StoreError::InvalidTransition {
                        order_id: order_id.clone(),
                        from: current.status,
                        to: *to,
                    });
                }
                Ok(())
            }
            LedgerRecord::SettlementCommitted(record) => self.validate_settlement(record),
            LedgerRecord::WalletOpened(wallet) => {
                if self.wallets.contains_key(&wallet.user_id) {
                    return Err(StoreError::Duplicate {
                        entity: "wallet",
                        key: wallet.user_id.to_string(),
                    });
                }
                Ok(())
            }
            LedgerRecord::ProductListed(product) => {
                if self.products.contains_key(&product.name) {
                    return Err(StoreError::Duplicate {
                        entity: "product",
                        key: product.name.to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    fn validate_settlement(&self, record: &SettlementRecord) -> Result<(), StoreError> {
        let buy = self.require_order(&record.buy_order_id)?;
        let sell = self.require_order(&record.sell_order_id)?;

        for order in [buy, sell] {
            if !order.is_waiting() {
                return Err(StoreError::InvalidTransition {
                    order_id: order.order_id.clone(),
                    from: order.status,
                    to: OrderStatus::Finished,
                });
            }
        }
        if buy.side != Side::Buy || sell.side != Side::Sell {
            return Err(StoreError::Inconsistent(format!(
                "{} / {} are not a buy/sell pair",
                buy.order_id, sell.order_id
            )));
        }
        if buy.owner_id != record.buyer || sell.owner_id != record.seller {
            return Err(StoreError::Inconsistent("parties do not match the orders".to_string()));
        }
        if record.buyer == record.seller {
            return Err(StoreError::Inconsistent(format!("self-trade by user {}", record.buyer)));
        }
        if buy.product_name != record.product || sell.product_name != record.product {
            return Err(StoreError::Inconsistent(format!(
                "orders are not both for {}",
                record.product
            )));
        }
        if record.seller_credit > record.notional || record.seller_credit.is_sign_negative() {
            return Err(StoreError::Inconsistent(format!(
                "seller credit {} outside [0, {}]",
                record.seller_credit, record.notional
            )));
        }

        let buyer_wallet = self.require_wallet(record.buyer)?;
        self.require_wallet(record.seller)?;
        if !buyer_wallet.can_cover(record.notional) {
            return Err(StoreError::InsufficientFunds {
                user: record.buyer,
                required: record.notional.to_string(),
                available: buyer_wallet.balance.to_string(),
            });
        }
        Ok(())
    }

    /// Validate then apply a record
    ///
    /// On error nothing has been changed.
    pub fn apply(&mut self, record: LedgerRecord) -> Result<(), StoreError> {
        self.validate(&record)?;
        match record {
            LedgerRecord::OrderPlaced(order) => {
                self.last_sequence = self.last_sequence.max(order.sequence);
                self.order_log.push(order.order_id.clone());
                self.orders.insert(order.order_id.clone(), order);
            }
            LedgerRecord::OrderTransitioned { order_id, to, at, .. } => {
                let mut order = self.require_order(&order_id)?.clone();
                order
                    .transition(to, at)
                    .map_err(|e| StoreError::Inconsistent(e.to_string()))?;
                self.orders.insert(order_id, order);
            }
            LedgerRecord::SettlementCommitted(record) => self.apply_settlement(record)?,
            LedgerRecord::WalletOpened(wallet) => {
                self.wallets.insert(wallet.user_id, wallet);
            }
            LedgerRecord::ProductListed(product) => {
                self.products.insert(product.name.clone(), product);
            }
        }
        Ok(())
    }

    fn apply_settlement(&mut self, record: SettlementRecord) -> Result<(), StoreError> {
        // Stage every change first so a failure cannot leave half a trade.
        let mut sell = self.require_order(&record.sell_order_id)?.clone();
        let mut buy = self.require_order(&record.buy_order_id)?.clone();
        sell.finish(record.notional, record.buyer, record.executed_at)
            .map_err(|e| StoreError::Inconsistent(e.to_string()))?;
        buy.finish(record.notional, record.seller, record.executed_at)
            .map_err(|e| StoreError::Inconsistent(e.to_string()))?;
        let mut buyer_wallet = self.require_wallet(record.buyer)?.clone();
        let mut seller_wallet = self.require_wallet(record.seller)?.clone();
        buyer_wallet.balance -= record.notional;
        seller_wallet.balance += record.seller_credit;

        self.inventory
            .entry(record.buyer)
            .or_default()
            .entry(record.product.clone())
            .and_modify(|entry| entry.add(record.quantity))
            .or_insert_with(|| {
                InventoryEntry::acquired(record.buyer, record.product.clone(), record.quantity)
            });
        self.orders.insert(sell.order_id.clone(), sell);
        self.orders.insert(buy.order_id.clone(), buy);
        self.wallets.insert(record.buyer, buyer_wallet);
        self.wallets.insert(record.seller, seller_wallet);
        self.settlements.push(record);
        Ok(())
    }

    fn require_order(&self, order_id: &OrderId) -> Result<&Order, StoreError> {
        self.orders
            .get(order_id)
            .ok_or_else(|| StoreError::order_not_found(order_id))
    }

    fn require_wallet(&self, user: UserId) -> Result<&Wallet, StoreError> {
        self.wallets.get(&user).ok_or_else(|| StoreError::NotFound {
            entity: "wallet",
            key: user.to_string(),
        })
    }

    pub fn order(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// `Wait` orders in insertion order
    pub fn pending_orders(&self) -> Vec<Order> {
        self.order_log
            .iter()
            .filter_map(|id| self.orders.get(id))
            .filter(|o| o.is_waiting())
            .cloned()
            .collect()
    }

    pub fn wallet(&self, user: UserId) -> Option<&Wallet> {
        self.wallets.get(&user)
    }

    /// Every wallet, ordered by user id
    pub fn wallets(&self) -> Vec<Wallet> {
        let mut wallets: Vec<Wallet> = self.wallets.values().cloned().collect();
        wallets.sort_by_key(|w| w.user_id.as_i64());
        wallets
    }

    pub fn inventory(&self, user: UserId) -> Vec<InventoryEntry> {
        self.inventory
            .get(&user)
            .map(|held| held.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn product(&self, name: &ProductName) -> Option<&Product> {
        self.products.get(name)
    }

    pub fn products(&self) -> Vec<Product> {
        self.products.values().cloned().collect()
    }

    pub fn settlements(&self) -> &[SettlementRecord] {
        &self.settlements
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn order_count(&self) -> usize {
        self.order_log.len()
    }
}

/// Ledger held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: RwLock<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: LedgerState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Copy of the current state
    pub async fn state(&self) -> LedgerState {
        self.state.read().await.clone()
    }

    async fn write(&self, record: LedgerRecord) -> Result<(), StoreError> {
        self.state.write().await.apply(record)
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.write(LedgerRecord::OrderPlaced(order.clone())).await
    }

    async fn order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.state.read().await.order(order_id).cloned())
    }

    async fn pending_orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.state.read().await.pending_orders())
    }

    async fn transition(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: i64,
    ) -> Result<Order, StoreError> {
        let mut state = self.state.write().await;
        state.apply(LedgerRecord::OrderTransitioned {
            order_id: order_id.clone(),
            from,
            to,
            at,
        })?;
        state
            .order(order_id)
            .cloned()
            .ok_or_else(|| StoreError::order_not_found(order_id))
    }

    async fn commit_settlement(&self, record: &SettlementRecord) -> Result<(), StoreError> {
        self.write(LedgerRecord::SettlementCommitted(record.clone())).await
    }

    async fn wallet(&self, user: UserId) -> Result<Option<Wallet>, StoreError> {
        Ok(self.state.read().await.wallet(user).cloned())
    }

    async fn open_wallet(&self, wallet: &Wallet) -> Result<(), StoreError> {
        self.write(LedgerRecord::WalletOpened(wallet.clone())).await
    }

    async fn wallets(&self) -> Result<Vec<Wallet>, StoreError> {
        Ok(self.state.read().await.wallets())
    }

    async fn inventory(&self, user: UserId) -> Result<Vec<InventoryEntry>, StoreError> {
        Ok(self.state.read().await.inventory(user))
    }

    async fn product(&self, name: &ProductName) -> Result<Option<Product>, StoreError> {
        Ok(self.state.read().await.product(name).cloned())
    }

    async fn list_product(&self, product: &Product) -> Result<(), StoreError> {
        self.write(LedgerRecord::ProductListed(product.clone())).await
    }

    async fn products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.state.read().await.products())
    }

    async fn last_order_sequence(&self) -> Result<u64, StoreError> {
        Ok(self.state.read().await.last_sequence())
    }
}

/// Provisional balances keyed by user
#[derive(Debug, Default)]
pub struct MemoryBalanceCache {
    balances: DashMap<UserId, Decimal>,
}

impl MemoryBalanceCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceCache for MemoryBalanceCache {
    async fn available(&self, user: UserId) -> Result<Option<Decimal>, CacheError> {
        Ok(self.balances.get(&user).map(|b| *b))
    }

    async fn seed(&self, user: UserId, amount: Decimal) -> Result<(), CacheError> {
        self.balances.entry(user).or_insert(amount);
        Ok(())
    }

    async fn try_debit(&self, user: UserId, amount: Decimal) -> Result<Decimal, CacheError> {
        let mut balance = self.balances.get_mut(&user).ok_or_else(|| CacheError::Missing {
            key: format!("balance:{user}"),
        })?;
        if *balance < amount {
            return Err(CacheError::InsufficientFunds {
                required: amount.to_string(),
                available: balance.to_string(),
            });
        }
        *balance -= amount;
        Ok(*balance)
    }

    async fn credit(&self, user: UserId, amount: Decimal) -> Result<Decimal, CacheError> {
        let mut balance = self.balances.entry(user).or_insert(Decimal::ZERO);
        *balance += amount;
        Ok(*balance)
    }
}

/// Market prices stored as JSON-encoded hash values, like the external cache
#[derive(Debug, Default)]
pub struct MemoryPriceCache {
    entries: DashMap<ProductName, String>,
}

impl MemoryPriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, product: &ProductName, raw: &str) {
        self.entries.insert(product.clone(), raw.to_string());
    }

    fn decode(product: &ProductName, raw: &str) -> Result<MarketPrice, CacheError> {
        MarketPriceEntry::decode(raw).map_err(|e| CacheError::Corrupt {
            key: product.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl MarketPriceCache for MemoryPriceCache {
    async fn get_many(
        &self,
        products: &[ProductName],
    ) -> Result<HashMap<ProductName, MarketPrice>, CacheError> {
        let mut found = HashMap::with_capacity(products.len());
        for product in products {
            if let Some(raw) = self.entries.get(product) {
                found.insert(product.clone(), Self::decode(product, raw.value())?);
            }
        }
        Ok(found)
    }

    async fn get_all(&self) -> Result<HashMap<ProductName, MarketPrice>, CacheError> {
        self.entries
            .iter()
            .map(|entry| Ok((entry.key().clone(), Self::decode(entry.key(), entry.value())?)))
            .collect()
    }

    async fn set(&self, product: &ProductName, price: &MarketPrice) -> Result<(), CacheError> {
        let raw = MarketPriceEntry::encode(price).map_err(|e| CacheError::Corrupt {
            key: product.to_string(),
            reason: e.to_string(),
        })?;
        self.entries.insert(product.clone(), raw);
        Ok(())
    }
}
