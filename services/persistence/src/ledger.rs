//! Journaled ledger store
//!
//! Write path for every mutation:
//! 1. validate the record against the current state
//! 2. append it to the journal (flushed, fsynced per policy)
//! 3. apply it in memory
//!
//! A record is acknowledged only after it is in the journal, and it is
//! journaled only if applying it cannot fail, so replay always reproduces
//! the acknowledged ledger. A failed append poisons the journal, so a record
//! that may have reached the file is never followed by one that contradicts
//! it; the ledger refuses writes until it is reopened. Writes are serialized
//! by the state lock; the journal I/O runs while holding it.

use async_trait::async_trait;
use matching_engine::errors::StoreError;
use matching_engine::store::{LedgerRecord, LedgerState, LedgerStore};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use types::account::{InventoryEntry, Wallet};
use types::ids::{OrderId, ProductName, UserId};
use types::market::Product;
use types::now_nanos;
use types::order::{Order, OrderStatus};
use types::trade::SettlementRecord;

use crate::journal::{JournalConfig, JournalError, JournalWriter};
use crate::recovery::{recover, Recovered, RecoveryError};

struct Inner {
    state: LedgerState,
    writer: JournalWriter,
}

impl Inner {
    fn commit(&mut self, record: LedgerRecord) -> Result<(), StoreError> {
        self.state.validate(&record)?;

        let kind = record.kind();
        let entry = self.writer.append_record(now_nanos(), &record).map_err(|e| {
            error!(kind, error = %e, "Journal append failed");
            StoreError::Unavailable(e.to_string())
        })?;
        self.state.apply(record)?;
        debug!(kind, sequence = entry.sequence, "Ledger record committed");
        Ok(())
    }
}

/// Ledger store backed by the append-only journal
pub struct JournaledLedger {
    inner: RwLock<Inner>,
}

impl JournaledLedger {
    /// Recover the ledger from `config.dir` and open it for writing
    pub fn open(config: JournalConfig) -> Result<(Self, Recovered), RecoveryError> {
        let recovered = recover(&config.dir)?;
        let mut writer = JournalWriter::open(config).map_err(|e| match e {
            JournalError::Io(io) => RecoveryError::Io(io),
            other => RecoveryError::Io(std::io::Error::other(other.to_string())),
        })?;
        writer.set_next_sequence(recovered.last_sequence + 1);

        info!(
            next_sequence = writer.next_sequence(),
            file = %writer.current_file_path().display(),
            "Journaled ledger open"
        );
        let ledger = Self {
            inner: RwLock::new(Inner {
                state: recovered.state.clone(),
                writer,
            }),
        };
        Ok((ledger, recovered))
    }

    /// Copy of the current state
    pub async fn state(&self) -> LedgerState {
        self.inner.read().await.state.clone()
    }

    /// Flush and fsync the journal
    pub async fn sync(&self) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .writer
            .sync()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn commit(&self, record: LedgerRecord) -> Result<(), StoreError> {
        self.inner.write().await.commit(record)
    }
}

#[async_trait]
impl LedgerStore for JournaledLedger {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.commit(LedgerRecord::OrderPlaced(order.clone())).await
    }

    async fn order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.read().await.state.order(order_id).cloned())
    }

    async fn pending_orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.inner.read().await.state.pending_orders())
    }

    async fn transition(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: i64,
    ) -> Result<Order, StoreError> {
        let mut inner = self.inner.write().await;
        inner.commit(LedgerRecord::OrderTransitioned {
            order_id: order_id.clone(),
            from,
            to,
            at,
        })?;
        inner
            .state
            .order(order_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                key: order_id.to_string(),
            })
    }

    async fn commit_settlement(&self, record: &SettlementRecord) -> Result<(), StoreError> {
        self.commit(LedgerRecord::SettlementCommitted(record.clone())).await
    }

    async fn wallet(&self, user: UserId) -> Result<Option<Wallet>, StoreError> {
        Ok(self.inner.read().await.state.wallet(user).cloned())
    }

    async fn open_wallet(&self, wallet: &Wallet) -> Result<(), StoreError> {
        self.commit(LedgerRecord::WalletOpened(wallet.clone())).await
    }

    async fn wallets(&self) -> Result<Vec<Wallet>, StoreError> {
        Ok(self.inner.read().await.state.wallets())
    }

    async fn inventory(&self, user: UserId) -> Result<Vec<InventoryEntry>, StoreError> {
        Ok(self.inner.read().await.state.inventory(user))
    }

    async fn product(&self, name: &ProductName) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.read().await.state.product(name).cloned())
    }

    async fn list_product(&self, product: &Product) -> Result<(), StoreError> {
        self.commit(LedgerRecord::ProductListed(product.clone())).await
    }

    async fn products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.inner.read().await.state.products())
    }

    async fn last_order_sequence(&self) -> Result<u64, StoreError> {
        Ok(self.inner.read().await.state.last_sequence())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::fs;
    use tempfile::TempDir;
    use types::fee::FeeSchedule;
    use types::numeric::{Price, Quantity};
    use types::order::{PriceMode, Side};

    fn order(owner: i64, side: Side, limit: u64, seq: u64) -> Order {
        Order::new(
            UserId::new(owner),
            side,
            PriceMode::Limit,
            ProductName::new("Widget"),
            "USD",
            Quantity::try_new(5).unwrap(),
            Price::from_u64(limit),
            seq,
            0,
        )
    }

    async fn seeded(dir: &std::path::Path) -> JournaledLedger {
        let (ledger, _) = JournaledLedger::open(JournalConfig::new(dir)).unwrap();
        for user in [1, 2] {
            ledger
                .open_wallet(&Wallet::new(UserId::new(user), "USD", Decimal::from(100)))
                .await
                .unwrap();
        }
        ledger
            .list_product(&Product::new(ProductName::new("Widget"), 100, "USD", Price::from_u64(10), 0))
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_settlement_survives_restart() {
        let tmp = TempDir::new().unwrap();
        let buy = order(1, Side::Buy, 10, 1);
        let sell = order(2, Side::Sell, 8, 2);
        let waiting = order(1, Side::Buy, 3, 3);
        {
            let ledger = seeded(tmp.path()).await;
            for o in [&buy, &sell, &waiting] {
                ledger.insert_order(o).await.unwrap();
            }
            let record = SettlementRecord::price(&buy, &sell, Price::from_u64(8), &FeeSchedule::zero(), 7);
            ledger.commit_settlement(&record).await.unwrap();
        }

        let (reopened, recovered) = JournaledLedger::open(JournalConfig::new(tmp.path())).unwrap();

        assert_eq!(recovered.replayed, 7);
        assert_eq!(reopened.wallet(UserId::new(1)).await.unwrap().unwrap().balance, Decimal::from(60));
        assert_eq!(reopened.wallet(UserId::new(2)).await.unwrap().unwrap().balance, Decimal::from(140));
        assert_eq!(
            reopened.order(&sell.order_id).await.unwrap().unwrap().status,
            OrderStatus::Finished
        );
        let pending = reopened.pending_orders().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].order_id, waiting.order_id);
        assert_eq!(reopened.last_order_sequence().await.unwrap(), 3);
        assert_eq!(reopened.inventory(UserId::new(1)).await.unwrap()[0].quantity_held, 5);
    }

    #[tokio::test]
    async fn test_rejected_write_is_not_journaled() {
        let tmp = TempDir::new().unwrap();
        let ledger = seeded(tmp.path()).await;
        let placed = order(1, Side::Buy, 10, 1);
        ledger.insert_order(&placed).await.unwrap();
        let size = journal_size(tmp.path());

        let err = ledger.insert_order(&placed).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        let err = ledger
            .transition(&placed.order_id, OrderStatus::Finished, OrderStatus::Cancelled, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        assert_eq!(journal_size(tmp.path()), size);
    }

    #[tokio::test]
    async fn test_transition_returns_updated_order() {
        let tmp = TempDir::new().unwrap();
        let ledger = seeded(tmp.path()).await;
        let placed = order(1, Side::Buy, 10, 1);
        ledger.insert_order(&placed).await.unwrap();

        let cancelled = ledger
            .transition(&placed.order_id, OrderStatus::Wait, OrderStatus::Cancelled, 42)
            .await
            .unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.updated_at, 42);
        ledger.sync().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_append_refuses_later_writes() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("ledger");
        let config = JournalConfig {
            max_file_size: 1,
            ..JournalConfig::new(&dir)
        };
        let (ledger, _) = JournaledLedger::open(config).unwrap();
        ledger
            .open_wallet(&Wallet::new(UserId::new(1), "USD", Decimal::from(100)))
            .await
            .unwrap();

        fs::remove_dir_all(&dir).unwrap();
        let err = ledger
            .open_wallet(&Wallet::new(UserId::new(2), "USD", Decimal::from(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        fs::create_dir_all(&dir).unwrap();
        let err = ledger
            .open_wallet(&Wallet::new(UserId::new(3), "USD", Decimal::from(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        let wallets = ledger.wallets().await.unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].user_id, UserId::new(1));
    }

    fn journal_size(dir: &std::path::Path) -> u64 {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.metadata().unwrap().len())
            .sum()
    }
}
