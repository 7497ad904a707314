//! Queued best-effort cache writes
//!
//! Market price publishes and cancellation refunds that failed after the
//! ledger committed are kept here and replayed at the start of each sweep.
//! Prices are last-write-wins per product; refunds are keyed by order so a
//! refund is never queued twice.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use types::ids::{OrderId, ProductName, UserId};
use types::numeric::Price;

use crate::io::bounded;
use crate::prices::MarketPrices;
use crate::store::BalanceCache;

/// Refund owed to a user's provisional balance
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRefund {
    pub user: UserId,
    pub amount: Decimal,
}

#[derive(Debug, Default)]
pub struct PendingRepairs {
    prices: HashMap<ProductName, Price>,
    refunds: BTreeMap<OrderId, PendingRefund>,
}

impl PendingRepairs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_price(&mut self, product: ProductName, price: Price) {
        self.prices.insert(product, price);
    }

    /// Drop a queued price superseded by a newer successful publish
    pub fn forget_price(&mut self, product: &ProductName) {
        self.prices.remove(product);
    }

    pub fn queue_refund(&mut self, order_id: OrderId, user: UserId, amount: Decimal) {
        self.refunds.entry(order_id).or_insert(PendingRefund { user, amount });
    }

    pub fn len(&self) -> usize {
        self.prices.len() + self.refunds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty() && self.refunds.is_empty()
    }

    pub fn refund_for(&self, order_id: &OrderId) -> Option<&PendingRefund> {
        self.refunds.get(order_id)
    }

    /// Retry everything queued; entries that fail again stay queued
    ///
    /// Returns the number of writes that succeeded.
    pub async fn replay(&mut self, prices: &MarketPrices, balances: &Arc<dyn BalanceCache>, io_timeout: Duration) -> usize {
        let mut replayed = 0;

        for (product, price) in std::mem::take(&mut self.prices) {
            match prices.publish(&product, price).await {
                Ok(()) => {
                    info!(product = %product, price = %price, "Replayed market price publish");
                    replayed += 1;
                }
                Err(e) => {
                    error!(product = %product, error = %e, "Market price publish still failing");
                    self.prices.insert(product, price);
                }
            }
        }

        for (order_id, refund) in std::mem::take(&mut self.refunds) {
            match bounded(io_timeout, "balances.credit", balances.credit(refund.user, refund.amount)).await {
                Ok(balance) => {
                    info!(order_id = %order_id, user = %refund.user, amount = %refund.amount, balance = %balance, "Replayed refund");
                    replayed += 1;
                }
                Err(e) => {
                    error!(order_id = %order_id, user = %refund.user, amount = %refund.amount, error = %e, "Refund still failing");
                    self.refunds.insert(order_id, refund);
                }
            }
        }

        replayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LedgerStore, MemoryBalanceCache, MemoryLedger, MemoryPriceCache};
    use types::market::Product;

    #[test]
    fn test_refund_queued_once_per_order() {
        let mut repairs = PendingRepairs::new();
        let id = OrderId::from_string("1-B-1");
        repairs.queue_refund(id.clone(), UserId::new(1), Decimal::from(50));
        repairs.queue_refund(id.clone(), UserId::new(1), Decimal::from(50));
        assert_eq!(repairs.len(), 1);
    }

    #[test]
    fn test_latest_price_wins() {
        let mut repairs = PendingRepairs::new();
        repairs.queue_price(ProductName::new("Widget"), Price::from_u64(8));
        repairs.queue_price(ProductName::new("Widget"), Price::from_u64(9));
        assert_eq!(repairs.prices[&ProductName::new("Widget")], Price::from_u64(9));
    }

    #[test]
    fn test_forgotten_price_is_not_replayed() {
        let mut repairs = PendingRepairs::new();
        repairs.queue_price(ProductName::new("Widget"), Price::from_u64(8));
        repairs.forget_price(&ProductName::new("Widget"));
        assert!(repairs.is_empty());
    }

    #[tokio::test]
    async fn test_replay_applies_and_drains() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger
            .list_product(&Product::new(ProductName::new("Widget"), 1, "USD", Price::from_u64(10), 0))
            .await
            .unwrap();
        let prices = MarketPrices::new(Arc::new(MemoryPriceCache::new()), ledger, Duration::from_secs(1));
        let balances: Arc<dyn BalanceCache> = Arc::new(MemoryBalanceCache::new());
        balances.seed(UserId::new(1), Decimal::from(10)).await.unwrap();

        let mut repairs = PendingRepairs::new();
        repairs.queue_price(ProductName::new("Widget"), Price::from_u64(7));
        repairs.queue_refund(OrderId::from_string("1-B-1"), UserId::new(1), Decimal::from(50));

        let replayed = repairs.replay(&prices, &balances, Duration::from_secs(1)).await;

        assert_eq!(replayed, 2);
        assert!(repairs.is_empty());
        assert_eq!(balances.available(UserId::new(1)).await.unwrap(), Some(Decimal::from(60)));
        let widget = prices.current(&ProductName::new("Widget")).await.unwrap().unwrap();
        assert_eq!(widget.last_price, Price::from_u64(7));
    }
}
