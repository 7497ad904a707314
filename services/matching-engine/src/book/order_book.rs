//! The pair of pending sequences driving matching
//!
//! The book is a projection of the ledger's `Wait` orders. It is owned by
//! the matching engine and mutated only from the engine task.

use std::collections::HashSet;
use serde::Serialize;
use types::ids::OrderId;
use types::order::{Order, Side};

use super::pending::PendingOrders;

/// In-memory order book: pending buys and pending sells
#[derive(Debug, Clone)]
pub struct OrderBook {
    buys: PendingOrders,
    sells: PendingOrders,
}

/// Why an order could not be enqueued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueRejection {
    /// Already present in the book
    Duplicate,
    /// Book only holds `Wait` orders
    NotWaiting,
}

impl OrderBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self {
            buys: PendingOrders::new(Side::Buy),
            sells: PendingOrders::new(Side::Sell),
        }
    }

    fn side(&self, side: Side) -> &PendingOrders {
        match side {
            Side::Buy => &self.buys,
            Side::Sell => &self.sells,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut PendingOrders {
        match side {
            Side::Buy => &mut self.buys,
            Side::Sell => &mut self.sells,
        }
    }

    /// Append an order to its side's sequence
    pub fn enqueue(&mut self, order: Order) -> Result<(), EnqueueRejection> {
        if !order.is_waiting() {
            return Err(EnqueueRejection::NotWaiting);
        }
        if self.contains(&order.order_id) {
            return Err(EnqueueRejection::Duplicate);
        }
        self.side_mut(order.side).push(order);
        Ok(())
    }

    /// Remove the order at `index` of `side`
    pub fn remove(&mut self, side: Side, index: usize) -> Option<Order> {
        self.side_mut(side).remove(index)
    }

    /// Locate an order on `side` and remove it
    pub fn remove_by_id(&mut self, side: Side, order_id: &OrderId) -> Option<Order> {
        let index = self.side(side).position(order_id)?;
        self.remove(side, index)
    }

    /// Remove every listed order from both sides
    pub fn remove_all(&mut self, ids: &HashSet<OrderId>) -> usize {
        if ids.is_empty() {
            return 0;
        }
        self.buys.remove_all(ids) + self.sells.remove_all(ids)
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.buys.contains(order_id) || self.sells.contains(order_id)
    }

    pub fn buys(&self) -> &PendingOrders {
        &self.buys
    }

    pub fn sells(&self) -> &PendingOrders {
        &self.sells
    }

    pub fn len(&self) -> usize {
        self.buys.len() + self.sells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buys.is_empty() && self.sells.is_empty()
    }

    /// True when neither side can be crossed
    pub fn is_one_sided(&self) -> bool {
        self.buys.is_empty() || self.sells.is_empty()
    }

    /// Verify structural invariants
    ///
    /// Every order sits on the sequence of its own side, appears once, and
    /// is `Wait`.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for pending in [&self.buys, &self.sells] {
            for order in pending.iter() {
                if order.side != pending.side() {
                    return Err(format!("{} is on the {} side", order.order_id, pending.side()));
                }
                if !order.is_waiting() {
                    return Err(format!("{} is {} but still in the book", order.order_id, order.status));
                }
                if !seen.insert(order.order_id.clone()) {
                    return Err(format!("{} appears more than once", order.order_id));
                }
            }
        }
        Ok(())
    }

    /// Owned copy of the book contents for readers
    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            buys: self.buys.as_slice().to_vec(),
            sells: self.sells.as_slice().to_vec(),
        }
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the book
#[derive(Debug, Clone, Default, Serialize)]
pub struct BookSnapshot {
    pub buys: Vec<Order>,
    pub sells: Vec<Order>,
}

impl BookSnapshot {
    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.buys.iter().chain(self.sells.iter()).any(|o| &o.order_id == order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use types::ids::{ProductName, UserId};
    use types::numeric::{Price, Quantity};
    use types::order::{OrderStatus, PriceMode};

    fn order(owner: i64, side: Side, seq: u64) -> Order {
        Order::new(
            UserId::new(owner),
            side,
            PriceMode::Limit,
            ProductName::new("Widget"),
            "USD",
            Quantity::try_new(1).unwrap(),
            Price::from_u64(10),
            seq,
            0,
        )
    }

    #[test]
    fn test_enqueue_goes_to_own_side() {
        let mut book = OrderBook::new();
        book.enqueue(order(1, Side::Buy, 1)).unwrap();
        book.enqueue(order(2, Side::Sell, 2)).unwrap();

        assert_eq!(book.buys().len(), 1);
        assert_eq!(book.sells().len(), 1);
        assert!(book.check_invariants().is_ok());
    }

    #[test]
    fn test_enqueue_rejects_duplicate() {
        let mut book = OrderBook::new();
        let o = order(1, Side::Buy, 1);
        book.enqueue(o.clone()).unwrap();

        assert_eq!(book.enqueue(o), Err(EnqueueRejection::Duplicate));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_enqueue_rejects_terminal_order() {
        let mut book = OrderBook::new();
        let mut o = order(1, Side::Sell, 1);
        o.transition(OrderStatus::Cancelled, 1).unwrap();

        assert_eq!(book.enqueue(o), Err(EnqueueRejection::NotWaiting));
        assert!(book.is_empty());
    }

    #[test]
    fn test_remove_by_id() {
        let mut book = OrderBook::new();
        let o = order(1, Side::Buy, 1);
        book.enqueue(o.clone()).unwrap();

        assert!(book.remove_by_id(Side::Sell, &o.order_id).is_none());
        assert_eq!(book.remove_by_id(Side::Buy, &o.order_id).unwrap(), o);
        assert!(!book.contains(&o.order_id));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enqueue { owner: i64, buy: bool, seq: u64 },
        Remove { buy: bool, index: usize },
        RemoveAll { seqs: Vec<u64> },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..4, any::<bool>(), 0u64..20).prop_map(|(owner, buy, seq)| Op::Enqueue { owner, buy, seq }),
            (any::<bool>(), 0usize..10).prop_map(|(buy, index)| Op::Remove { buy, index }),
            proptest::collection::vec(0u64..20, 0..5).prop_map(|seqs| Op::RemoveAll { seqs }),
        ]
    }

    proptest! {
        #[test]
        fn prop_book_invariants_hold(ops in proptest::collection::vec(op_strategy(), 0..60)) {
            let mut book = OrderBook::new();
            let mut all: Vec<Order> = Vec::new();

            for op in ops {
                match op {
                    Op::Enqueue { owner, buy, seq } => {
                        let side = if buy { Side::Buy } else { Side::Sell };
                        let o = order(owner, side, seq);
                        all.push(o.clone());
                        let _ = book.enqueue(o);
                    }
                    Op::Remove { buy, index } => {
                        let side = if buy { Side::Buy } else { Side::Sell };
                        book.remove(side, index);
                    }
                    Op::RemoveAll { seqs } => {
                        let ids: HashSet<OrderId> = all
                            .iter()
                            .filter(|o| seqs.contains(&o.sequence))
                            .map(|o| o.order_id.clone())
                            .collect();
                        book.remove_all(&ids);
                    }
                }
                prop_assert!(book.check_invariants().is_ok());
                for o in book.buys().iter() {
                    prop_assert!(!book.sells().contains(&o.order_id));
                }
            }
        }
    }
}
