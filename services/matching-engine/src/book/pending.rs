//! Pending order sequence for one side of the book
//!
//! Orders are kept in insertion order. There is no price sorting: the
//! crossing sweep scans sequentially and the first eligible counter-order
//! wins.

use std::collections::HashSet;
use types::ids::OrderId;
use types::order::{Order, Side};

/// Insertion-ordered sequence of `Wait` orders for one side
#[derive(Debug, Clone)]
pub struct PendingOrders {
    side: Side,
    orders: Vec<Order>,
}

impl PendingOrders {
    /// Create an empty sequence for `side`
    pub fn new(side: Side) -> Self {
        Self {
            side,
            orders: Vec::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Append an order at the back (insertion order)
    pub fn push(&mut self, order: Order) {
        debug_assert_eq!(order.side, self.side);
        self.orders.push(order);
    }

    /// Remove the order at `index`, keeping the order of the rest
    pub fn remove(&mut self, index: usize) -> Option<Order> {
        (index < self.orders.len()).then(|| self.orders.remove(index))
    }

    /// Position of an order by id
    pub fn position(&self, order_id: &OrderId) -> Option<usize> {
        self.orders.iter().position(|o| &o.order_id == order_id)
    }

    /// Remove every order whose id is in `ids`, in one pass
    ///
    /// Returns the number of orders removed.
    pub fn remove_all(&mut self, ids: &HashSet<OrderId>) -> usize {
        let before = self.orders.len();
        self.orders.retain(|o| !ids.contains(&o.order_id));
        before - self.orders.len()
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.position(order_id).is_some()
    }

    pub fn get(&self, index: usize) -> Option<&Order> {
        self.orders.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub fn as_slice(&self) -> &[Order] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
