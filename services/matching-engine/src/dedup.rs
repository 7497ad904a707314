//! Delivery de-duplication
//!
//! The broker delivers at least once. Each event is keyed by
//! `(cmd, transaction_id)`; a key is remembered only after the event was
//! handled successfully, so a delivery that failed and was requeued is still
//! processed on redelivery. Orders that reached a terminal state are
//! tombstoned so a late submit for them is ignored without a ledger read.

use indexmap::IndexSet;
use std::hash::Hash;
use types::ids::OrderId;
use types::wire::{EventCmd, OrderEvent};

/// Idempotency key of a broker event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryKey {
    pub cmd: EventCmd,
    pub order_id: OrderId,
}

impl DeliveryKey {
    pub fn of(event: &OrderEvent) -> Self {
        Self {
            cmd: event.cmd(),
            order_id: event.order_id().clone(),
        }
    }
}

/// Bounded set evicting in insertion order
#[derive(Debug)]
struct Window<T> {
    capacity: usize,
    members: IndexSet<T>,
}

impl<T: Eq + Hash> Window<T> {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            members: IndexSet::with_capacity(capacity),
        }
    }

    fn contains(&self, item: &T) -> bool {
        self.members.contains(item)
    }

    fn insert(&mut self, item: T) {
        if !self.members.insert(item) {
            return;
        }
        if self.members.len() > self.capacity {
            self.members.shift_remove_index(0);
        }
    }

    fn len(&self) -> usize {
        self.members.len()
    }
}

/// Seen-key window plus terminal-order tombstones
#[derive(Debug)]
pub struct DeliveryGuard {
    seen: Window<DeliveryKey>,
    tombstones: Window<OrderId>,
}

impl DeliveryGuard {
    /// Remember up to `window` keys and `window` tombstones
    pub fn new(window: usize) -> Self {
        Self {
            seen: Window::new(window),
            tombstones: Window::new(window),
        }
    }

    pub fn is_duplicate(&self, key: &DeliveryKey) -> bool {
        self.seen.contains(key)
    }

    /// Record a successfully handled event
    pub fn remember(&mut self, key: DeliveryKey) {
        self.seen.insert(key);
    }

    pub fn tombstone(&mut self, order_id: OrderId) {
        self.tombstones.insert(order_id);
    }

    pub fn is_tombstoned(&self, order_id: &OrderId) -> bool {
        self.tombstones.contains(order_id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(cmd: EventCmd, id: &str) -> DeliveryKey {
        DeliveryKey {
            cmd,
            order_id: OrderId::from_string(id),
        }
    }

    #[test]
    fn test_remembered_key_is_duplicate() {
        let mut guard = DeliveryGuard::new(10);
        let k = key(EventCmd::SubmitBuy, "1-B-1");
        assert!(!guard.is_duplicate(&k));

        guard.remember(k.clone());
        assert!(guard.is_duplicate(&k));
    }

    #[test]
    fn test_cmd_is_part_of_key() {
        let mut guard = DeliveryGuard::new(10);
        guard.remember(key(EventCmd::SubmitBuy, "1-B-1"));
        assert!(!guard.is_duplicate(&key(EventCmd::Cancel, "1-B-1")));
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut guard = DeliveryGuard::new(2);
        guard.remember(key(EventCmd::SubmitBuy, "1-B-1"));
        guard.remember(key(EventCmd::SubmitBuy, "1-B-2"));
        guard.remember(key(EventCmd::SubmitBuy, "1-B-3"));

        assert_eq!(guard.len(), 2);
        assert!(!guard.is_duplicate(&key(EventCmd::SubmitBuy, "1-B-1")));
        assert!(guard.is_duplicate(&key(EventCmd::SubmitBuy, "1-B-3")));
    }

    #[test]
    fn test_reinsert_does_not_grow() {
        let mut guard = DeliveryGuard::new(2);
        guard.remember(key(EventCmd::Cancel, "1-B-1"));
        guard.remember(key(EventCmd::Cancel, "1-B-1"));
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_tombstones() {
        let mut guard = DeliveryGuard::new(4);
        let id = OrderId::from_string("2-S-9");
        assert!(!guard.is_tombstoned(&id));
        guard.tombstone(id.clone());
        assert!(guard.is_tombstoned(&id));
    }
}
