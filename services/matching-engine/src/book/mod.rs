//! Order book infrastructure module
//!
//! Contains the per-side pending sequences and the two-sided book.

pub mod pending;
pub mod order_book;

pub use pending::PendingOrders;
pub use order_book::{BookSnapshot, EnqueueRejection, OrderBook};
