//! Engine error taxonomy
//!
//! The broker consumer acks or requeues a delivery based on
//! [`EngineError::is_retryable`]: transient I/O failures are requeued,
//! everything else is acknowledged and dropped.

use thiserror::Error;
use types::errors::{OrderError, WireError};
use types::ids::{OrderId, UserId};
use types::order::OrderStatus;

/// Ledger store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Insufficient funds for user {user}: required {required}, available {available}")]
    InsufficientFunds {
        user: UserId,
        required: String,
        available: String,
    },

    #[error("Inconsistent settlement: {0}")]
    Inconsistent(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    pub(crate) fn order_not_found(order_id: &OrderId) -> Self {
        StoreError::NotFound {
            entity: "order",
            key: order_id.to_string(),
        }
    }
}

/// Key-value cache errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Cache key missing: {key}")]
    Missing { key: String },

    #[error("Insufficient provisional balance: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Corrupt cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CacheError::Unavailable(_))
    }
}

/// Message broker errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    #[error("No queue bound to routing key {0}")]
    Unroutable(String),

    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    #[error("Queue {0} already has a consumer")]
    AlreadyConsumed(String),

    #[error("Broker connection closed")]
    Closed,
}

impl BrokerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Closed)
    }
}

/// Top-level engine error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Ledger error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: &'static str, after_ms: u64 },

    #[error("Order not found: {order_id}")]
    NotFound { order_id: OrderId },

    #[error("Order {order_id} is not owned by user {user}")]
    NotOwner { order_id: OrderId, user: UserId },

    #[error("Order {order_id} is already settled")]
    AlreadySettled { order_id: OrderId },

    #[error("Event for {order_id} does not match the ledger record")]
    Mismatch { order_id: OrderId },

    #[error("Engine stopped")]
    Stopped,
}

impl EngineError {
    /// Whether the failed operation may succeed if retried later
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Store(e) => e.is_transient(),
            EngineError::Cache(e) => e.is_transient(),
            EngineError::Broker(e) => e.is_transient(),
            EngineError::Timeout { .. } | EngineError::Stopped => true,
            _ => false,
        }
    }
}

/// Why a matched pair could not be settled
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    /// One of the orders is no longer `Wait` in the ledger
    #[error("Order {order_id} is no longer pending")]
    Stale { order_id: OrderId },

    /// The ledger refused the transaction (e.g. buyer cannot cover it)
    #[error("Settlement rejected: {0}")]
    Rejected(StoreError),

    #[error("Settlement failed: {0}")]
    Failed(EngineError),
}

impl From<EngineError> for SettlementError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Store(StoreError::InvalidTransition { order_id, .. }) => {
                SettlementError::Stale { order_id }
            }
            EngineError::Store(e) if !e.is_transient() => SettlementError::Rejected(e),
            other => SettlementError::Failed(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(EngineError::from(StoreError::Unavailable("down".into())).is_retryable());
        assert!(EngineError::from(CacheError::Unavailable("down".into())).is_retryable());
        assert!(EngineError::Timeout { operation: "ledger", after_ms: 5 }.is_retryable());
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        assert!(!EngineError::from(WireError::UnknownCommand(0)).is_retryable());
        assert!(!EngineError::NotFound { order_id: OrderId::from_string("1-B-1") }.is_retryable());
        assert!(!EngineError::from(StoreError::InsufficientFunds {
            user: UserId::new(1),
            required: "40".into(),
            available: "10".into(),
        })
        .is_retryable());
    }

    #[test]
    fn test_settlement_error_classification() {
        let stale: SettlementError = EngineError::from(StoreError::InvalidTransition {
            order_id: OrderId::from_string("1-B-1"),
            from: OrderStatus::Cancelled,
            to: OrderStatus::Finished,
        })
        .into();
        assert!(matches!(stale, SettlementError::Stale { .. }));

        let failed: SettlementError = EngineError::Timeout { operation: "ledger", after_ms: 5 }.into();
        assert!(matches!(failed, SettlementError::Failed(_)));
    }
}
