use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a request is refused before anything is written
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error("Invalid {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    #[error("No exchange rate from {from} to {to}")]
    UnsupportedPair { from: String, to: String },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order {0} belongs to another user")]
    NotOwner(String),

    #[error("Order {0} is already settled")]
    AlreadySettled(String),

    #[error("Order {order_id} is already {status}")]
    AlreadyClosed { order_id: String, status: String },
}

impl CheckError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}
