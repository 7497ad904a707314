//! Error types shared across the marketplace crates
//!
//! Error taxonomy using thiserror

use thiserror::Error;

/// Order-specific errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    #[error("Order not found: {order_id}")]
    NotFound { order_id: String },

    #[error("Order already in terminal state: {status}")]
    AlreadyTerminal { status: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Self-trade prevention triggered")]
    SelfTrade,
}

/// Errors decoding or converting broker wire forms
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WireError {
    #[error("Malformed event: {0}")]
    Malformed(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(i32),

    #[error("Unknown transaction mode: {0}")]
    UnknownMode(i32),

    #[error("Unknown transaction type: {0}")]
    UnknownType(i32),

    #[error("Command {cmd} does not match transaction mode {mode}")]
    SideMismatch { cmd: i32, mode: i32 },

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl From<serde_json::Error> for WireError {
    fn from(err: serde_json::Error) -> Self {
        WireError::Malformed(err.to_string())
    }
}
