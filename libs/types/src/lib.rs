//! Types library for the marketplace trading backend
//!
//! This library provides the core type definitions shared by order intake,
//! the matching engine and the ledger, so that every component agrees on
//! identifiers, money arithmetic and the broker wire format.
//!
//! # Modules
//! - `ids`: Identifiers (UserId, OrderId, ProductName, TradeId)
//! - `numeric`: Fixed-point money and positive quantities
//! - `order`: Order lifecycle types
//! - `market`: Product listings and the cached market price
//! - `account`: Wallets, provisional balances and inventory
//! - `fee`: System fee schedule
//! - `trade`: Settlement records
//! - `wire`: Broker event envelope and wire forms
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod order;
pub mod market;
pub mod account;
pub mod fee;
pub mod trade;
pub mod wire;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Current time as Unix nanoseconds.
pub fn now_nanos() -> i64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default()
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::market::*;
    pub use crate::account::*;
    pub use crate::fee::*;
    pub use crate::trade::*;
    pub use crate::wire::*;
    pub use crate::errors::*;
}
