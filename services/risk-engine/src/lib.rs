//! Risk Engine Service
//!
//! Pre-trade checks run by Order Intake before an order is persisted:
//! - request validation (quantity, limit price, listed product, currency)
//! - FX rate table for converting the wallet currency into the order currency
//! - hold (pre-authorization) estimate checked against the provisional balance
//! - cancel request validation (ownership, already settled)
//!
//! Everything here is pure: callers fetch the product, market price and
//! balances and pass them in.

pub mod engine;
pub mod errors;
pub mod hold;
pub mod rates;
pub mod validator;

pub use engine::{PreTrade, RiskEngine};
pub use errors::CheckError;
pub use rates::RateTable;
pub use validator::{ListingRequest, OrderRequest, ValidatedOrder};
