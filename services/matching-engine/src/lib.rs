//! Matching Engine Service
//!
//! Pairs pending buy and sell orders for listed products and settles each
//! pair atomically against the ledger.
//!
//! **Flow:**
//! - Order events arrive from the broker and are enqueued in the book
//! - A periodic sweep crosses buyers against sellers, first fit
//! - Each match is settled as one ledger transaction, then the product's
//!   last traded price is published to the price cache
//! - Cancellation reverses a pending order's hold
//!
//! **Key Invariants:**
//! - Only `Wait` orders are ever in the book, each at most once
//! - No self-trades
//! - A seller is matched at most once per sweep
//! - A settlement either applies every balance, inventory and status change
//!   or none of them

pub mod book;
pub mod broker;
pub mod cancellation;
pub mod config;
pub mod consumer;
pub mod dedup;
pub mod engine;
pub mod errors;
pub mod events;
pub mod handle;
pub mod io;
pub mod matching;
pub mod prices;
pub mod repairs;
pub mod runtime;
pub mod settlement;
pub mod store;

pub use config::EngineConfig;
pub use engine::MatchingEngine;
pub use errors::{EngineError, SettlementError, StoreError};
pub use handle::EngineHandle;
pub use runtime::EngineRuntime;
