//! Order lifecycle types
//!
//! An order is created by intake in `Wait`, then consumed exactly once by
//! settlement (`Finished`) or cancellation (`Cancelled`). Intake marks it
//! `Error` if it cannot be published after being persisted.

use crate::errors::OrderError;
use crate::ids::{OrderId, ProductName, UserId};
use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// One-letter code used inside order ids
    pub fn code(&self) -> char {
        match self {
            Side::Buy => 'B',
            Side::Sell => 'S',
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

/// How an order's intended price is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceMode {
    /// Priced at the user-specified limit
    Limit,
    /// Priced at the prevailing cached market price
    Market,
}

/// Order status
///
/// Monotonic: the only legal transitions are `Wait` to one of the three
/// terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Wait,
    Finished,
    Cancelled,
    Error,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Wait)
    }

    /// Check a transition against the lifecycle rules
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(self, OrderStatus::Wait) && next.is_terminal()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Wait => "wait",
            OrderStatus::Finished => "finished",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Complete order record
///
/// The ledger holds the authoritative copy; the order book holds a
/// projection of `Wait` orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    /// Intake sequence the id was derived from
    pub sequence: u64,
    pub side: Side,
    pub price_mode: PriceMode,
    pub owner_id: UserId,
    pub product_name: ProductName,
    pub currency: String,
    pub quantity: Quantity,
    /// Meaningful only for `PriceMode::Limit`
    pub limit_price: Price,
    /// Amount withheld from the provisional balance at intake
    pub hold_amount: Decimal,
    pub status: OrderStatus,
    /// Settled notional, set when the order finishes
    pub settled_amount: Option<Decimal>,
    pub counterparty: Option<UserId>,
    pub submitted_at: i64, // Unix nanos
    pub updated_at: i64,   // Unix nanos
}

impl Order {
    /// Create a new waiting order
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner_id: UserId,
        side: Side,
        price_mode: PriceMode,
        product_name: ProductName,
        currency: impl Into<String>,
        quantity: Quantity,
        limit_price: Price,
        sequence: u64,
        timestamp: i64,
    ) -> Self {
        Self {
            order_id: OrderId::derive(owner_id, side, sequence),
            sequence,
            side,
            price_mode,
            owner_id,
            product_name,
            currency: currency.into(),
            quantity,
            limit_price,
            hold_amount: Decimal::ZERO,
            status: OrderStatus::Wait,
            settled_amount: None,
            counterparty: None,
            submitted_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Attach the pre-authorization hold taken at intake
    pub fn with_hold(mut self, hold_amount: Decimal) -> Self {
        self.hold_amount = hold_amount;
        self
    }

    /// Resolve the price this order is willing to trade at
    pub fn resolve_price(&self, market_price: Price) -> Price {
        match self.price_mode {
            PriceMode::Limit => self.limit_price,
            PriceMode::Market => market_price,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.status == OrderStatus::Wait
    }

    /// Move to a terminal status
    pub fn transition(&mut self, next: OrderStatus, timestamp: i64) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = timestamp;
        Ok(())
    }

    /// Finish the order against `counterparty` for `amount`
    pub fn finish(
        &mut self,
        amount: Decimal,
        counterparty: UserId,
        timestamp: i64,
    ) -> Result<(), OrderError> {
        self.transition(OrderStatus::Finished, timestamp)?;
        self.settled_amount = Some(amount);
        self.counterparty = Some(counterparty);
        Ok(())
    }
}
