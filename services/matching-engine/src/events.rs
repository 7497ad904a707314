//! Event structures for matching engine
//!
//! Results reported by the engine for sweeps, submissions and cancellations

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::{OrderId, ProductName, TradeId, UserId};
use types::numeric::{Price, Quantity};
use types::order::OrderStatus;
use types::trade::SettlementRecord;

/// Trade settled during a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSettled {
    pub trade_id: TradeId,
    pub product: ProductName,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer: UserId,
    pub seller: UserId,
    pub price: Price,
    pub quantity: Quantity,
    pub notional: Decimal,
    pub seller_credit: Decimal,
    pub executed_at: i64,
    /// False when the market price publish failed and was queued for replay
    pub price_published: bool,
}

impl From<&SettlementRecord> for TradeSettled {
    fn from(record: &SettlementRecord) -> Self {
        Self {
            trade_id: record.trade_id,
            product: record.product.clone(),
            buy_order_id: record.buy_order_id.clone(),
            sell_order_id: record.sell_order_id.clone(),
            buyer: record.buyer,
            seller: record.seller,
            price: record.unit_price,
            quantity: record.quantity,
            notional: record.notional,
            seller_credit: record.seller_credit,
            executed_at: record.executed_at,
            price_published: true,
        }
    }
}

/// A crossed pair whose settlement failed; both orders stay in the book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFailure {
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub reason: String,
}

/// Summary of one sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub trades: Vec<TradeSettled>,
    pub failures: Vec<MatchFailure>,
    /// Orders found no longer pending in the ledger and dropped
    pub stale: Vec<OrderId>,
    pub skipped_buyers: usize,
    /// Queued cache writes that succeeded at the start of this sweep
    pub repairs_replayed: usize,
    pub buys_remaining: usize,
    pub sells_remaining: usize,
}

/// Result of handling a submit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    Enqueued,
    /// Redelivery of an event already handled
    Duplicate,
    /// The order was seen reaching a terminal state earlier
    Tombstoned,
    /// The ledger record is no longer `Wait`
    AlreadyClosed { status: OrderStatus },
}

/// Result of handling a cancel event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled(OrderCancelled),
    /// Redelivery of a cancel already handled
    Duplicate,
    /// The order was already cancelled or failed; nothing refunded
    AlreadyClosed { status: OrderStatus },
}

/// Order cancelled and its hold reversed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub owner: UserId,
    pub refunded: Decimal,
    /// Refund could not be applied yet and is queued for replay
    pub refund_pending: bool,
    /// False if the order was not in the book (matched or never enqueued)
    pub removed_from_book: bool,
}

/// Result of dispatching one broker event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dispatched {
    Submit(SubmitOutcome),
    Cancel(CancelOutcome),
}
