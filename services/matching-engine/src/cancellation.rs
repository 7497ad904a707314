//! Cancellation of a pending order
//!
//! The ledger record decides: a `Finished` order cannot be cancelled, an
//! order that is already `Cancelled` (or `Error`) is left alone and nothing
//! is refunded again. Otherwise the status moves `Wait → Cancelled` with a
//! compare-and-set, the order leaves the book, and the hold taken at intake
//! is credited back to the provisional balance.

use std::sync::Arc;
use std::time::Duration;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use types::now_nanos;
use types::order::OrderStatus;
use types::wire::CancelRequest;

use crate::book::OrderBook;
use crate::errors::{EngineError, StoreError};
use crate::events::{CancelOutcome, OrderCancelled};
use crate::io::bounded;
use crate::repairs::PendingRepairs;
use crate::store::{BalanceCache, LedgerStore};

pub struct Cancellation {
    ledger: Arc<dyn LedgerStore>,
    balances: Arc<dyn BalanceCache>,
    io_timeout: Duration,
}

impl Cancellation {
    pub fn new(ledger: Arc<dyn LedgerStore>, balances: Arc<dyn BalanceCache>, io_timeout: Duration) -> Self {
        Self {
            ledger,
            balances,
            io_timeout,
        }
    }

    /// Cancel `req.order_id` on behalf of `req.user_id`
    ///
    /// A failed refund is queued on `repairs` rather than failing the
    /// cancellation, since the ledger has already committed.
    pub async fn cancel(
        &self,
        book: &mut OrderBook,
        repairs: &mut PendingRepairs,
        req: &CancelRequest,
    ) -> Result<CancelOutcome, EngineError> {
        let order = bounded(self.io_timeout, "ledger.order", self.ledger.order(&req.order_id))
            .await?
            .ok_or_else(|| EngineError::NotFound {
                order_id: req.order_id.clone(),
            })?;

        if order.owner_id != req.user_id {
            return Err(EngineError::NotOwner {
                order_id: req.order_id.clone(),
                user: req.user_id,
            });
        }
        match order.status {
            OrderStatus::Wait => {}
            OrderStatus::Finished => {
                return Err(EngineError::AlreadySettled {
                    order_id: req.order_id.clone(),
                })
            }
            status => return Ok(CancelOutcome::AlreadyClosed { status }),
        }

        let transitioned = bounded(
            self.io_timeout,
            "ledger.transition",
            self.ledger
                .transition(&order.order_id, OrderStatus::Wait, OrderStatus::Cancelled, now_nanos()),
        )
        .await;
        match transitioned {
            Ok(_) => {}
            Err(EngineError::Store(StoreError::InvalidTransition { from, .. })) => {
                return if from == OrderStatus::Finished {
                    Err(EngineError::AlreadySettled {
                        order_id: req.order_id.clone(),
                    })
                } else {
                    Ok(CancelOutcome::AlreadyClosed { status: from })
                };
            }
            Err(e) => return Err(e),
        }

        let removed_from_book = book.remove_by_id(order.side, &order.order_id).is_some();
        if !removed_from_book {
            warn!(order_id = %order.order_id, "Cancelled order was not in the book");
        }

        let mut refund_pending = false;
        if order.hold_amount > Decimal::ZERO {
            match bounded(
                self.io_timeout,
                "balances.credit",
                self.balances.credit(order.owner_id, order.hold_amount),
            )
            .await
            {
                Ok(balance) => {
                    info!(user = %order.owner_id, amount = %order.hold_amount, balance = %balance, "Hold reversed");
                }
                Err(e) => {
                    error!(
                        order_id = %order.order_id,
                        user = %order.owner_id,
                        amount = %order.hold_amount,
                        error = %e,
                        "Refund failed, queued for replay"
                    );
                    repairs.queue_refund(order.order_id.clone(), order.owner_id, order.hold_amount);
                    refund_pending = true;
                }
            }
        }

        info!(order_id = %order.order_id, user = %order.owner_id, "Order cancelled");
        Ok(CancelOutcome::Cancelled(OrderCancelled {
            order_id: order.order_id,
            owner: order.owner_id,
            refunded: order.hold_amount,
            refund_pending,
            removed_from_book,
        }))
    }
}
