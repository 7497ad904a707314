//! Matching engine core
//!
//! Owns the order book and coordinates submission, cancellation and the
//! crossing sweep. All methods take `&mut self`: the engine is meant to be
//! driven by exactly one task (see [`crate::handle::EngineHandle`]), which
//! is what serializes every book mutation.

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use types::order::Order;
use types::wire::{CancelRequest, OrderEvent};

use crate::book::{BookSnapshot, EnqueueRejection, OrderBook};
use crate::cancellation::Cancellation;
use crate::config::EngineConfig;
use crate::dedup::{DeliveryGuard, DeliveryKey};
use crate::errors::EngineError;
use crate::events::{CancelOutcome, Dispatched, SubmitOutcome, SweepReport};
use crate::io::bounded;
use crate::matching::sweep::{buy_side_products, cross};
use crate::prices::MarketPrices;
use crate::repairs::PendingRepairs;
use crate::settlement::Settlement;
use crate::store::{BalanceCache, LedgerStore, MarketPriceCache};

/// Main matching engine
pub struct MatchingEngine {
    book: OrderBook,
    ledger: Arc<dyn LedgerStore>,
    balances: Arc<dyn BalanceCache>,
    prices: MarketPrices,
    settlement: Settlement,
    cancellation: Cancellation,
    guard: DeliveryGuard,
    repairs: PendingRepairs,
    config: EngineConfig,
}

impl MatchingEngine {
    /// Create an engine with an empty book
    pub fn new(
        config: EngineConfig,
        ledger: Arc<dyn LedgerStore>,
        balances: Arc<dyn BalanceCache>,
        price_cache: Arc<dyn MarketPriceCache>,
    ) -> Self {
        let prices = MarketPrices::new(price_cache, ledger.clone(), config.io_timeout);
        let settlement = Settlement::new(ledger.clone(), prices.clone(), config.fees, config.io_timeout);
        let cancellation = Cancellation::new(ledger.clone(), balances.clone(), config.io_timeout);

        Self {
            book: OrderBook::new(),
            ledger,
            balances,
            prices,
            settlement,
            cancellation,
            guard: DeliveryGuard::new(config.dedup_window),
            repairs: PendingRepairs::new(),
            config,
        }
    }

    /// Rebuild the book from the ledger's `Wait` orders
    ///
    /// Returns the number of orders restored.
    pub async fn restore(&mut self) -> Result<usize, EngineError> {
        let pending = bounded(self.config.io_timeout, "ledger.pending_orders", self.ledger.pending_orders()).await?;
        let mut restored = 0;
        for order in pending {
            if self.book.enqueue(order).is_ok() {
                restored += 1;
            }
        }
        info!(restored, buys = self.book.buys().len(), sells = self.book.sells().len(), "Order book restored");
        Ok(restored)
    }

    /// Handle one decoded broker event
    ///
    /// The event's key is remembered only if handling succeeds, so a failed
    /// delivery is handled again when the broker redelivers it.
    pub async fn dispatch(&mut self, event: OrderEvent) -> Result<Dispatched, EngineError> {
        let key = DeliveryKey::of(&event);
        if self.guard.is_duplicate(&key) {
            debug!(order_id = %key.order_id, cmd = %key.cmd, "Duplicate delivery ignored");
            return Ok(match event {
                OrderEvent::Submit(_) => Dispatched::Submit(SubmitOutcome::Duplicate),
                OrderEvent::Cancel(_) => Dispatched::Cancel(CancelOutcome::Duplicate),
            });
        }

        let dispatched = match event {
            OrderEvent::Submit(order) => Dispatched::Submit(self.submit(order).await?),
            OrderEvent::Cancel(req) => Dispatched::Cancel(self.cancel(req).await?),
        };
        self.guard.remember(key);

        if self.config.eager_sweep && dispatched == Dispatched::Submit(SubmitOutcome::Enqueued) {
            if let Err(e) = self.sweep().await {
                warn!(error = %e, "Eager sweep failed");
            }
        }
        Ok(dispatched)
    }

    /// Enqueue a submitted order
    ///
    /// The book receives the ledger's copy of the order, which must still be
    /// `Wait` and must agree with the event on side, owner and product.
    pub async fn submit(&mut self, order: Order) -> Result<SubmitOutcome, EngineError> {
        if self.guard.is_tombstoned(&order.order_id) {
            return Ok(SubmitOutcome::Tombstoned);
        }
        if self.book.contains(&order.order_id) {
            return Ok(SubmitOutcome::Duplicate);
        }

        let record = bounded(self.config.io_timeout, "ledger.order", self.ledger.order(&order.order_id))
            .await?
            .ok_or_else(|| EngineError::NotFound {
                order_id: order.order_id.clone(),
            })?;
        if record.side != order.side
            || record.owner_id != order.owner_id
            || record.product_name != order.product_name
        {
            return Err(EngineError::Mismatch {
                order_id: order.order_id,
            });
        }
        if !record.is_waiting() {
            debug!(order_id = %record.order_id, status = %record.status, "Submit for closed order ignored");
            self.guard.tombstone(record.order_id);
            return Ok(SubmitOutcome::AlreadyClosed { status: record.status });
        }

        let order_id = record.order_id.clone();
        match self.book.enqueue(record) {
            Ok(()) => {
                debug!(order_id = %order_id, side = %order.side, product = %order.product_name, "Order enqueued");
                Ok(SubmitOutcome::Enqueued)
            }
            Err(EnqueueRejection::Duplicate) => Ok(SubmitOutcome::Duplicate),
            Err(EnqueueRejection::NotWaiting) => Ok(SubmitOutcome::AlreadyClosed {
                status: order.status,
            }),
        }
    }

    /// Cancel a pending order and reverse its hold
    pub async fn cancel(&mut self, req: CancelRequest) -> Result<CancelOutcome, EngineError> {
        let result = self
            .cancellation
            .cancel(&mut self.book, &mut self.repairs, &req)
            .await;
        match &result {
            Ok(CancelOutcome::Cancelled(_)) | Ok(CancelOutcome::AlreadyClosed { .. }) => {
                self.guard.tombstone(req.order_id.clone());
            }
            Err(EngineError::AlreadySettled { order_id }) => {
                self.guard.tombstone(order_id.clone());
            }
            _ => {}
        }
        result
    }

    /// Run one crossing sweep
    ///
    /// Queued cache writes are replayed first. Fails only if the market
    /// prices cannot be read, in which case the book is untouched.
    pub async fn sweep(&mut self) -> Result<SweepReport, EngineError> {
        let repairs_replayed = if self.repairs.is_empty() {
            0
        } else {
            self.repairs
                .replay(&self.prices, &self.balances, self.config.io_timeout)
                .await
        };

        let prices = if self.book.is_one_sided() {
            Default::default()
        } else {
            let products = buy_side_products(&self.book);
            self.prices.current_many(&products).await.map_err(|e| {
                error!(error = %e, "Market prices unavailable, sweep skipped");
                e
            })?
        };

        let mut report = cross(&mut self.book, &prices, &self.settlement).await;
        report.repairs_replayed = repairs_replayed;

        for trade in &report.trades {
            self.guard.tombstone(trade.buy_order_id.clone());
            self.guard.tombstone(trade.sell_order_id.clone());
            // Trades are in execution order, so the last one per product wins.
            if trade.price_published {
                self.repairs.forget_price(&trade.product);
            } else {
                self.repairs.queue_price(trade.product.clone(), trade.price);
            }
        }
        for order_id in &report.stale {
            self.guard.tombstone(order_id.clone());
        }

        if !report.trades.is_empty() || !report.failures.is_empty() {
            info!(
                trades = report.trades.len(),
                failures = report.failures.len(),
                skipped_buyers = report.skipped_buyers,
                buys_remaining = report.buys_remaining,
                sells_remaining = report.sells_remaining,
                "Sweep completed"
            );
        } else {
            debug!(buys = report.buys_remaining, sells = report.sells_remaining, "Sweep found no matches");
        }
        Ok(report)
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn snapshot(&self) -> BookSnapshot {
        self.book.snapshot()
    }

    pub fn prices(&self) -> &MarketPrices {
        &self.prices
    }

    /// Number of cache writes waiting for replay
    pub fn pending_repairs(&self) -> usize {
        self.repairs.len()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
