//! Order Intake
//!
//! Producer side of the engine. A buy order is accepted only after its
//! estimated cost has been withheld from the provisional balance; the hold
//! is given back if the order cannot be persisted or published, so a failed
//! submit never leaves money held.
//!
//! Submit: validate → hold → persist (`Wait`) → publish `{cmd: 1|2}`.
//! Cancel: validate against the ledger record → publish `{cmd: 3}`. The
//! engine does the removal, the status change and the refund.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use matching_engine::broker::EventPublisher;
use matching_engine::errors::{CacheError, StoreError};
use matching_engine::io::bounded;
use matching_engine::prices::MarketPrices;
use matching_engine::store::{BalanceCache, LedgerStore};
use risk_engine::validator::{ListingRequest, validate_listing};
use risk_engine::{CheckError, OrderRequest, RiskEngine};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use types::ids::{OrderId, ProductName, UserId};
use types::market::Product;
use types::now_nanos;
use types::numeric::Price;
use types::order::{Order, OrderStatus, Side};
use types::wire::{CancelRequest, OrderEvent};

use crate::error::IntakeError;
use crate::models::AccountResponse;

pub struct OrderIntake {
    ledger: Arc<dyn LedgerStore>,
    balances: Arc<dyn BalanceCache>,
    prices: MarketPrices,
    publisher: Arc<dyn EventPublisher>,
    risk: RiskEngine,
    routing_key: String,
    sequence: AtomicU64,
    io_timeout: Duration,
}

impl OrderIntake {
    /// Continue the order sequence from the highest one in the ledger
    pub async fn new(
        ledger: Arc<dyn LedgerStore>,
        balances: Arc<dyn BalanceCache>,
        prices: MarketPrices,
        publisher: Arc<dyn EventPublisher>,
        risk: RiskEngine,
        routing_key: impl Into<String>,
        io_timeout: Duration,
    ) -> Result<Self, IntakeError> {
        let last = bounded(io_timeout, "ledger.last_order_sequence", ledger.last_order_sequence()).await?;
        Ok(Self {
            ledger,
            balances,
            prices,
            publisher,
            risk,
            routing_key: routing_key.into(),
            sequence: AtomicU64::new(last),
            io_timeout,
        })
    }

    /// Re-derive provisional balances from durable state
    ///
    /// Each wallet's provisional balance is its durable balance less the
    /// holds of its pending buy orders. Users that already have a cache
    /// entry keep it. Returns the number of wallets seeded.
    pub async fn restore_balances(&self) -> Result<usize, IntakeError> {
        let wallets = bounded(self.io_timeout, "ledger.wallets", self.ledger.wallets()).await?;
        let pending = bounded(self.io_timeout, "ledger.pending_orders", self.ledger.pending_orders()).await?;

        let mut held: HashMap<UserId, Decimal> = HashMap::new();
        for order in pending.iter().filter(|o| o.side == Side::Buy) {
            *held.entry(order.owner_id).or_default() += order.hold_amount;
        }

        for wallet in &wallets {
            let hold = held.get(&wallet.user_id).copied().unwrap_or_default();
            let available = (wallet.balance - hold).max(Decimal::ZERO);
            bounded(self.io_timeout, "balances.seed", self.balances.seed(wallet.user_id, available)).await?;
        }
        info!(wallets = wallets.len(), holders = held.len(), "Provisional balances restored");
        Ok(wallets.len())
    }

    /// Provisional balance of `user`, seeded from the wallet on first use
    pub async fn provisional_balance(&self, user: UserId) -> Result<Decimal, IntakeError> {
        if let Some(available) = bounded(self.io_timeout, "balances.available", self.balances.available(user)).await? {
            return Ok(available);
        }
        let wallet = bounded(self.io_timeout, "ledger.wallet", self.ledger.wallet(user))
            .await?
            .ok_or(IntakeError::UnknownUser(user))?;
        bounded(self.io_timeout, "balances.seed", self.balances.seed(user, wallet.balance)).await?;
        let available = bounded(self.io_timeout, "balances.available", self.balances.available(user)).await?;
        Ok(available.unwrap_or(wallet.balance))
    }

    /// Accept an order and hand it to the engine
    pub async fn submit(&self, user: UserId, request: &OrderRequest) -> Result<Order, IntakeError> {
        let wallet = bounded(self.io_timeout, "ledger.wallet", self.ledger.wallet(user))
            .await?
            .ok_or(IntakeError::UnknownUser(user))?;

        let (product, market_price) = match ProductName::try_new(request.product_name.trim()) {
            Some(name) => {
                let product = bounded(self.io_timeout, "ledger.product", self.ledger.product(&name)).await?;
                let price = self.prices.current(&name).await?;
                (product, price.map(|p| p.last_price).unwrap_or(Price::ZERO))
            }
            None => (None, Price::ZERO),
        };
        let available = self.provisional_balance(user).await?;

        let checked = match self
            .risk
            .check_pre_trade(request, product.as_ref(), market_price, &wallet.currency, available)
        {
            Ok(checked) => checked,
            Err(e) => {
                warn!(user = %user, error = %e, "Order rejected");
                return Err(e.into());
            }
        };

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let validated = checked.order;
        let order = Order::new(
            user,
            validated.side,
            validated.price_mode,
            validated.product_name,
            validated.currency,
            validated.quantity,
            validated.limit_price,
            sequence,
            now_nanos(),
        )
        .with_hold(checked.hold);

        self.take_hold(&order).await?;

        if let Err(e) = bounded(self.io_timeout, "ledger.insert_order", self.ledger.insert_order(&order)).await {
            error!(order_id = %order.order_id, error = %e, "Failed to persist order");
            self.release_hold(&order).await;
            return Err(e.into());
        }

        if let Err(e) = self.publish(&OrderEvent::Submit(order.clone())).await {
            error!(order_id = %order.order_id, error = %e, "Failed to publish order");
            self.release_hold(&order).await;
            self.mark_failed(&order).await;
            return Err(e);
        }

        info!(
            order_id = %order.order_id,
            side = %order.side,
            product = %order.product_name,
            quantity = order.quantity.as_i64(),
            hold = %order.hold_amount,
            "Order accepted"
        );
        Ok(order)
    }

    /// Validate a cancel request and hand it to the engine
    ///
    /// Returns the order as it stands in the ledger; the cancellation
    /// itself happens asynchronously.
    pub async fn cancel(&self, user: UserId, order_id: &OrderId) -> Result<Order, IntakeError> {
        let order = bounded(self.io_timeout, "ledger.order", self.ledger.order(order_id)).await?;
        let order = self.risk.check_cancel(order_id.as_str(), order.as_ref(), user)?.clone();

        self.publish(&OrderEvent::Cancel(CancelRequest {
            order_id: order_id.clone(),
            user_id: user,
        }))
        .await?;

        info!(order_id = %order_id, user = %user, "Cancel requested");
        Ok(order)
    }

    /// Durable order record, visible to its owner only
    pub async fn order(&self, user: UserId, order_id: &OrderId) -> Result<Order, IntakeError> {
        let order = bounded(self.io_timeout, "ledger.order", self.ledger.order(order_id))
            .await?
            .ok_or_else(|| CheckError::OrderNotFound(order_id.to_string()))?;
        if order.owner_id != user {
            return Err(CheckError::NotOwner(order_id.to_string()).into());
        }
        Ok(order)
    }

    /// Wallet, provisional balance and inventory of `user`
    pub async fn account(&self, user: UserId) -> Result<AccountResponse, IntakeError> {
        let wallet = bounded(self.io_timeout, "ledger.wallet", self.ledger.wallet(user))
            .await?
            .ok_or(IntakeError::UnknownUser(user))?;
        let provisional_balance = self.provisional_balance(user).await?;
        let inventory = bounded(self.io_timeout, "ledger.inventory", self.ledger.inventory(user)).await?;
        Ok(AccountResponse {
            user_id: wallet.user_id,
            currency: wallet.currency,
            balance: wallet.balance,
            provisional_balance,
            inventory,
        })
    }

    /// List a new product
    pub async fn list_product(&self, user: UserId, request: &ListingRequest) -> Result<Product, IntakeError> {
        let product = validate_listing(request, user, now_nanos())?;
        match bounded(self.io_timeout, "ledger.list_product", self.ledger.list_product(&product)).await {
            Ok(()) => {}
            Err(matching_engine::EngineError::Store(StoreError::Duplicate { .. })) => {
                return Err(IntakeError::DuplicateProduct(product.name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        info!(
            product = %product.name,
            count = product.quantity_listed,
            base_price = %product.base_price,
            lister = %user,
            "Product listed"
        );
        Ok(product)
    }

    async fn take_hold(&self, order: &Order) -> Result<(), IntakeError> {
        if order.hold_amount.is_zero() {
            return Ok(());
        }
        match bounded(
            self.io_timeout,
            "balances.try_debit",
            self.balances.try_debit(order.owner_id, order.hold_amount),
        )
        .await
        {
            Ok(remaining) => {
                debug!(order_id = %order.order_id, hold = %order.hold_amount, %remaining, "Hold taken");
                Ok(())
            }
            // Another request spent the balance since the check.
            Err(matching_engine::EngineError::Cache(CacheError::InsufficientFunds { available, .. })) => {
                Err(CheckError::InsufficientFunds {
                    required: order.hold_amount,
                    available: available.parse().unwrap_or_default(),
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn release_hold(&self, order: &Order) {
        if order.hold_amount.is_zero() {
            return;
        }
        match bounded(
            self.io_timeout,
            "balances.credit",
            self.balances.credit(order.owner_id, order.hold_amount),
        )
        .await
        {
            Ok(_) => info!(order_id = %order.order_id, hold = %order.hold_amount, "Hold rolled back"),
            Err(e) => error!(
                order_id = %order.order_id,
                hold = %order.hold_amount,
                error = %e,
                "Failed to roll back hold"
            ),
        }
    }

    /// Best effort: an order that was persisted but never published
    async fn mark_failed(&self, order: &Order) {
        let result = bounded(
            self.io_timeout,
            "ledger.transition",
            self.ledger
                .transition(&order.order_id, OrderStatus::Wait, OrderStatus::Error, now_nanos()),
        )
        .await;
        if let Err(e) = result {
            error!(order_id = %order.order_id, error = %e, "Failed to mark order as error");
        }
    }

    async fn publish(&self, event: &OrderEvent) -> Result<(), IntakeError> {
        let payload = event.encode()?;
        bounded(
            self.io_timeout,
            "broker.publish",
            self.publisher.publish(&self.routing_key, payload),
        )
        .await?;
        debug!(cmd = %event.cmd(), order_id = %event.order_id(), "Event published");
        Ok(())
    }
}
