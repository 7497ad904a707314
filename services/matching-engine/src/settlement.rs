//! Settlement of a matched pair
//!
//! The inventory credit, both order records and both wallet movements are
//! committed to the ledger as one transaction. Publishing the new market
//! price happens afterwards and is best-effort: a failed publish is reported
//! back so the engine can replay it later.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use types::fee::FeeSchedule;
use types::now_nanos;
use types::numeric::Price;
use types::order::Order;
use types::trade::SettlementRecord;

use crate::errors::SettlementError;
use crate::io::bounded;
use crate::prices::MarketPrices;
use crate::store::LedgerStore;

/// Outcome of a successful settlement
#[derive(Debug, Clone)]
pub struct Settled {
    pub record: SettlementRecord,
    /// False when the ledger committed but the price cache write failed
    pub price_published: bool,
}

/// Applies a matched pair at the given trade price
#[async_trait]
pub trait Settler: Send + Sync {
    async fn settle(&self, buy: &Order, sell: &Order, trade_price: Price) -> Result<Settled, SettlementError>;
}

/// Ledger-backed settlement
pub struct Settlement {
    ledger: Arc<dyn LedgerStore>,
    prices: MarketPrices,
    fees: FeeSchedule,
    io_timeout: Duration,
}

impl Settlement {
    pub fn new(ledger: Arc<dyn LedgerStore>, prices: MarketPrices, fees: FeeSchedule, io_timeout: Duration) -> Self {
        Self {
            ledger,
            prices,
            fees,
            io_timeout,
        }
    }
}

#[async_trait]
impl Settler for Settlement {
    async fn settle(&self, buy: &Order, sell: &Order, trade_price: Price) -> Result<Settled, SettlementError> {
        let record = SettlementRecord::price(buy, sell, trade_price, &self.fees, now_nanos());

        bounded(
            self.io_timeout,
            "ledger.commit_settlement",
            self.ledger.commit_settlement(&record),
        )
        .await?;

        info!(
            trade_id = %record.trade_id,
            product = %record.product,
            buy_order = %record.buy_order_id,
            sell_order = %record.sell_order_id,
            price = %record.unit_price,
            quantity = %record.quantity,
            notional = %record.notional,
            seller_credit = %record.seller_credit,
            "Trade settled"
        );

        let price_published = match self.prices.publish(&record.product, trade_price).await {
            Ok(()) => true,
            Err(e) => {
                warn!(product = %record.product, price = %trade_price, error = %e, "Market price publish failed, queued for replay");
                false
            }
        };

        Ok(Settled {
            record,
            price_published,
        })
    }
}
