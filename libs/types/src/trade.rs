//! Settlement records
//!
//! One record per matched buy/sell pair, produced by the crossing sweep and
//! committed to the ledger as a single transaction.

use crate::fee::FeeSchedule;
use crate::ids::{OrderId, ProductName, TradeId, UserId};
use crate::numeric::{Price, Quantity};
use crate::order::Order;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A matched pair priced and ready to be applied to the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub trade_id: TradeId,
    pub product: ProductName,

    // Order references
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,

    // Parties
    pub buyer: UserId,
    pub seller: UserId,

    /// Seller's resolved unit price; becomes the new market price
    pub unit_price: Price,
    /// Seller's listed quantity, delivered to the buyer
    pub quantity: Quantity,
    /// `unit_price × quantity`, debited from the buyer
    pub notional: Decimal,
    pub fee: Decimal,
    pub seller_credit: Decimal,
    pub currency: String,

    pub executed_at: i64, // Unix nanos
}

impl SettlementRecord {
    /// Price a matched pair at the seller's unit price
    pub fn price(
        buy: &Order,
        sell: &Order,
        unit_price: Price,
        fees: &FeeSchedule,
        executed_at: i64,
    ) -> Self {
        let notional = unit_price.times(sell.quantity);
        let seller_credit = fees.seller_credit(notional);

        Self {
            trade_id: TradeId::new(),
            product: sell.product_name.clone(),
            buy_order_id: buy.order_id.clone(),
            sell_order_id: sell.order_id.clone(),
            buyer: buy.owner_id,
            seller: sell.owner_id,
            unit_price,
            quantity: sell.quantity,
            notional,
            fee: notional - seller_credit,
            seller_credit,
            currency: sell.currency.clone(),
            executed_at,
        }
    }
}
