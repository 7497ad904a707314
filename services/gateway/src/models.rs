use rust_decimal::Decimal;
use serde::Serialize;
use types::account::InventoryEntry;
use types::ids::{OrderId, UserId};
use types::order::{Order, OrderStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub hold_amount: Decimal,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            status: order.status,
            hold_amount: order.hold_amount,
        }
    }
}

/// Wallet, spendable balance and holdings of one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountResponse {
    pub user_id: UserId,
    pub currency: String,
    pub balance: Decimal,
    /// Balance less the holds of pending buy orders
    pub provisional_balance: Decimal,
    pub inventory: Vec<InventoryEntry>,
}
