//! Crossing detection logic
//!
//! Determines when a buy and a sell order can match

use types::numeric::Price;
use types::order::Order;

/// Check if a buy and sell can match at their resolved prices
///
/// For a buy order to match with a sell order the buy price must be
/// at least the sell price.
pub fn can_match(buy_price: Price, sell_price: Price) -> bool {
    buy_price >= sell_price
}

/// Whether `sell` is an eligible counter-order for `buy`, ignoring price
///
/// Same product and distinct owners (no self-trade).
pub fn is_counterparty(buy: &Order, sell: &Order) -> bool {
    buy.product_name == sell.product_name && buy.owner_id != sell.owner_id
}
