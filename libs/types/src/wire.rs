//! Broker wire format
//!
//! All order lifecycle events travel on one exchange/routing key inside an
//! envelope `{"cmd": <int>, "data": <payload>}`:
//!
//! | cmd | meaning     | payload      |
//! |-----|-------------|--------------|
//! | 0   | unknown     | rejected     |
//! | 1   | submit_buy  | [`WireOrder`] |
//! | 2   | submit_sell | [`WireOrder`] |
//! | 3   | cancel      | [`WireCancel`] |
//!
//! Money travels as decimal strings, timestamps as unix nanoseconds.

use crate::errors::WireError;
use crate::ids::{OrderId, ProductName, UserId};
use crate::market::MarketPrice;
use crate::numeric::{Price, Quantity};
use crate::order::{Order, OrderStatus, PriceMode, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Event command carried in the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCmd {
    SubmitBuy,
    SubmitSell,
    Cancel,
}

impl EventCmd {
    pub fn code(&self) -> i32 {
        match self {
            EventCmd::SubmitBuy => 1,
            EventCmd::SubmitSell => 2,
            EventCmd::Cancel => 3,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, WireError> {
        match code {
            1 => Ok(EventCmd::SubmitBuy),
            2 => Ok(EventCmd::SubmitSell),
            3 => Ok(EventCmd::Cancel),
            other => Err(WireError::UnknownCommand(other)),
        }
    }

    pub fn submit(side: Side) -> Self {
        match side {
            Side::Buy => EventCmd::SubmitBuy,
            Side::Sell => EventCmd::SubmitSell,
        }
    }
}

impl fmt::Display for EventCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventCmd::SubmitBuy => "submit_buy",
            EventCmd::SubmitSell => "submit_sell",
            EventCmd::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

/// Raw envelope as it appears on the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub cmd: i32,
    pub data: serde_json::Value,
}

/// Order as carried in a submit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOrder {
    pub transaction_mode: i32,
    pub transaction_type: i32,
    pub transaction_id: String,
    pub product_name: String,
    pub user_id: i64,
    pub currency: String,
    /// Limit price; ignored for market orders
    pub amount: String,
    pub operate_count: i64,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

/// Cancel request as carried in a cancel event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCancel {
    pub transaction_id: String,
    pub user_id: i64,
}

/// Request to cancel a pending order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
}

/// Decoded order lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Submit(Order),
    Cancel(CancelRequest),
}

impl OrderEvent {
    pub fn cmd(&self) -> EventCmd {
        match self {
            OrderEvent::Submit(order) => EventCmd::submit(order.side),
            OrderEvent::Cancel(_) => EventCmd::Cancel,
        }
    }

    pub fn order_id(&self) -> &OrderId {
        match self {
            OrderEvent::Submit(order) => &order.order_id,
            OrderEvent::Cancel(req) => &req.order_id,
        }
    }

    /// Decode an event from broker bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;
        let cmd = EventCmd::from_code(envelope.cmd)?;
        match cmd {
            EventCmd::SubmitBuy | EventCmd::SubmitSell => {
                let wire: WireOrder = serde_json::from_value(envelope.data)?;
                let order = wire.into_order()?;
                if EventCmd::submit(order.side) != cmd {
                    return Err(WireError::SideMismatch {
                        cmd: envelope.cmd,
                        mode: side_code(order.side),
                    });
                }
                Ok(OrderEvent::Submit(order))
            }
            EventCmd::Cancel => {
                let wire: WireCancel = serde_json::from_value(envelope.data)?;
                Ok(OrderEvent::Cancel(wire.into_request()?))
            }
        }
    }

    /// Encode the event as broker bytes
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let data = match self {
            OrderEvent::Submit(order) => serde_json::to_value(WireOrder::from(order))?,
            OrderEvent::Cancel(req) => serde_json::to_value(WireCancel::from(req))?,
        };
        let envelope = Envelope {
            cmd: self.cmd().code(),
            data,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }
}

fn side_code(side: Side) -> i32 {
    match side {
        Side::Buy => 1,
        Side::Sell => 2,
    }
}

fn mode_code(mode: PriceMode) -> i32 {
    match mode {
        PriceMode::Limit => 1,
        PriceMode::Market => 2,
    }
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal, WireError> {
    Decimal::from_str(raw.trim()).map_err(|e| WireError::InvalidField {
        field,
        reason: e.to_string(),
    })
}

impl WireOrder {
    /// Convert into a `Wait` order
    pub fn into_order(self) -> Result<Order, WireError> {
        let side = match self.transaction_mode {
            1 => Side::Buy,
            2 => Side::Sell,
            other => return Err(WireError::UnknownMode(other)),
        };
        let price_mode = match self.transaction_type {
            1 => PriceMode::Limit,
            2 => PriceMode::Market,
            other => return Err(WireError::UnknownType(other)),
        };
        if self.transaction_id.trim().is_empty() {
            return Err(WireError::InvalidField {
                field: "transaction_id",
                reason: "must not be empty".to_string(),
            });
        }
        let product_name =
            ProductName::try_new(self.product_name).ok_or(WireError::InvalidField {
                field: "product_name",
                reason: "must not be blank".to_string(),
            })?;
        let quantity = Quantity::try_new(self.operate_count).ok_or_else(|| WireError::InvalidField {
            field: "operate_count",
            reason: format!("must be positive, got {}", self.operate_count),
        })?;
        let limit_price = match price_mode {
            PriceMode::Limit => Price::try_new(parse_decimal("amount", &self.amount)?).ok_or(
                WireError::InvalidField {
                    field: "amount",
                    reason: "must be non-negative".to_string(),
                },
            )?,
            PriceMode::Market => Price::ZERO,
        };
        let hold_amount = match self.hold_amount.as_deref() {
            Some(raw) => parse_decimal("hold_amount", raw)?,
            None => Decimal::ZERO,
        };
        let order_id = OrderId::from_string(self.transaction_id);
        let sequence = self.sequence.or_else(|| order_id.sequence()).unwrap_or(0);

        Ok(Order {
            order_id,
            sequence,
            side,
            price_mode,
            owner_id: UserId::new(self.user_id),
            product_name,
            currency: self.currency,
            quantity,
            limit_price,
            hold_amount,
            status: OrderStatus::Wait,
            settled_amount: None,
            counterparty: None,
            submitted_at: self.timestamp,
            updated_at: self.timestamp,
        })
    }
}

impl From<&Order> for WireOrder {
    fn from(order: &Order) -> Self {
        Self {
            transaction_mode: side_code(order.side),
            transaction_type: mode_code(order.price_mode),
            transaction_id: order.order_id.to_string(),
            product_name: order.product_name.to_string(),
            user_id: order.owner_id.as_i64(),
            currency: order.currency.clone(),
            amount: order.limit_price.to_string(),
            operate_count: order.quantity.as_i64(),
            timestamp: order.submitted_at,
            hold_amount: Some(order.hold_amount.to_string()),
            sequence: Some(order.sequence),
        }
    }
}

impl WireCancel {
    pub fn into_request(self) -> Result<CancelRequest, WireError> {
        if self.transaction_id.trim().is_empty() {
            return Err(WireError::InvalidField {
                field: "transaction_id",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(CancelRequest {
            order_id: OrderId::from_string(self.transaction_id),
            user_id: UserId::new(self.user_id),
        })
    }
}

impl From<&CancelRequest> for WireCancel {
    fn from(req: &CancelRequest) -> Self {
        Self {
            transaction_id: req.order_id.to_string(),
            user_id: req.user_id.as_i64(),
        }
    }
}

/// Market price cache entry, JSON-encoded as the hash field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPriceEntry {
    pub product_count: i64,
    pub currency: String,
    pub amount: String,
}

impl MarketPriceEntry {
    pub fn decode(raw: &str) -> Result<MarketPrice, WireError> {
        let entry: MarketPriceEntry = serde_json::from_str(raw)?;
        entry.try_into()
    }

    pub fn encode(price: &MarketPrice) -> Result<String, WireError> {
        Ok(serde_json::to_string(&MarketPriceEntry::from(price))?)
    }
}

impl From<&MarketPrice> for MarketPriceEntry {
    fn from(price: &MarketPrice) -> Self {
        Self {
            product_count: price.quantity_listed,
            currency: price.currency.clone(),
            amount: price.last_price.to_string(),
        }
    }
}

impl TryFrom<MarketPriceEntry> for MarketPrice {
    type Error = WireError;

    fn try_from(entry: MarketPriceEntry) -> Result<Self, Self::Error> {
        let last_price = Price::try_new(parse_decimal("amount", &entry.amount)?).ok_or(
            WireError::InvalidField {
                field: "amount",
                reason: "must be non-negative".to_string(),
            },
        )?;
        Ok(MarketPrice {
            quantity_listed: entry.product_count,
            currency: entry.currency,
            last_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submit_bytes(cmd: i32, mode: i32, kind: i32, amount: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "cmd": cmd,
            "data": {
                "transaction_mode": mode,
                "transaction_type": kind,
                "transaction_id": "2-S-7",
                "product_name": "Widget",
                "user_id": 2,
                "currency": "USD",
                "amount": amount,
                "operate_count": 5,
                "timestamp": 1708123456789000000i64
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_limit_sell() {
        let event = OrderEvent::decode(&submit_bytes(2, 2, 1, "8.00")).unwrap();
        let OrderEvent::Submit(order) = event else {
            panic!("expected submit");
        };
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.price_mode, PriceMode::Limit);
        assert_eq!(order.limit_price, Price::from_str("8.00").unwrap());
        assert_eq!(order.sequence, 7);
        assert_eq!(order.hold_amount, Decimal::ZERO);
        assert_eq!(order.status, OrderStatus::Wait);
    }

    #[test]
    fn test_market_order_ignores_amount() {
        let event = OrderEvent::decode(&submit_bytes(1, 1, 2, "garbage")).unwrap();
        let OrderEvent::Submit(order) = event else {
            panic!("expected submit");
        };
        assert_eq!(order.price_mode, PriceMode::Market);
        assert_eq!(order.limit_price, Price::ZERO);
    }

    #[test]
    fn test_cmd_must_match_mode() {
        let err = OrderEvent::decode(&submit_bytes(1, 2, 1, "8")).unwrap_err();
        assert_eq!(err, WireError::SideMismatch { cmd: 1, mode: 2 });
    }

    #[test]
    fn test_unknown_cmd_rejected() {
        let bytes = serde_json::to_vec(&json!({"cmd": 0, "data": {}})).unwrap();
        assert_eq!(OrderEvent::decode(&bytes).unwrap_err(), WireError::UnknownCommand(0));
    }

    #[test]
    fn test_non_positive_count_rejected() {
        let mut value: serde_json::Value = serde_json::from_slice(&submit_bytes(2, 2, 1, "8")).unwrap();
        value["data"]["operate_count"] = json!(0);
        let err = OrderEvent::decode(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert!(matches!(err, WireError::InvalidField { field: "operate_count", .. }));
    }

    #[test]
    fn test_malformed_bytes() {
        assert!(matches!(
            OrderEvent::decode(b"not json").unwrap_err(),
            WireError::Malformed(_)
        ));
    }

    #[test]
    fn test_cancel_encode_decode() {
        let event = OrderEvent::Cancel(CancelRequest {
            order_id: OrderId::from_string("1-B-3"),
            user_id: UserId::new(1),
        });
        let bytes = event.encode().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["cmd"], json!(3));
        assert_eq!(value["data"]["transaction_id"], json!("1-B-3"));
        assert_eq!(OrderEvent::decode(&bytes).unwrap(), event);
    }

    #[test]
    fn test_submit_carries_hold_amount() {
        let order = Order::new(
            UserId::new(1),
            Side::Buy,
            PriceMode::Market,
            ProductName::new("Widget"),
            "USD",
            Quantity::try_new(5).unwrap(),
            Price::ZERO,
            3,
            10,
        )
        .with_hold(Decimal::new(5000, 2));
        let bytes = OrderEvent::Submit(order.clone()).encode().unwrap();

        let OrderEvent::Submit(decoded) = OrderEvent::decode(&bytes).unwrap() else {
            panic!("expected submit");
        };
        assert_eq!(decoded, order);
    }

    #[test]
    fn test_market_price_entry_format() {
        let price = MarketPrice {
            quantity_listed: 100,
            currency: "USD".to_string(),
            last_price: Price::from_str("8.00").unwrap(),
        };
        let raw = MarketPriceEntry::encode(&price).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(value, json!({"product_count": 100, "currency": "USD", "amount": "8.00"}));
        assert_eq!(MarketPriceEntry::decode(&raw).unwrap(), price);
    }
}
