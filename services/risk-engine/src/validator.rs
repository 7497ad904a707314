//! Request validation
//!
//! Validates incoming order, cancel and listing requests before intake
//! touches any store. Each check returns the first failing reason.

use rust_decimal::Decimal;
use serde::Deserialize;
use types::ids::{ProductName, UserId};
use types::market::Product;
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderStatus, PriceMode, Side};

use crate::errors::CheckError;

/// Inbound order request as submitted by a client
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderRequest {
    pub side: Side,
    pub price_mode: PriceMode,
    pub product_name: String,
    pub currency: String,
    pub quantity: i64,
    /// Decimal string; required for limit orders, ignored for market orders
    #[serde(default)]
    pub limit_price: Option<Decimal>,
}

/// An order request whose fields passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder {
    pub side: Side,
    pub price_mode: PriceMode,
    pub product_name: ProductName,
    pub currency: String,
    pub quantity: Quantity,
    /// Zero for market orders
    pub limit_price: Price,
}

/// Inbound product listing request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListingRequest {
    pub product_name: String,
    pub product_count: i64,
    pub currency: String,
    pub base_amount: Decimal,
}

/// Validate an order request against the listed product.
///
/// Checks performed (in order):
/// 1. Product name is not blank
/// 2. Quantity is positive
/// 3. Currency is not blank
/// 4. Limit price is present and positive for limit orders
/// 5. Product is listed
pub fn validate_order(
    request: &OrderRequest,
    product: Option<&Product>,
) -> Result<ValidatedOrder, CheckError> {
    let product_name = ProductName::try_new(request.product_name.trim())
        .ok_or_else(|| CheckError::invalid("product_name", "must not be blank"))?;

    let quantity = Quantity::try_new(request.quantity)
        .ok_or_else(|| CheckError::invalid("quantity", format!("must be positive, got {}", request.quantity)))?;

    let currency = normalize_currency(&request.currency)?;

    let limit_price = match request.price_mode {
        PriceMode::Market => Price::ZERO,
        PriceMode::Limit => {
            let raw = request
                .limit_price
                .ok_or_else(|| CheckError::invalid("limit_price", "required for limit orders"))?;
            if raw <= Decimal::ZERO {
                return Err(CheckError::invalid("limit_price", format!("must be positive, got {raw}")));
            }
            Price::try_new(raw).ok_or_else(|| CheckError::invalid("limit_price", raw.to_string()))?
        }
    };

    if product.map(|p| &p.name) != Some(&product_name) {
        return Err(CheckError::UnknownProduct(product_name.to_string()));
    }

    Ok(ValidatedOrder {
        side: request.side,
        price_mode: request.price_mode,
        product_name,
        currency,
        quantity,
        limit_price,
    })
}

/// Validate a cancel request against the durable order record
///
/// Only the owner may cancel, and never once the order has settled.
pub fn validate_cancel<'a>(
    order_id: &str,
    order: Option<&'a Order>,
    caller: UserId,
) -> Result<&'a Order, CheckError> {
    let order = order.ok_or_else(|| CheckError::OrderNotFound(order_id.to_string()))?;
    if order.owner_id != caller {
        return Err(CheckError::NotOwner(order_id.to_string()));
    }
    match order.status {
        OrderStatus::Wait => Ok(order),
        OrderStatus::Finished => Err(CheckError::AlreadySettled(order_id.to_string())),
        status @ (OrderStatus::Cancelled | OrderStatus::Error) => Err(CheckError::AlreadyClosed {
            order_id: order_id.to_string(),
            status: status.to_string(),
        }),
    }
}

/// Validate a listing request and build the product record
pub fn validate_listing(
    request: &ListingRequest,
    lister: UserId,
    timestamp: i64,
) -> Result<Product, CheckError> {
    let name = ProductName::try_new(request.product_name.trim())
        .ok_or_else(|| CheckError::invalid("product_name", "must not be blank"))?;
    if request.product_count <= 0 {
        return Err(CheckError::invalid(
            "product_count",
            format!("must be positive, got {}", request.product_count),
        ));
    }
    let currency = normalize_currency(&request.currency)?;
    let base_price = Price::try_new(request.base_amount).ok_or_else(|| {
        CheckError::invalid("base_amount", format!("must not be negative, got {}", request.base_amount))
    })?;

    Ok(Product::new(name, request.product_count, currency, base_price, timestamp).listed_by(lister))
}

fn normalize_currency(raw: &str) -> Result<String, CheckError> {
    let currency = raw.trim().to_ascii_uppercase();
    if currency.is_empty() {
        return Err(CheckError::invalid("currency", "must not be blank"));
    }
    if !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CheckError::invalid("currency", format!("not a currency code: {raw}")));
    }
    Ok(currency)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> Product {
        Product::new(ProductName::new("Widget"), 100, "USD", Price::from_u64(10), 0)
    }

    fn request(price_mode: PriceMode, quantity: i64, limit_price: Option<&str>) -> OrderRequest {
        OrderRequest {
            side: Side::Buy,
            price_mode,
            product_name: "Widget".to_string(),
            currency: "usd".to_string(),
            quantity,
            limit_price: limit_price.map(|p| Decimal::from_str_exact(p).unwrap()),
        }
    }

    fn placed(owner: i64, status: OrderStatus) -> Order {
        let mut order = Order::new(
            UserId::new(owner),
            Side::Buy,
            PriceMode::Limit,
            ProductName::new("Widget"),
            "USD",
            Quantity::try_new(1).unwrap(),
            Price::from_u64(10),
            1,
            0,
        );
        order.status = status;
        order
    }

    #[test]
    fn test_valid_limit_order() {
        let product = widget();
        let validated = validate_order(&request(PriceMode::Limit, 5, Some("9.50")), Some(&product)).unwrap();
        assert_eq!(validated.quantity.as_i64(), 5);
        assert_eq!(validated.currency, "USD");
        assert_eq!(validated.limit_price, Price::from_str("9.50").unwrap());
    }

    #[test]
    fn test_market_order_ignores_limit_price() {
        let product = widget();
        let validated = validate_order(&request(PriceMode::Market, 1, Some("-3")), Some(&product)).unwrap();
        assert_eq!(validated.limit_price, Price::ZERO);
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let product = widget();
        for qty in [0, -4] {
            let err = validate_order(&request(PriceMode::Market, qty, None), Some(&product)).unwrap_err();
            assert!(matches!(err, CheckError::InvalidParameter { field: "quantity", .. }));
        }
    }

    #[test]
    fn test_limit_order_needs_positive_price() {
        let product = widget();
        for price in [None, Some("0"), Some("-1")] {
            let err = validate_order(&request(PriceMode::Limit, 1, price), Some(&product)).unwrap_err();
            assert!(matches!(err, CheckError::InvalidParameter { field: "limit_price", .. }));
        }
    }

    #[test]
    fn test_unlisted_product_rejected() {
        let err = validate_order(&request(PriceMode::Market, 1, None), None).unwrap_err();
        assert_eq!(err, CheckError::UnknownProduct("Widget".to_string()));
    }

    #[test]
    fn test_blank_fields_rejected() {
        let product = widget();
        let mut blank_currency = request(PriceMode::Market, 1, None);
        blank_currency.currency = "  ".to_string();
        assert!(matches!(
            validate_order(&blank_currency, Some(&product)),
            Err(CheckError::InvalidParameter { field: "currency", .. })
        ));

        let mut blank_name = request(PriceMode::Market, 1, None);
        blank_name.product_name = String::new();
        assert!(matches!(
            validate_order(&blank_name, Some(&product)),
            Err(CheckError::InvalidParameter { field: "product_name", .. })
        ));
    }

    #[test]
    fn test_request_parses_decimal_string() {
        let body = r#"{"side":"buy","price_mode":"limit","product_name":"Widget","currency":"USD","quantity":2,"limit_price":"12.25"}"#;
        let parsed: OrderRequest = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.limit_price, Some(Decimal::from_str_exact("12.25").unwrap()));

        let market = r#"{"side":"sell","price_mode":"market","product_name":"Widget","currency":"USD","quantity":2}"#;
        let parsed: OrderRequest = serde_json::from_str(market).unwrap();
        assert_eq!(parsed.limit_price, None);
    }

    #[test]
    fn test_cancel_checks() {
        let mine = placed(1, OrderStatus::Wait);
        assert!(validate_cancel("x", Some(&mine), UserId::new(1)).is_ok());
        assert_eq!(
            validate_cancel("x", Some(&mine), UserId::new(2)).unwrap_err(),
            CheckError::NotOwner("x".to_string())
        );
        assert_eq!(
            validate_cancel("x", None, UserId::new(1)).unwrap_err(),
            CheckError::OrderNotFound("x".to_string())
        );

        let finished = placed(1, OrderStatus::Finished);
        assert_eq!(
            validate_cancel("x", Some(&finished), UserId::new(1)).unwrap_err(),
            CheckError::AlreadySettled("x".to_string())
        );
        let cancelled = placed(1, OrderStatus::Cancelled);
        assert!(matches!(
            validate_cancel("x", Some(&cancelled), UserId::new(1)),
            Err(CheckError::AlreadyClosed { .. })
        ));
    }

    #[test]
    fn test_listing() {
        let listing = ListingRequest {
            product_name: " Gadget ".to_string(),
            product_count: 3,
            currency: "twd".to_string(),
            base_amount: Decimal::from(7),
        };
        let product = validate_listing(&listing, UserId::new(4), 99).unwrap();
        assert_eq!(product.name.as_str(), "Gadget");
        assert_eq!(product.currency, "TWD");
        assert_eq!(product.listed_by, Some(UserId::new(4)));
        assert_eq!(product.listed_at, 99);

        let empty = ListingRequest {
            product_count: 0,
            ..listing
        };
        assert!(matches!(
            validate_listing(&empty, UserId::new(4), 0),
            Err(CheckError::InvalidParameter { field: "product_count", .. })
        ));
    }
}
