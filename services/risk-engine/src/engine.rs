//! Risk Engine: orchestrator
//!
//! Ties together request validation, the rate table and the hold estimate
//! into the single pre-trade decision Order Intake needs.

use rust_decimal::Decimal;
use types::ids::UserId;
use types::market::Product;
use types::numeric::Price;
use types::order::{Order, PriceMode, Side};

use crate::errors::CheckError;
use crate::hold;
use crate::rates::RateTable;
use crate::validator::{self, OrderRequest, ValidatedOrder};

/// Accepted order with the amount to withhold from the provisional balance
#[derive(Debug, Clone, PartialEq)]
pub struct PreTrade {
    pub order: ValidatedOrder,
    /// Wallet-currency amount; zero for sell orders
    pub hold: Decimal,
    pub fx_rate: Decimal,
}

/// Pre-trade check service
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    rates: RateTable,
}

impl RiskEngine {
    pub fn new(rates: RateTable) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    /// Validate an order and size its hold.
    ///
    /// Buy orders hold `unit_price × quantity × rate(wallet, order currency)`
    /// where the unit price is the limit for limit orders and the current
    /// market price for market orders. Sell orders hold nothing.
    pub fn check_pre_trade(
        &self,
        request: &OrderRequest,
        product: Option<&Product>,
        market_price: Price,
        wallet_currency: &str,
        available: Decimal,
    ) -> Result<PreTrade, CheckError> {
        let order = validator::validate_order(request, product)?;
        let fx_rate = self.rates.rate(wallet_currency, &order.currency)?;

        let hold = match order.side {
            Side::Sell => Decimal::ZERO,
            Side::Buy => {
                let unit_price = match order.price_mode {
                    PriceMode::Limit => order.limit_price,
                    PriceMode::Market => market_price,
                };
                let cost = hold::estimated_cost(unit_price, order.quantity, fx_rate);
                hold::check_hold(cost, available)?;
                cost
            }
        };

        Ok(PreTrade { order, hold, fx_rate })
    }

    /// Check a cancel request against the durable order
    pub fn check_cancel<'a>(
        &self,
        order_id: &str,
        order: Option<&'a Order>,
        caller: UserId,
    ) -> Result<&'a Order, CheckError> {
        validator::validate_cancel(order_id, order, caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::ProductName;

    fn widget() -> Product {
        Product::new(ProductName::new("Widget"), 100, "USD", Price::from_u64(10), 0)
    }

    fn request(side: Side, price_mode: PriceMode, currency: &str, limit: Option<i64>) -> OrderRequest {
        OrderRequest {
            side,
            price_mode,
            product_name: "Widget".to_string(),
            currency: currency.to_string(),
            quantity: 4,
            limit_price: limit.map(Decimal::from),
        }
    }

    #[test]
    fn test_market_buy_holds_at_market_price() {
        let engine = RiskEngine::default();
        let product = widget();
        let pre = engine
            .check_pre_trade(
                &request(Side::Buy, PriceMode::Market, "USD", None),
                Some(&product),
                Price::from_u64(12),
                "USD",
                Decimal::from(100),
            )
            .unwrap();
        assert_eq!(pre.hold, Decimal::from(48));
        assert_eq!(pre.fx_rate, Decimal::ONE);
    }

    #[test]
    fn test_limit_buy_holds_at_limit() {
        let engine = RiskEngine::default();
        let product = widget();
        let pre = engine
            .check_pre_trade(
                &request(Side::Buy, PriceMode::Limit, "USD", Some(9)),
                Some(&product),
                Price::from_u64(12),
                "USD",
                Decimal::from(100),
            )
            .unwrap();
        assert_eq!(pre.hold, Decimal::from(36));
    }

    #[test]
    fn test_cross_currency_hold() {
        // CNY wallet buying in USD: 10 × 4 × 0.15
        let engine = RiskEngine::default();
        let product = widget();
        let pre = engine
            .check_pre_trade(
                &request(Side::Buy, PriceMode::Market, "USD", None),
                Some(&product),
                Price::from_u64(10),
                "CNY",
                Decimal::from(100),
            )
            .unwrap();
        assert_eq!(pre.hold, Decimal::from(6));
    }

    #[test]
    fn test_insufficient_balance_rejected() {
        let engine = RiskEngine::default();
        let product = widget();
        let err = engine
            .check_pre_trade(
                &request(Side::Buy, PriceMode::Market, "USD", None),
                Some(&product),
                Price::from_u64(10),
                "USD",
                Decimal::from(39),
            )
            .unwrap_err();
        assert_eq!(
            err,
            CheckError::InsufficientFunds {
                required: Decimal::from(40),
                available: Decimal::from(39)
            }
        );
    }

    #[test]
    fn test_sell_holds_nothing() {
        let engine = RiskEngine::default();
        let product = widget();
        let pre = engine
            .check_pre_trade(
                &request(Side::Sell, PriceMode::Limit, "USD", Some(8)),
                Some(&product),
                Price::from_u64(10),
                "USD",
                Decimal::ZERO,
            )
            .unwrap();
        assert_eq!(pre.hold, Decimal::ZERO);
    }

    #[test]
    fn test_unknown_pair_rejected() {
        let engine = RiskEngine::new(RateTable::empty());
        let product = widget();
        let err = engine
            .check_pre_trade(
                &request(Side::Sell, PriceMode::Limit, "USD", Some(8)),
                Some(&product),
                Price::from_u64(10),
                "TWD",
                Decimal::ZERO,
            )
            .unwrap_err();
        assert!(matches!(err, CheckError::UnsupportedPair { .. }));
    }
}
