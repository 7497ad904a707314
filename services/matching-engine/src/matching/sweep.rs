//! Crossing sweep
//!
//! First-fit scan: for each pending buy in insertion order, the first
//! pending sell in insertion order that is for the same product, has a
//! different owner and whose resolved price the buyer's resolved price
//! covers is settled at the seller's price. A buyer matches at most one
//! seller per sweep. Insertion order wins over a cheaper ask further down.
//!
//! The scan runs over copies of both sequences; matched orders are removed
//! from the book in one pass afterwards so indices never shift mid-scan.

use std::collections::{HashMap, HashSet};
use tracing::{debug, error, warn};
use types::ids::{OrderId, ProductName};
use types::market::MarketPrice;
use types::numeric::Price;
use types::order::{Order, PriceMode};

use super::crossing::{can_match, is_counterparty};
use crate::book::OrderBook;
use crate::errors::SettlementError;
use crate::events::{MatchFailure, SweepReport, TradeSettled};
use crate::settlement::Settler;

/// Products that appear on the buy side, deduplicated in first-seen order
pub fn buy_side_products(book: &OrderBook) -> Vec<ProductName> {
    let mut seen = HashSet::new();
    book.buys()
        .iter()
        .filter(|o| seen.insert(o.product_name.clone()))
        .map(|o| o.product_name.clone())
        .collect()
}

fn resolved(order: &Order, market: Option<Price>) -> Option<Price> {
    match order.price_mode {
        PriceMode::Limit => Some(order.limit_price),
        PriceMode::Market => market,
    }
}

/// Run one sweep over `book`
///
/// `prices` holds the market price of every buy-side product that has one.
/// Market orders for a product with no price are skipped; limit orders
/// match on their own prices.
pub async fn cross<S>(book: &mut OrderBook, prices: &HashMap<ProductName, MarketPrice>, settler: &S) -> SweepReport
where
    S: Settler + ?Sized,
{
    let mut report = SweepReport::default();
    if book.is_one_sided() {
        report.buys_remaining = book.buys().len();
        report.sells_remaining = book.sells().len();
        return report;
    }

    let buys: Vec<Order> = book.buys().as_slice().to_vec();
    let sells: Vec<Order> = book.sells().as_slice().to_vec();
    let mut sell_taken = vec![false; sells.len()];
    let mut consumed: HashSet<OrderId> = HashSet::new();

    for buy in &buys {
        let market = prices.get(&buy.product_name).map(|p| p.last_price);
        let Some(buy_price) = resolved(buy, market) else {
            warn!(order_id = %buy.order_id, product = %buy.product_name, "No market price, buyer skipped");
            report.skipped_buyers += 1;
            continue;
        };

        for (index, sell) in sells.iter().enumerate() {
            if sell_taken[index] || !is_counterparty(buy, sell) {
                continue;
            }
            // A market sell cannot be priced without the market price.
            let Some(sell_price) = resolved(sell, market) else {
                continue;
            };
            if !can_match(buy_price, sell_price) {
                continue;
            }

            debug!(
                buy_order = %buy.order_id,
                sell_order = %sell.order_id,
                buy_price = %buy_price,
                sell_price = %sell_price,
                "Crossing"
            );

            match settler.settle(buy, sell, sell_price).await {
                Ok(settled) => {
                    sell_taken[index] = true;
                    consumed.insert(buy.order_id.clone());
                    consumed.insert(sell.order_id.clone());
                    let mut trade = TradeSettled::from(&settled.record);
                    trade.price_published = settled.price_published;
                    report.trades.push(trade);
                }
                Err(SettlementError::Stale { order_id }) => {
                    // No longer Wait in the ledger, so it must leave the book.
                    warn!(order_id = %order_id, "Stale order dropped from book");
                    if order_id == sell.order_id {
                        sell_taken[index] = true;
                    }
                    report.stale.push(order_id.clone());
                    consumed.insert(order_id);
                }
                Err(e) => {
                    error!(
                        buy_order = %buy.order_id,
                        sell_order = %sell.order_id,
                        error = %e,
                        "Settlement failed, pair left in book"
                    );
                    report.failures.push(MatchFailure {
                        buy_order_id: buy.order_id.clone(),
                        sell_order_id: sell.order_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            // One attempt per buyer per sweep, successful or not.
            break;
        }
    }

    book.remove_all(&consumed);
    report.buys_remaining = book.buys().len();
    report.sells_remaining = book.sells().len();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{EngineError, StoreError};
    use crate::settlement::Settled;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use types::fee::FeeSchedule;
    use types::ids::UserId;
    use types::numeric::Quantity;
    use types::order::Side;
    use types::trade::SettlementRecord;

    /// Records every settle call; fails for listed sell orders
    #[derive(Default)]
    struct RecordingSettler {
        calls: Mutex<Vec<(OrderId, OrderId, Price)>>,
        fail_sells: Vec<OrderId>,
        stale_sells: Vec<OrderId>,
    }

    impl RecordingSettler {
        fn calls(&self) -> Vec<(OrderId, OrderId, Price)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Settler for RecordingSettler {
        async fn settle(&self, buy: &Order, sell: &Order, trade_price: Price) -> Result<Settled, SettlementError> {
            self.calls
                .lock()
                .unwrap()
                .push((buy.order_id.clone(), sell.order_id.clone(), trade_price));
            if self.fail_sells.contains(&sell.order_id) {
                return Err(EngineError::Store(StoreError::Unavailable("down".into())).into());
            }
            if self.stale_sells.contains(&sell.order_id) {
                return Err(SettlementError::Stale { order_id: sell.order_id.clone() });
            }
            Ok(Settled {
                record: SettlementRecord::price(buy, sell, trade_price, &FeeSchedule::zero(), 0),
                price_published: true,
            })
        }
    }

    fn order(owner: i64, side: Side, mode: PriceMode, product: &str, limit: u64, seq: u64) -> Order {
        Order::new(
            UserId::new(owner),
            side,
            mode,
            ProductName::new(product),
            "USD",
            Quantity::try_new(5).unwrap(),
            Price::from_u64(limit),
            seq,
            0,
        )
    }

    fn prices(entries: &[(&str, u64)]) -> HashMap<ProductName, MarketPrice> {
        entries
            .iter()
            .map(|(name, price)| {
                (
                    ProductName::new(*name),
                    MarketPrice {
                        quantity_listed: 100,
                        currency: "USD".to_string(),
                        last_price: Price::from_u64(*price),
                    },
                )
            })
            .collect()
    }

    fn book_of(orders: Vec<Order>) -> OrderBook {
        let mut book = OrderBook::new();
        for o in orders {
            book.enqueue(o).unwrap();
        }
        book
    }

    #[tokio::test]
    async fn test_empty_side_is_noop() {
        let mut book = book_of(vec![order(1, Side::Buy, PriceMode::Market, "Widget", 0, 1)]);
        let settler = RecordingSettler::default();

        let report = cross(&mut book, &prices(&[("Widget", 10)]), &settler).await;

        assert!(report.trades.is_empty());
        assert!(settler.calls().is_empty());
        assert_eq!(report.buys_remaining, 1);
    }

    #[tokio::test]
    async fn test_first_fit_not_best_price() {
        let buy = order(1, Side::Buy, PriceMode::Market, "Widget", 0, 1);
        let s1 = order(2, Side::Sell, PriceMode::Limit, "Widget", 10, 2);
        let s2 = order(3, Side::Sell, PriceMode::Limit, "Widget", 8, 3);
        let mut book = book_of(vec![buy.clone(), s1.clone(), s2.clone()]);
        let settler = RecordingSettler::default();

        let report = cross(&mut book, &prices(&[("Widget", 10)]), &settler).await;

        assert_eq!(settler.calls(), vec![(buy.order_id, s1.order_id.clone(), Price::from_u64(10))]);
        assert_eq!(report.trades.len(), 1);
        assert!(!book.contains(&s1.order_id));
        assert!(book.contains(&s2.order_id));
    }

    #[tokio::test]
    async fn test_self_trade_skipped() {
        let buy = order(1, Side::Buy, PriceMode::Limit, "Widget", 20, 1);
        let own = order(1, Side::Sell, PriceMode::Limit, "Widget", 5, 2);
        let other = order(2, Side::Sell, PriceMode::Limit, "Widget", 9, 3);
        let mut book = book_of(vec![buy.clone(), own.clone(), other.clone()]);
        let settler = RecordingSettler::default();

        cross(&mut book, &prices(&[("Widget", 10)]), &settler).await;

        assert_eq!(settler.calls(), vec![(buy.order_id, other.order_id, Price::from_u64(9))]);
        assert!(book.contains(&own.order_id));
    }

    #[tokio::test]
    async fn test_only_self_trade_available_no_match() {
        let buy = order(1, Side::Buy, PriceMode::Limit, "Widget", 20, 1);
        let own = order(1, Side::Sell, PriceMode::Limit, "Widget", 5, 2);
        let mut book = book_of(vec![buy, own]);
        let settler = RecordingSettler::default();

        let report = cross(&mut book, &prices(&[("Widget", 10)]), &settler).await;

        assert!(settler.calls().is_empty());
        assert_eq!(report.buys_remaining, 1);
        assert_eq!(report.sells_remaining, 1);
    }

    #[tokio::test]
    async fn test_limit_below_ask_no_match() {
        let buy = order(1, Side::Buy, PriceMode::Limit, "Gadget", 5, 1);
        let sell = order(2, Side::Sell, PriceMode::Limit, "Gadget", 6, 2);
        let mut book = book_of(vec![buy, sell]);
        let settler = RecordingSettler::default();

        let report = cross(&mut book, &prices(&[("Gadget", 6)]), &settler).await;

        assert!(report.trades.is_empty());
        assert_eq!(book.len(), 2);
    }

    #[tokio::test]
    async fn test_seller_matched_once_per_sweep() {
        let b1 = order(1, Side::Buy, PriceMode::Market, "Widget", 0, 1);
        let b2 = order(3, Side::Buy, PriceMode::Market, "Widget", 0, 2);
        let s1 = order(2, Side::Sell, PriceMode::Limit, "Widget", 8, 3);
        let mut book = book_of(vec![b1.clone(), b2.clone(), s1.clone()]);
        let settler = RecordingSettler::default();

        let report = cross(&mut book, &prices(&[("Widget", 10)]), &settler).await;

        assert_eq!(report.trades.len(), 1);
        assert_eq!(settler.calls().len(), 1);
        assert!(book.contains(&b2.order_id));
        assert!(book.check_invariants().is_ok());
    }

    #[tokio::test]
    async fn test_missing_price_skips_buyer() {
        let buy = order(1, Side::Buy, PriceMode::Market, "Gizmo", 0, 1);
        let sell = order(2, Side::Sell, PriceMode::Limit, "Gizmo", 1, 2);
        let mut book = book_of(vec![buy, sell]);
        let settler = RecordingSettler::default();

        let report = cross(&mut book, &prices(&[]), &settler).await;

        assert_eq!(report.skipped_buyers, 1);
        assert!(settler.calls().is_empty());
        assert_eq!(book.len(), 2);
    }

    #[tokio::test]
    async fn test_limit_orders_match_without_market_price() {
        let buy = order(1, Side::Buy, PriceMode::Limit, "Gizmo", 9, 1);
        let market_sell = order(2, Side::Sell, PriceMode::Market, "Gizmo", 0, 2);
        let sell = order(3, Side::Sell, PriceMode::Limit, "Gizmo", 7, 3);
        let mut book = book_of(vec![buy.clone(), market_sell.clone(), sell.clone()]);
        let settler = RecordingSettler::default();

        let report = cross(&mut book, &prices(&[]), &settler).await;

        assert_eq!(report.skipped_buyers, 0);
        assert_eq!(settler.calls(), vec![(buy.order_id, sell.order_id, Price::from_u64(7))]);
        assert!(book.contains(&market_sell.order_id));
    }

    #[tokio::test]
    async fn test_failed_settlement_moves_to_next_buyer() {
        let b1 = order(1, Side::Buy, PriceMode::Market, "Widget", 0, 1);
        let b2 = order(3, Side::Buy, PriceMode::Market, "Widget", 0, 2);
        let s1 = order(2, Side::Sell, PriceMode::Limit, "Widget", 8, 3);
        let mut book = book_of(vec![b1.clone(), b2.clone(), s1.clone()]);
        let settler = RecordingSettler {
            fail_sells: vec![s1.order_id.clone()],
            ..Default::default()
        };

        let report = cross(&mut book, &prices(&[("Widget", 10)]), &settler).await;

        // Both buyers tried the same seller; neither succeeded.
        assert_eq!(settler.calls().len(), 2);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(book.len(), 3);
    }

    #[tokio::test]
    async fn test_stale_order_removed_from_book() {
        let buy = order(1, Side::Buy, PriceMode::Market, "Widget", 0, 1);
        let sell = order(2, Side::Sell, PriceMode::Limit, "Widget", 8, 2);
        let mut book = book_of(vec![buy.clone(), sell.clone()]);
        let settler = RecordingSettler {
            stale_sells: vec![sell.order_id.clone()],
            ..Default::default()
        };

        let report = cross(&mut book, &prices(&[("Widget", 10)]), &settler).await;

        assert_eq!(report.stale, vec![sell.order_id.clone()]);
        assert!(!book.contains(&sell.order_id));
        assert!(book.contains(&buy.order_id));
    }

    #[test]
    fn test_buy_side_products_dedup() {
        let book = book_of(vec![
            order(1, Side::Buy, PriceMode::Market, "Widget", 0, 1),
            order(2, Side::Buy, PriceMode::Market, "Gadget", 0, 2),
            order(3, Side::Buy, PriceMode::Market, "Widget", 0, 3),
        ]);
        assert_eq!(
            buy_side_products(&book),
            vec![ProductName::new("Widget"), ProductName::new("Gadget")]
        );
    }
}
