//! Market price service
//!
//! Reads and publishes per-product prices through the [`MarketPriceCache`]
//! port. A product with no cache entry is seeded from its ledger listing the
//! first time its price is read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use types::ids::ProductName;
use types::market::{MarketPrice, ProductQuote};
use types::numeric::Price;

use crate::errors::{CacheError, EngineError};
use crate::io::bounded;
use crate::store::{LedgerStore, MarketPriceCache};

/// Price source injected into the engine and the intake
#[derive(Clone)]
pub struct MarketPrices {
    cache: Arc<dyn MarketPriceCache>,
    ledger: Arc<dyn LedgerStore>,
    io_timeout: Duration,
}

impl MarketPrices {
    pub fn new(cache: Arc<dyn MarketPriceCache>, ledger: Arc<dyn LedgerStore>, io_timeout: Duration) -> Self {
        Self {
            cache,
            ledger,
            io_timeout,
        }
    }

    /// Current price of one product, `None` if it is not listed
    pub async fn current(&self, product: &ProductName) -> Result<Option<MarketPrice>, EngineError> {
        let mut prices = self.current_many(std::slice::from_ref(product)).await?;
        Ok(prices.remove(product))
    }

    /// Batch read, seeding missing entries from the listings
    ///
    /// Products that are neither cached nor listed are absent from the result.
    /// An undecodable entry is treated as missing and re-seeded.
    pub async fn current_many(
        &self,
        products: &[ProductName],
    ) -> Result<HashMap<ProductName, MarketPrice>, EngineError> {
        let mut prices = match bounded(self.io_timeout, "prices.get_many", self.cache.get_many(products)).await {
            Ok(prices) => prices,
            Err(EngineError::Cache(CacheError::Corrupt { key, .. })) => {
                warn!(key = %key, "Corrupt market price entry, reading products one at a time");
                self.read_each(products).await?
            }
            Err(e) => return Err(e),
        };

        for product in products {
            if prices.contains_key(product) {
                continue;
            }
            if let Some(seeded) = self.seed(product).await? {
                prices.insert(product.clone(), seeded);
            }
        }
        Ok(prices)
    }

    async fn read_each(&self, products: &[ProductName]) -> Result<HashMap<ProductName, MarketPrice>, EngineError> {
        let mut prices = HashMap::with_capacity(products.len());
        for product in products {
            let read = self.cache.get_many(std::slice::from_ref(product));
            match bounded(self.io_timeout, "prices.get_many", read).await {
                Ok(found) => prices.extend(found),
                Err(EngineError::Cache(CacheError::Corrupt { reason, .. })) => {
                    warn!(product = %product, reason = %reason, "Discarding corrupt market price entry");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(prices)
    }

    async fn seed(&self, product: &ProductName) -> Result<Option<MarketPrice>, EngineError> {
        let listing = bounded(self.io_timeout, "ledger.product", self.ledger.product(product)).await?;
        let Some(listing) = listing else {
            return Ok(None);
        };

        let seeded = listing.seed_price();
        match bounded(self.io_timeout, "prices.set", self.cache.set(product, &seeded)).await {
            Ok(()) => debug!(product = %product, price = %seeded.last_price, "Seeded market price"),
            // The listing is still the right answer; the cache will be seeded next read.
            Err(e) => warn!(product = %product, error = %e, "Failed to seed market price"),
        }
        Ok(Some(seeded))
    }

    /// Publish a new last traded price for `product`
    ///
    /// The listing fields come from the current entry, or from the ledger
    /// listing if the entry cannot be read.
    pub async fn publish(&self, product: &ProductName, last_price: Price) -> Result<(), EngineError> {
        let current = match self.current(product).await {
            Ok(current) => current,
            Err(e) => {
                warn!(product = %product, error = %e, "Market price unreadable, publishing from listing");
                bounded(self.io_timeout, "ledger.product", self.ledger.product(product))
                    .await?
                    .map(|listing| listing.seed_price())
            }
        };
        let updated = match current {
            Some(entry) => entry.with_last_price(last_price),
            None => MarketPrice {
                quantity_listed: 0,
                currency: String::new(),
                last_price,
            },
        };
        bounded(self.io_timeout, "prices.set", self.cache.set(product, &updated)).await
    }

    /// Every listed product with its base and current price
    pub async fn quotes(&self) -> Result<Vec<ProductQuote>, EngineError> {
        let listings = bounded(self.io_timeout, "ledger.products", self.ledger.products()).await?;
        let names: Vec<ProductName> = listings.iter().map(|p| p.name.clone()).collect();
        let prices = self.current_many(&names).await?;

        Ok(listings
            .into_iter()
            .map(|listing| {
                let now_amount = prices
                    .get(&listing.name)
                    .map(|p| p.last_price)
                    .unwrap_or(listing.base_price);
                ProductQuote {
                    product_name: listing.name,
                    product_count: listing.quantity_listed,
                    currency: listing.currency,
                    base_amount: listing.base_price,
                    now_amount,
                }
            })
            .collect())
    }
}
