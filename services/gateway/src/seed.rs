//! Startup fixtures
//!
//! Registration is not part of this service, so wallets and products named
//! in the configuration are created at startup. Entries that already exist
//! in the ledger are left alone, which makes seeding safe on every restart.

use matching_engine::store::LedgerStore;
use risk_engine::validator::{ListingRequest, validate_listing};
use tracing::{debug, info};
use types::account::Wallet;
use types::ids::{ProductName, UserId};
use types::now_nanos;

use crate::settings::SeedSettings;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Seeded {
    pub wallets: usize,
    pub products: usize,
}

pub async fn apply(seed: &SeedSettings, ledger: &dyn LedgerStore) -> anyhow::Result<Seeded> {
    let mut seeded = Seeded::default();

    for w in &seed.wallets {
        let user = UserId::new(w.user_id);
        if ledger.wallet(user).await?.is_some() {
            debug!(user = %user, "Wallet already present");
            continue;
        }
        ledger
            .open_wallet(&Wallet::new(user, w.currency.trim().to_ascii_uppercase(), w.balance))
            .await?;
        seeded.wallets += 1;
    }

    for p in &seed.products {
        if let Some(name) = ProductName::try_new(p.product_name.trim()) {
            if ledger.product(&name).await?.is_some() {
                debug!(product = %name, "Product already listed");
                continue;
            }
        }
        let request = ListingRequest {
            product_name: p.product_name.clone(),
            product_count: p.product_count,
            currency: p.currency.clone(),
            base_amount: p.base_amount,
        };
        let mut product = validate_listing(&request, UserId::new(0), now_nanos())?;
        product.listed_by = None;
        ledger.list_product(&product).await?;
        seeded.products += 1;
    }

    info!(wallets = seeded.wallets, products = seeded.products, "Seed applied");
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{SeedProduct, SeedWallet};
    use matching_engine::store::memory::MemoryLedger;
    use rust_decimal::Decimal;

    fn seed() -> SeedSettings {
        SeedSettings {
            wallets: vec![SeedWallet {
                user_id: 1,
                currency: "usd".to_string(),
                balance: Decimal::from(100),
            }],
            products: vec![SeedProduct {
                product_name: "Widget".to_string(),
                product_count: 10,
                currency: "USD".to_string(),
                base_amount: Decimal::from(10),
            }],
        }
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let ledger = MemoryLedger::new();

        let first = apply(&seed(), &ledger).await.unwrap();
        assert_eq!(first, Seeded { wallets: 1, products: 1 });
        assert_eq!(ledger.wallet(UserId::new(1)).await.unwrap().unwrap().currency, "USD");

        let second = apply(&seed(), &ledger).await.unwrap();
        assert_eq!(second, Seeded::default());
    }
}
