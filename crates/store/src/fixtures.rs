use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use tandem_core::{
    Basket, EngineError, Item, ItemId, PurchaseLedger, ScoreStore, StoreError,
};

use crate::catalog::SqlCatalog;
use crate::connection::DbPool;
use crate::scores::SqlScoreStore;

/// Canonical demo catalog: a small coffee-gear shop with deterministic ids.
const SEED_ITEMS: &[SeedItem] = &[
    SeedItem {
        id: 1,
        name: "Espresso Cup",
        slug: "espresso-cup",
        price: "6.50",
        available: true,
        label: "item-espresso-cup",
    },
    SeedItem {
        id: 2,
        name: "Moka Pot",
        slug: "moka-pot",
        price: "24.00",
        available: true,
        label: "item-moka-pot",
    },
    SeedItem {
        id: 3,
        name: "Burr Grinder",
        slug: "burr-grinder",
        price: "39.90",
        available: true,
        label: "item-burr-grinder",
    },
    SeedItem {
        id: 4,
        name: "Milk Frother",
        slug: "milk-frother",
        price: "14.25",
        available: true,
        label: "item-milk-frother",
    },
    SeedItem {
        id: 5,
        name: "Digital Scale",
        slug: "digital-scale",
        price: "18.75",
        available: false,
        label: "item-digital-scale",
    },
];

/// Purchases replayed on load, in order. Every id must exist in
/// `SEED_ITEMS`.
const SEED_BASKETS: &[&[u64]] = &[&[1, 2, 3], &[1, 2], &[2, 3], &[2, 4], &[3, 4, 5], &[1, 5]];

/// Directed weights the basket replay must produce, spot-checked by
/// `verify`.
const EXPECTED_WEIGHTS: &[ExpectedWeight] = &[
    ExpectedWeight { label: "weight-cup-pot", anchor: 1, associated: 2, weight: 2 },
    ExpectedWeight { label: "weight-pot-cup", anchor: 2, associated: 1, weight: 2 },
    ExpectedWeight { label: "weight-pot-grinder", anchor: 2, associated: 3, weight: 2 },
    ExpectedWeight { label: "weight-grinder-scale", anchor: 3, associated: 5, weight: 1 },
    ExpectedWeight { label: "weight-frother-scale", anchor: 4, associated: 5, weight: 1 },
];

/// Eight unordered co-purchase pairs occur across `SEED_BASKETS`, each
/// stored in both directions.
const EXPECTED_ASSOCIATION_ROWS: i64 = 16;

/// Deterministic demo dataset for local runs and end-to-end tests.
///
/// `load` is idempotent: catalog rows are upserted and the association
/// table is cleared before the baskets are replayed, so repeated loads
/// always converge on the same weights.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// Seeds the catalog and replays the demo baskets through the ledger.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, EngineError> {
        let catalog = SqlCatalog::new(pool.clone());
        for seed in SEED_ITEMS {
            catalog.save_item(&seed.item()).await?;
        }

        let store = Arc::new(SqlScoreStore::new(pool.clone()));
        store.clear().await?;

        let ledger = PurchaseLedger::new(store);
        for basket in SEED_BASKETS {
            let basket = Basket::new(basket.iter().copied().map(ItemId));
            ledger.record_purchase(&basket).await?;
        }

        Ok(SeedResult {
            items_seeded: SEED_ITEMS.len(),
            baskets_replayed: SEED_BASKETS.len(),
        })
    }

    /// Verifies that the loaded dataset matches the contract above.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, EngineError> {
        let mut checks = Vec::new();

        let catalog_count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM catalog_items")
            .fetch_one(pool)
            .await
            .map_err(seed_unavailable)?;
        checks.push(("catalog-count", catalog_count == SEED_ITEMS.len() as i64));

        for seed in SEED_ITEMS {
            let item_matches: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                     SELECT 1 FROM catalog_items
                     WHERE id = ?1 AND name = ?2 AND slug = ?3 AND price = ?4 AND available = ?5
                 )",
            )
            .bind(seed.id as i64)
            .bind(seed.name)
            .bind(seed.slug)
            .bind(seed.price)
            .bind(seed.available)
            .fetch_one(pool)
            .await
            .map_err(seed_unavailable)?;
            checks.push((seed.label, item_matches == 1));
        }

        let association_rows: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM item_associations")
            .fetch_one(pool)
            .await
            .map_err(seed_unavailable)?;
        checks.push(("association-rows", association_rows == EXPECTED_ASSOCIATION_ROWS));

        for expected in EXPECTED_WEIGHTS {
            let weight_matches: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                     SELECT 1 FROM item_associations
                     WHERE anchor_id = ?1 AND associated_id = ?2 AND weight = ?3
                 )",
            )
            .bind(expected.anchor as i64)
            .bind(expected.associated as i64)
            .bind(expected.weight)
            .fetch_one(pool)
            .await
            .map_err(seed_unavailable)?;
            checks.push((expected.label, weight_matches == 1));
        }

        let top_for_moka_pot: Option<i64> = sqlx::query_scalar(
            "SELECT associated_id FROM item_associations
             WHERE anchor_id = 2
             ORDER BY weight DESC, associated_id ASC
             LIMIT 1",
        )
        .fetch_optional(pool)
        .await
        .map_err(seed_unavailable)?;
        checks.push(("top-for-moka-pot", top_for_moka_pot == Some(1)));

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo rows from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), EngineError> {
        let seed_ids = sql_array_from_ids(SEED_ITEMS.iter().map(|seed| seed.id));
        let mut tx = pool.begin().await.map_err(seed_unavailable)?;

        sqlx::query(&format!(
            "DELETE FROM item_associations
             WHERE anchor_id IN {seed_ids} OR associated_id IN {seed_ids}"
        ))
        .execute(&mut *tx)
        .await
        .map_err(seed_unavailable)?;
        sqlx::query(&format!("DELETE FROM catalog_items WHERE id IN {seed_ids}"))
            .execute(&mut *tx)
            .await
            .map_err(seed_unavailable)?;

        tx.commit().await.map_err(seed_unavailable)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedItem {
    id: u64,
    name: &'static str,
    slug: &'static str,
    price: &'static str,
    available: bool,
    label: &'static str,
}

impl SeedItem {
    fn item(&self) -> Item {
        Item {
            id: ItemId(self.id),
            name: self.name.to_string(),
            slug: self.slug.to_string(),
            price: Decimal::from_str(self.price).unwrap_or_default(),
            available: self.available,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ExpectedWeight {
    label: &'static str,
    anchor: u64,
    associated: u64,
    weight: i64,
}

fn seed_unavailable(error: sqlx::Error) -> EngineError {
    EngineError::Store(StoreError::Unavailable(error.to_string()))
}

fn sql_array_from_ids(ids: impl Iterator<Item = u64>) -> String {
    let joined = ids.map(|id| id.to_string()).collect::<Vec<_>>().join(",");
    format!("({joined})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub items_seeded: usize,
    pub baskets_replayed: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
