use std::sync::Arc;

use crate::domain::basket::Basket;
use crate::errors::StoreError;
use crate::store::ScoreStore;

/// Write path of the association engine. Each completed purchase strengthens
/// the tie between every pair of distinct items in the basket, in both
/// directions, so a single row read later answers a query.
pub struct PurchaseLedger {
    store: Arc<dyn ScoreStore>,
}

impl PurchaseLedger {
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self { store }
    }

    /// Records one purchase. Baskets with fewer than two items have no pairs
    /// and are a successful no-op. A failed increment aborts the remaining
    /// writes of this basket; whatever already landed stays recorded.
    pub async fn record_purchase(&self, basket: &Basket) -> Result<(), StoreError> {
        for (first, second) in basket.pairs() {
            self.store.increment(first, second, 1).await?;
            self.store.increment(second, first, 1).await?;
        }
        Ok(())
    }

    /// Drops every recorded association. Idempotent; the catalog is
    /// untouched.
    pub async fn clear_history(&self) -> Result<(), StoreError> {
        self.store.clear().await
    }
}
