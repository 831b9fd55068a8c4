use std::collections::{BTreeSet, HashMap};

use tokio::sync::RwLock;

use crate::domain::item::ItemId;
use crate::errors::StoreError;
use crate::store::{ensure_distinct, AssociationRow, ScoreStore, Weight};

/// Process-local score store over a map-of-maps guarded by a read-write
/// lock. Increments take the write lock for one key update; `clear` holds
/// it for the whole wipe, so no increment lands mid-clear.
#[derive(Default)]
pub struct MemoryScoreStore {
    rows: RwLock<HashMap<ItemId, HashMap<ItemId, Weight>>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn increment(
        &self,
        anchor: ItemId,
        associated: ItemId,
        delta: Weight,
    ) -> Result<(), StoreError> {
        ensure_distinct(anchor, associated)?;
        if delta == 0 {
            return Ok(());
        }

        let mut rows = self.rows.write().await;
        *rows.entry(anchor).or_default().entry(associated).or_insert(0) += delta;
        Ok(())
    }

    async fn row(&self, anchor: ItemId) -> Result<AssociationRow, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(&anchor)
            .map(|weights| {
                AssociationRow::from_entries(weights.iter().map(|(&id, &weight)| (id, weight)))
            })
            .unwrap_or_default())
    }

    async fn union_row(&self, anchors: &[ItemId]) -> Result<AssociationRow, StoreError> {
        let distinct: BTreeSet<ItemId> = anchors.iter().copied().collect();
        let rows = self.rows.read().await;

        let mut merged = AssociationRow::new();
        for anchor in distinct {
            if let Some(weights) = rows.get(&anchor) {
                for (&id, &weight) in weights {
                    merged.add(id, weight);
                }
            }
        }
        Ok(merged)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        rows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryScoreStore;
    use crate::domain::item::ItemId;
    use crate::errors::StoreError;
    use crate::store::ScoreStore;

    #[tokio::test]
    async fn increment_rejects_self_association() {
        let store = MemoryScoreStore::new();

        let result = store.increment(ItemId(1), ItemId(1), 1).await;

        assert_eq!(result, Err(StoreError::SelfAssociation(ItemId(1))));
    }

    #[tokio::test]
    async fn increments_accumulate_per_key() {
        let store = MemoryScoreStore::new();

        store.increment(ItemId(1), ItemId(2), 1).await.expect("first increment");
        store.increment(ItemId(1), ItemId(2), 2).await.expect("second increment");
        store.increment(ItemId(1), ItemId(3), 1).await.expect("third increment");

        let row = store.row(ItemId(1)).await.expect("row");
        assert_eq!(row.weight_of(ItemId(2)), 3);
        assert_eq!(row.weight_of(ItemId(3)), 1);
    }

    #[tokio::test]
    async fn unwritten_anchor_yields_empty_row() {
        let store = MemoryScoreStore::new();

        let row = store.row(ItemId(42)).await.expect("row");

        assert!(row.is_empty());
    }

    #[tokio::test]
    async fn union_row_sums_weights_across_anchors() {
        let store = MemoryScoreStore::new();
        store.increment(ItemId(1), ItemId(3), 2).await.expect("write");
        store.increment(ItemId(2), ItemId(3), 5).await.expect("write");
        store.increment(ItemId(2), ItemId(4), 1).await.expect("write");

        let union = store.union_row(&[ItemId(1), ItemId(2)]).await.expect("union");

        assert_eq!(union.weight_of(ItemId(3)), 7);
        assert_eq!(union.weight_of(ItemId(4)), 1);
    }

    #[tokio::test]
    async fn union_row_counts_duplicate_anchors_once() {
        let store = MemoryScoreStore::new();
        store.increment(ItemId(1), ItemId(2), 3).await.expect("write");

        let union = store.union_row(&[ItemId(1), ItemId(1)]).await.expect("union");

        assert_eq!(union.weight_of(ItemId(2)), 3);
    }

    #[tokio::test]
    async fn clear_removes_every_row() {
        let store = MemoryScoreStore::new();
        store.increment(ItemId(1), ItemId(2), 1).await.expect("write");
        store.increment(ItemId(2), ItemId(1), 1).await.expect("write");

        store.clear().await.expect("clear");

        assert!(store.row(ItemId(1)).await.expect("row").is_empty());
        assert!(store.row(ItemId(2)).await.expect("row").is_empty());
    }

    #[tokio::test]
    async fn concurrent_increments_on_one_key_lose_no_updates() {
        use std::sync::Arc;

        let store = Arc::new(MemoryScoreStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for _ in 0..25 {
                    store.increment(ItemId(1), ItemId(2), 1).await.expect("increment");
                }
            }));
        }
        for handle in handles {
            handle.await.expect("task");
        }

        let row = store.row(ItemId(1)).await.expect("row");
        assert_eq!(row.weight_of(ItemId(2)), 400);
    }
}
