use async_trait::async_trait;
use sqlx::Row;

use tandem_core::store::ensure_distinct;
use tandem_core::{AssociationRow, ItemId, ScoreStore, StoreError, Weight};

use crate::{from_db_id, to_db_id, DbPool};

/// SQLite-backed score store. Each directed `(anchor, associated)` pair is
/// one row in `item_associations`; increments are single upsert statements,
/// so per-pair writes are atomic under concurrent load.
pub struct SqlScoreStore {
    pool: DbPool,
}

impl SqlScoreStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn unavailable(error: sqlx::Error) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

#[async_trait]
impl ScoreStore for SqlScoreStore {
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

        sqlx::query(
            "INSERT INTO item_associations (anchor_id, associated_id, weight)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(anchor_id, associated_id)
             DO UPDATE SET weight = weight + excluded.weight",
        )
        .bind(to_db_id(anchor))
        .bind(to_db_id(associated))
        .bind(delta as i64)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }

    async fn row(&self, anchor: ItemId) -> Result<AssociationRow, StoreError> {
        let rows = sqlx::query(
            "SELECT associated_id, weight FROM item_associations WHERE anchor_id = ?1",
        )
        .bind(to_db_id(anchor))
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let associated_id: i64 = row.try_get("associated_id").map_err(unavailable)?;
            let weight: i64 = row.try_get("weight").map_err(unavailable)?;
            entries.push((from_db_id(associated_id), weight as Weight));
        }
        Ok(AssociationRow::from_entries(entries))
    }

    async fn union_row(&self, anchors: &[ItemId]) -> Result<AssociationRow, StoreError> {
        if anchors.is_empty() {
            return Ok(AssociationRow::new());
        }

        // Duplicate anchors collapse naturally: IN is a membership test, so
        // each stored row contributes to the sum exactly once.
        let placeholders = vec!["?"; anchors.len()].join(", ");
        let sql = format!(
            "SELECT associated_id, SUM(weight) AS weight
             FROM item_associations
             WHERE anchor_id IN ({placeholders})
             GROUP BY associated_id"
        );

        let mut query = sqlx::query(&sql);
        for anchor in anchors {
            query = query.bind(to_db_id(*anchor));
        }
        let rows = query.fetch_all(&self.pool).await.map_err(unavailable)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let associated_id: i64 = row.try_get("associated_id").map_err(unavailable)?;
            let weight: i64 = row.try_get("weight").map_err(unavailable)?;
            entries.push((from_db_id(associated_id), weight as Weight));
        }
        Ok(AssociationRow::from_entries(entries))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM item_associations")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tandem_core::{AssociationRow, ItemId, MemoryScoreStore, ScoreStore, StoreError};

    use super::SqlScoreStore;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[tokio::test]
    async fn increment_creates_then_accumulates_weight() {
        let store = SqlScoreStore::new(setup().await);

        store.increment(ItemId(1), ItemId(2), 1).await.expect("first increment");
        store.increment(ItemId(1), ItemId(2), 3).await.expect("second increment");

        let row = store.row(ItemId(1)).await.expect("read row");
        assert_eq!(row.weight_of(ItemId(2)), 4);
        assert_eq!(row.len(), 1);
    }

    #[tokio::test]
    async fn self_association_is_rejected_before_any_write() {
        let store = SqlScoreStore::new(setup().await);

        let result = store.increment(ItemId(5), ItemId(5), 1).await;
        assert_eq!(result, Err(StoreError::SelfAssociation(ItemId(5))));

        let row = store.row(ItemId(5)).await.expect("read row");
        assert!(row.is_empty());
    }

    #[tokio::test]
    async fn zero_delta_performs_no_write() {
        let store = SqlScoreStore::new(setup().await);

        store.increment(ItemId(1), ItemId(2), 0).await.expect("zero increment");

        let row = store.row(ItemId(1)).await.expect("read row");
        assert!(row.is_empty());
    }

    #[tokio::test]
    async fn row_is_empty_for_unknown_anchor() {
        let store = SqlScoreStore::new(setup().await);

        let row = store.row(ItemId(404)).await.expect("read row");
        assert!(row.is_empty());
    }

    #[tokio::test]
    async fn union_row_sums_weights_and_counts_duplicate_anchors_once() {
        let store = SqlScoreStore::new(setup().await);
        store.increment(ItemId(1), ItemId(3), 2).await.expect("increment");
        store.increment(ItemId(2), ItemId(3), 5).await.expect("increment");
        store.increment(ItemId(2), ItemId(4), 1).await.expect("increment");

        let merged = store
            .union_row(&[ItemId(1), ItemId(2), ItemId(1)])
            .await
            .expect("union rows");

        assert_eq!(merged.weight_of(ItemId(3)), 7);
        assert_eq!(merged.weight_of(ItemId(4)), 1);
    }

    #[tokio::test]
    async fn union_row_of_no_anchors_is_empty() {
        let store = SqlScoreStore::new(setup().await);
        store.increment(ItemId(1), ItemId(2), 1).await.expect("increment");

        let merged = store.union_row(&[]).await.expect("union rows");
        assert!(merged.is_empty());
    }

    #[tokio::test]
    async fn clear_removes_every_row() {
        let store = SqlScoreStore::new(setup().await);
        store.increment(ItemId(1), ItemId(2), 1).await.expect("increment");
        store.increment(ItemId(3), ItemId(4), 2).await.expect("increment");

        store.clear().await.expect("clear");

        assert!(store.row(ItemId(1)).await.expect("read row").is_empty());
        assert!(store.row(ItemId(3)).await.expect("read row").is_empty());
    }

    #[tokio::test]
    async fn behaves_like_the_memory_store_for_the_same_writes() {
        let sql_store = SqlScoreStore::new(setup().await);
        let memory_store = MemoryScoreStore::new();
        let writes =
            [(1u64, 2u64, 1u64), (2, 1, 1), (1, 3, 2), (3, 1, 2), (2, 3, 4), (3, 2, 4), (1, 2, 1)];

        for (anchor, associated, delta) in writes {
            sql_store
                .increment(ItemId(anchor), ItemId(associated), delta)
                .await
                .expect("sql increment");
            memory_store
                .increment(ItemId(anchor), ItemId(associated), delta)
                .await
                .expect("memory increment");
        }

        for anchor in [1u64, 2, 3, 4] {
            let sql_row = sql_store.row(ItemId(anchor)).await.expect("sql row");
            let memory_row = memory_store.row(ItemId(anchor)).await.expect("memory row");
            assert_eq!(sql_row, memory_row, "row mismatch for anchor {anchor}");
        }

        let anchors = [ItemId(1), ItemId(2)];
        let sql_union = sql_store.union_row(&anchors).await.expect("sql union");
        let memory_union = memory_store.union_row(&anchors).await.expect("memory union");
        assert_eq!(sql_union, memory_union);
        assert_ne!(sql_union, AssociationRow::new());
    }
}
