use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Row;

use tandem_core::{Catalog, CatalogError, Item, ItemId};

use crate::{from_db_id, to_db_id, DbPool};

/// SQLite-backed catalog. Prices are stored as decimal strings because
/// SQLite has no exact numeric type; they are parsed back on read.
pub struct SqlCatalog {
    pool: DbPool,
}

impl SqlCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Inserts the item, or overwrites every field when the id already
    /// exists. Used by seeding and admin tooling.
    pub async fn save_item(&self, item: &Item) -> Result<(), CatalogError> {
        sqlx::query(
            "INSERT INTO catalog_items (id, name, slug, price, available)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 slug = excluded.slug,
                 price = excluded.price,
                 available = excluded.available",
        )
        .bind(to_db_id(item.id))
        .bind(&item.name)
        .bind(&item.slug)
        .bind(item.price.to_string())
        .bind(item.available)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }
}

fn unavailable(error: sqlx::Error) -> CatalogError {
    CatalogError::Unavailable(error.to_string())
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<Item, CatalogError> {
    let id: i64 = row.try_get("id").map_err(unavailable)?;
    let name: String = row.try_get("name").map_err(unavailable)?;
    let slug: String = row.try_get("slug").map_err(unavailable)?;
    let price_raw: String = row.try_get("price").map_err(unavailable)?;
    let available: bool = row.try_get("available").map_err(unavailable)?;

    let price = Decimal::from_str(&price_raw).map_err(|error| {
        CatalogError::Unavailable(format!("invalid price for item {id}: {error}"))
    })?;

    Ok(Item { id: from_db_id(id), name, slug, price, available })
}

#[async_trait]
impl Catalog for SqlCatalog {
    async fn resolve_ids(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, Item>, CatalogError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, slug, price, available
             FROM catalog_items
             WHERE id IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(to_db_id(*id));
        }
        let rows = query.fetch_all(&self.pool).await.map_err(unavailable)?;

        let mut items = HashMap::with_capacity(rows.len());
        for row in &rows {
            let item = row_to_item(row)?;
            items.insert(item.id, item);
        }
        Ok(items)
    }

    async fn all_known_ids(&self) -> Result<Vec<ItemId>, CatalogError> {
        let rows = sqlx::query("SELECT id FROM catalog_items")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(unavailable)?;
            ids.push(from_db_id(id));
        }
        // Ids above `i64::MAX` are stored as negative values, so ascending
        // order is restored after mapping out of db form, not in SQL.
        ids.sort_unstable();
        Ok(ids)
    }
}
