use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::item::{Item, ItemId};
use crate::errors::CatalogError;

/// Read access to the item catalog. The association engine treats the
/// catalog as an external system of record: ids it cannot resolve are
/// silently dropped from results, never surfaced as failures.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolves the given ids to catalog records. Unknown ids are simply
    /// absent from the returned map; callers re-impose their own ordering.
    async fn resolve_ids(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, Item>, CatalogError>;

    /// Every id the catalog knows, ascending.
    async fn all_known_ids(&self) -> Result<Vec<ItemId>, CatalogError>;
}

#[derive(Default)]
pub struct MemoryCatalog {
    items: RwLock<HashMap<ItemId, Item>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, item: Item) {
        let mut items = self.items.write().await;
        items.insert(item.id, item);
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn resolve_ids(&self, ids: &[ItemId]) -> Result<HashMap<ItemId, Item>, CatalogError> {
        let items = self.items.read().await;
        Ok(ids.iter().filter_map(|id| items.get(id).map(|item| (*id, item.clone()))).collect())
    }

    async fn all_known_ids(&self) -> Result<Vec<ItemId>, CatalogError> {
        let items = self.items.read().await;
        let mut ids: Vec<ItemId> = items.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
