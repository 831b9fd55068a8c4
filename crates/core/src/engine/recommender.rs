use std::collections::BTreeSet;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::domain::item::{Item, ItemId};
use crate::errors::EngineError;
use crate::store::{ScoreStore, Weight};

/// Read path of the association engine: turns one or more seed items into a
/// ranked list of "customers who bought these also bought" candidates.
///
/// Ranking is by accumulated weight descending, with ascending item id
/// breaking ties, so a given store state always yields the same order.
pub struct Recommender {
    store: Arc<dyn ScoreStore>,
    catalog: Arc<dyn Catalog>,
}

impl Recommender {
    pub fn new(store: Arc<dyn ScoreStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self { store, catalog }
    }

    /// Ranked `(id, weight)` candidates for the given seeds, seeds excluded,
    /// truncated to `max_results`. One seed reads its own row; several seeds
    /// read the additive union of their rows. Seeds with no recorded
    /// associations reduce the result instead of failing; empty seeds or a
    /// zero limit yield an empty result.
    pub async fn recommend_ids(
        &self,
        seeds: &[ItemId],
        max_results: usize,
    ) -> Result<Vec<(ItemId, Weight)>, EngineError> {
        let distinct: BTreeSet<ItemId> = seeds.iter().copied().collect();
        if distinct.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let anchors: Vec<ItemId> = distinct.into_iter().collect();
        let mut candidates = if let [seed] = anchors.as_slice() {
            self.store.row(*seed).await?
        } else {
            self.store.union_row(&anchors).await?
        };

        for seed in &anchors {
            candidates.remove(*seed);
        }

        let mut ranked = candidates.ranked();
        ranked.truncate(max_results);
        Ok(ranked)
    }

    /// Like [`Recommender::recommend_ids`], resolved to catalog records in
    /// rank order. Ids the catalog does not know are dropped from the result,
    /// which may leave it shorter than `max_results`.
    pub async fn recommend(
        &self,
        seeds: &[ItemId],
        max_results: usize,
    ) -> Result<Vec<Item>, EngineError> {
        let ranked = self.recommend_ids(seeds, max_results).await?;
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ItemId> = ranked.iter().map(|&(id, _)| id).collect();
        let mut resolved = self.catalog.resolve_ids(&ids).await?;
        Ok(ids.into_iter().filter_map(|id| resolved.remove(&id)).collect())
    }
}
