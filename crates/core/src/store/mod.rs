pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::item::ItemId;
use crate::errors::StoreError;

pub use memory::MemoryScoreStore;

/// Accumulated count of co-purchase events between two items.
pub type Weight = u64;

/// One anchor's view of the association graph: every item it has been bought
/// together with, and how often. Keys are unique and never include the anchor
/// itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssociationRow {
    weights: HashMap<ItemId, Weight>,
}

impl AssociationRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row from `(id, weight)` entries, summing duplicates.
    pub fn from_entries(entries: impl IntoIterator<Item = (ItemId, Weight)>) -> Self {
        let mut row = Self::new();
        for (id, weight) in entries {
            row.add(id, weight);
        }
        row
    }

    /// Weight toward `id`, zero when no association has been recorded.
    pub fn weight_of(&self, id: ItemId) -> Weight {
        self.weights.get(&id).copied().unwrap_or(0)
    }

    /// Adds `delta` to the weight toward `id`. A zero delta creates no entry.
    pub fn add(&mut self, id: ItemId, delta: Weight) {
        if delta == 0 {
            return;
        }
        *self.weights.entry(id).or_insert(0) += delta;
    }

    /// Additive union: every entry of `other` is summed into this row.
    pub fn merge(&mut self, other: AssociationRow) {
        for (id, weight) in other.weights {
            self.add(id, weight);
        }
    }

    pub fn remove(&mut self, id: ItemId) -> Option<Weight> {
        self.weights.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, Weight)> + '_ {
        self.weights.iter().map(|(&id, &weight)| (id, weight))
    }

    /// Entries ordered by weight descending, ties broken by ascending item id.
    /// The order is total, so equal snapshots always rank identically.
    pub fn ranked(&self) -> Vec<(ItemId, Weight)> {
        let mut entries: Vec<(ItemId, Weight)> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

/// Persistent co-purchase weights keyed by anchor item.
///
/// Rows come into existence on first write and disappear only through
/// [`ScoreStore::clear`]. Single-key increments are atomic; a batch of
/// increments is not, so readers may observe a partially applied purchase.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Adds `delta` to the weight between `anchor` and `associated`.
    /// Rejects `anchor == associated`; a zero delta performs no write.
    async fn increment(
        &self,
        anchor: ItemId,
        associated: ItemId,
        delta: Weight,
    ) -> Result<(), StoreError>;

    /// The anchor's full row. An anchor that was never written yields an
    /// empty row, not an error.
    async fn row(&self, anchor: ItemId) -> Result<AssociationRow, StoreError>;

    /// Merged row across several anchors, each associated item's weight
    /// summed over all of the anchors' rows. Duplicate anchors count once.
    async fn union_row(&self, anchors: &[ItemId]) -> Result<AssociationRow, StoreError>;

    /// Removes every row. Increments never interleave with a clear key by
    /// key; they land entirely before or entirely after it.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Guard shared by store implementations: self-pairs are rejected before any
/// write happens.
pub fn ensure_distinct(anchor: ItemId, associated: ItemId) -> Result<(), StoreError> {
    if anchor == associated {
        return Err(StoreError::SelfAssociation(anchor));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::AssociationRow;
    use crate::domain::item::ItemId;

    #[test]
    fn add_accumulates_and_zero_delta_creates_no_entry() {
        let mut row = AssociationRow::new();
        row.add(ItemId(2), 1);
        row.add(ItemId(2), 3);
        row.add(ItemId(9), 0);

        assert_eq!(row.weight_of(ItemId(2)), 4);
        assert_eq!(row.weight_of(ItemId(9)), 0);
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn from_entries_sums_duplicate_ids() {
        let row = AssociationRow::from_entries([(ItemId(1), 2), (ItemId(1), 5), (ItemId(3), 1)]);

        assert_eq!(row.weight_of(ItemId(1)), 7);
        assert_eq!(row.weight_of(ItemId(3)), 1);
    }

    #[test]
    fn merge_sums_weights_for_shared_keys() {
        let mut left = AssociationRow::from_entries([(ItemId(1), 2), (ItemId(2), 1)]);
        let right = AssociationRow::from_entries([(ItemId(2), 4), (ItemId(3), 1)]);

        left.merge(right);

        assert_eq!(left.weight_of(ItemId(1)), 2);
        assert_eq!(left.weight_of(ItemId(2)), 5);
        assert_eq!(left.weight_of(ItemId(3)), 1);
    }

    #[test]
    fn ranked_orders_by_weight_descending_then_id_ascending() {
        let row = AssociationRow::from_entries([
            (ItemId(5), 2),
            (ItemId(3), 7),
            (ItemId(8), 2),
            (ItemId(1), 2),
        ]);

        assert_eq!(
            row.ranked(),
            vec![(ItemId(3), 7), (ItemId(1), 2), (ItemId(5), 2), (ItemId(8), 2)]
        );
    }

    #[test]
    fn remove_returns_the_dropped_weight() {
        let mut row = AssociationRow::from_entries([(ItemId(4), 6)]);

        assert_eq!(row.remove(ItemId(4)), Some(6));
        assert_eq!(row.remove(ItemId(4)), None);
        assert!(row.is_empty());
    }
}
