use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::item::ItemId;

/// The distinct items of one completed purchase. Duplicate ids collapse at
/// construction, so a basket never produces a pair of an item with itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    items: BTreeSet<ItemId>,
}

impl Basket {
    pub fn new(items: impl IntoIterator<Item = ItemId>) -> Self {
        Self { items: items.into_iter().collect() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains(&id)
    }

    /// Item ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().copied()
    }

    /// Every unordered pair of distinct items, as `(a, b)` with `a < b`.
    /// Baskets of fewer than two items yield no pairs.
    pub fn pairs(&self) -> Vec<(ItemId, ItemId)> {
        let ids: Vec<ItemId> = self.items.iter().copied().collect();
        let mut pairs = Vec::with_capacity(ids.len() * ids.len().saturating_sub(1) / 2);
        for (index, &first) in ids.iter().enumerate() {
            for &second in &ids[index + 1..] {
                pairs.push((first, second));
            }
        }
        pairs
    }
}

impl FromIterator<ItemId> for Basket {
    fn from_iter<T: IntoIterator<Item = ItemId>>(iter: T) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::Basket;
    use crate::domain::item::ItemId;

    #[test]
    fn duplicate_ids_collapse_at_construction() {
        let basket = Basket::new([ItemId(3), ItemId(1), ItemId(3), ItemId(1)]);

        assert_eq!(basket.len(), 2);
        assert_eq!(basket.ids().collect::<Vec<_>>(), vec![ItemId(1), ItemId(3)]);
    }

    #[test]
    fn pairs_cover_every_unordered_combination() {
        let basket = Basket::new([ItemId(2), ItemId(1), ItemId(3)]);

        assert_eq!(
            basket.pairs(),
            vec![
                (ItemId(1), ItemId(2)),
                (ItemId(1), ItemId(3)),
                (ItemId(2), ItemId(3)),
            ]
        );
    }

    #[test]
    fn single_item_basket_yields_no_pairs() {
        let basket = Basket::new([ItemId(7)]);

        assert!(basket.pairs().is_empty());
        assert!(!basket.is_empty());
    }

    #[test]
    fn empty_basket_yields_no_pairs() {
        let basket = Basket::default();

        assert!(basket.pairs().is_empty());
        assert!(basket.is_empty());
    }
}
