use indexmap::IndexMap;

use crate::entity_store::EntityStore;
use crate::model::{Entity, Tracked};
use crate::outbox::Outbox;

/// Merge confirmed entities with everything still in the outbox.
///
/// Confirmed entities come first, marked not pending. Outbox entries are laid
/// over them by id (last writer wins, first-seen position kept), marked
/// pending. An entity whose deletion is in flight is still listed.
pub fn project<T: Entity>(store: &EntityStore<T>, outbox: &Outbox<T>) -> Vec<Tracked<T>> {
    let mut merged: IndexMap<String, Tracked<T>> =
        IndexMap::with_capacity(store.len() + outbox.len());

    for entity in store.iter() {
        merged.insert(entity.id().to_string(), Tracked::confirmed(entity.clone()));
    }
    for tracked in outbox.pending_entries() {
        merged.insert(tracked.entity.id().to_string(), tracked);
    }

    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewProduct, Product, TempId};
    use proptest::prelude::*;

    fn store_with(products: &[Product]) -> EntityStore<Product> {
        let mut store = EntityStore::new();
        store.replace_all(products.iter().cloned());
        store
    }

    #[test]
    fn confirmed_entities_are_not_pending() {
        let store = store_with(&[Product::new("1", "X", 10.0)]);
        let list = project(&store, &Outbox::new());
        assert_eq!(list, vec![Tracked::confirmed(Product::new("1", "X", 10.0))]);
    }

    #[test]
    fn update_overlays_in_place() {
        let store = store_with(&[Product::new("1", "X", 10.0), Product::new("2", "Y", 1.0)]);
        let mut outbox = Outbox::new();
        outbox.add_update(Product::new("1", "X", 20.0));

        let list = project(&store, &outbox);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], Tracked::pending(Product::new("1", "X", 20.0)));
        assert_eq!(list[1], Tracked::confirmed(Product::new("2", "Y", 1.0)));
    }

    #[test]
    fn additions_append_and_deletions_stay_visible() {
        let store = store_with(&[Product::new("1", "X", 10.0)]);
        let mut outbox = Outbox::new();
        outbox.add_addition(TempId::new("tmp-a"), NewProduct::new("Y", 5.0));
        outbox.add_deletion(Product::new("1", "X", 10.0));

        let list = project(&store, &outbox);
        assert_eq!(
            list,
            vec![
                Tracked::pending(Product::new("1", "X", 10.0)),
                Tracked::pending(Product::new("tmp-a", "Y", 5.0)),
            ]
        );
    }

    #[test]
    fn update_wins_over_deletion_for_same_id() {
        let store = store_with(&[Product::new("1", "X", 10.0)]);
        let mut outbox = Outbox::new();
        outbox.add_deletion(Product::new("1", "X", 10.0));
        outbox.add_update(Product::new("1", "X", 20.0));

        let list = project(&store, &outbox);
        assert_eq!(list, vec![Tracked::pending(Product::new("1", "X", 20.0))]);
    }

    proptest! {
        #[test]
        fn projection_is_repeatable(
            confirmed in prop::collection::vec((0u8..20, 0u32..500), 0..15),
            updates in prop::collection::vec((0u8..20, 0u32..500), 0..10),
            deletions in prop::collection::vec(0u8..20, 0..5),
        ) {
            let store = store_with(
                &confirmed
                    .iter()
                    .map(|(id, price)| Product::new(id.to_string(), "P", f64::from(*price)))
                    .collect::<Vec<_>>(),
            );
            let mut outbox = Outbox::new();
            for (id, price) in &updates {
                outbox.add_update(Product::new(id.to_string(), "P", f64::from(*price)));
            }
            for id in &deletions {
                outbox.add_deletion(Product::new(id.to_string(), "P", 0.0));
            }

            let first = project(&store, &outbox);
            let second = project(&store, &outbox);
            prop_assert_eq!(&first, &second);

            // One row per distinct id.
            let mut ids: Vec<_> = first.iter().map(|t| t.entity.id.clone()).collect();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), first.len());
        }
    }
}
