use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::model::Entity;

/// Canonical, server-confirmed entities keyed by id.
///
/// Iteration follows insertion order; overwriting an existing id keeps its
/// slot so the rendered list does not jump around on confirmation.
#[derive(Clone, Debug)]
pub struct EntityStore<T: Entity> {
    entities: IndexMap<String, T>,
}

impl<T: Entity> Default for EntityStore<T> {
    fn default() -> Self {
        Self {
            entities: IndexMap::new(),
        }
    }
}

impl<T: Entity> EntityStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_all(&mut self, entities: impl IntoIterator<Item = T>) {
        self.entities = entities
            .into_iter()
            .map(|e| (e.id().to_string(), e))
            .collect();
    }

    pub fn upsert(&mut self, entity: T) {
        self.entities.insert(entity.id().to_string(), entity);
    }

    /// Insert `entity` only if its id is unknown. Returns whether it was
    /// inserted; an existing confirmed value is never overwritten.
    pub fn insert_if_absent(&mut self, entity: T) -> bool {
        match self.entities.entry(entity.id().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entity);
                true
            }
        }
    }

    /// Removing an unknown id is a no-op.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.entities.shift_remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entities.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Product;

    fn ids(store: &EntityStore<Product>) -> Vec<&str> {
        store.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn upsert_overwrites_in_place() {
        let mut store = EntityStore::new();
        store.upsert(Product::new("1", "X", 10.0));
        store.upsert(Product::new("2", "Y", 5.0));
        store.upsert(Product::new("1", "X", 20.0));

        assert_eq!(ids(&store), vec!["1", "2"]);
        assert_eq!(store.get("1").unwrap().price, 20.0);
    }

    #[test]
    fn insert_if_absent_keeps_existing_value() {
        let mut store = EntityStore::new();
        assert!(store.insert_if_absent(Product::new("1", "X", 10.0)));
        assert!(!store.insert_if_absent(Product::new("1", "X", 20.0)));

        assert_eq!(store.get("1").unwrap().price, 10.0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn replace_all_drops_previous_entries() {
        let mut store = EntityStore::new();
        store.upsert(Product::new("1", "X", 10.0));
        store.replace_all(vec![Product::new("3", "Z", 1.0)]);

        assert!(!store.contains("1"));
        assert_eq!(ids(&store), vec!["3"]);
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut store: EntityStore<Product> = EntityStore::new();
        assert!(store.remove("nope").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn remove_keeps_order_of_rest() {
        let mut store = EntityStore::new();
        for id in ["1", "2", "3"] {
            store.upsert(Product::new(id, "p", 1.0));
        }
        store.remove("2");
        assert_eq!(ids(&store), vec!["1", "3"]);
        assert_eq!(store.len(), 2);
    }
}
