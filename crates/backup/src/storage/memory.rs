//! In-memory object store

use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{PoisonError, RwLock};

use super::ObjectStore;
use crate::models::Key;

/// In-memory implementation of ObjectStore
///
/// Grows monotonically for the lifetime of one run; there is no eviction.
/// Records are only persisted through the exporter.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<Key, Value>>,
}

impl InMemoryObjectStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn contains(&self, key: &Key) -> bool {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        objects.contains_key(key)
    }

    fn add(&self, key: Key, object: Value) -> bool {
        // Check and insert under one write lock
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        match objects.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(object);
                true
            }
        }
    }

    fn get(&self, key: &Key) -> Option<Value> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        objects.get(key).cloned()
    }

    fn count(&self) -> usize {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        objects.len()
    }

    fn entries(&self) -> Vec<(Key, Value)> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = objects
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_add_and_get() {
        let store = InMemoryObjectStore::new();
        assert!(store.add(Key::new("t1"), json!({"key": "t1"})));
        assert!(store.contains(&Key::new("t1")));
        assert!(!store.contains(&Key::new("t2")));
        assert_eq!(store.get(&Key::new("t1")), Some(json!({"key": "t1"})));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_add_existing_key_is_noop() {
        let store = InMemoryObjectStore::new();
        assert!(store.add(Key::new("t1"), json!({"key": "t1", "v": 1})));
        assert!(!store.add(Key::new("t1"), json!({"key": "t1", "v": 2})));

        assert_eq!(store.count(), 1);
        // First write wins
        assert_eq!(store.get(&Key::new("t1")).unwrap()["v"], 1);
    }

    #[test]
    fn test_entries_sorted_by_key() {
        let store = InMemoryObjectStore::new();
        store.add(Key::new("b"), json!(2));
        store.add(Key::new("a"), json!(1));
        store.add(Key::new("c"), json!(3));

        let keys: Vec<_> = store.entries().into_iter().map(|(k, _)| k.0).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_concurrent_add_first_write_wins() {
        let store = Arc::new(InMemoryObjectStore::new());

        let handles: Vec<_> = (0..8)
            .map(|writer| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|i| store.add(Key::new(format!("k{}", i)), json!(writer)))
                        .count()
                })
            })
            .collect();

        let inserted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(inserted, 100);
        assert_eq!(store.count(), 100);
    }
}
