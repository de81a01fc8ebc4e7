//! Storage trait definitions

use serde_json::Value;
use std::sync::Arc;

use crate::models::Key;

/// Shared handle to an object store
///
/// Held by every key store that references the store; the store lives as
/// long as its longest-lived holder.
pub type SharedObjectStore = Arc<dyn ObjectStore>;

/// Deduplicating key -> record container
///
/// Implementations must make `add` an atomic insert-if-absent so that
/// concurrent writers sharing one store never overwrite each other.
pub trait ObjectStore: Send + Sync {
    /// Check if a record is stored for `key`
    fn contains(&self, key: &Key) -> bool;

    /// Insert a record unless one is already stored for `key`
    ///
    /// Returns `true` if the record was inserted. An existing record is
    /// never overwritten (first write wins).
    fn add(&self, key: Key, object: Value) -> bool;

    /// Get a copy of the record stored for `key`
    fn get(&self, key: &Key) -> Option<Value>;

    /// Number of distinct stored keys
    fn count(&self) -> usize;

    /// All stored records, ordered by key
    fn entries(&self) -> Vec<(Key, Value)>;
}
