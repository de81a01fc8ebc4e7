//! Per-account key membership

use std::collections::BTreeSet;
use std::fmt;

use super::SharedObjectStore;
use crate::models::{Key, KeyCategory, KeySet, User};

/// One account's category membership plus the store holding its records
///
/// Filled in while the controller fetches keys; read-only afterward.
#[derive(Clone)]
pub struct UserKeyStore {
    user: User,
    categories: KeySet,
    store: SharedObjectStore,
    total_keys: usize,
}

impl UserKeyStore {
    /// Create an empty key store bound to `store`
    pub fn new(user: User, store: SharedObjectStore) -> Self {
        Self {
            user,
            categories: KeySet::new(),
            store,
            total_keys: 0,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn store(&self) -> &SharedObjectStore {
        &self.store
    }

    /// Add keys to a category, merging with any already present
    pub fn add_keys(&mut self, category: KeyCategory, keys: impl IntoIterator<Item = Key>) {
        self.categories.entry(category).or_default().extend(keys);
    }

    /// Keys in a category (empty if the category was never populated)
    pub fn keys(&self, category: KeyCategory) -> impl Iterator<Item = &Key> {
        self.categories.get(&category).into_iter().flatten()
    }

    /// Per-category breakdown
    pub fn categories(&self) -> &KeySet {
        &self.categories
    }

    /// Distinct keys across all categories
    pub fn key_union(&self) -> BTreeSet<Key> {
        self.categories.values().flatten().cloned().collect()
    }

    /// Recompute `total_keys` from the current categories
    pub fn compute_total_keys(&mut self) -> usize {
        self.total_keys = self.key_union().len();
        self.total_keys
    }

    /// Size of the key union, as of the last `compute_total_keys`
    pub fn total_keys(&self) -> usize {
        self.total_keys
    }
}

impl fmt::Debug for UserKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserKeyStore")
            .field("user", &self.user)
            .field("categories", &self.categories)
            .field("total_keys", &self.total_keys)
            .field("store_count", &self.store.count())
            .finish()
    }
}
