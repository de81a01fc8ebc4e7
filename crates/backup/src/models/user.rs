//! User model representing a resolved remote account

use serde::{Deserialize, Serialize};

/// A resolved remote account
///
/// Identity is `key`. Resolved once per sync and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Remote user key (e.g. "s12345")
    pub key: String,
    /// Human-readable name as reported by the service
    pub display_name: String,
}

impl User {
    pub fn new(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
        }
    }
}
