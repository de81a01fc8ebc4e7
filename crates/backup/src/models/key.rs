//! Record keys and the categories an account groups them into

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Opaque identifier of one remote record (track, playlist, ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(pub String);

impl Key {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classification of a key relative to an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCategory {
    Favorites,
    Synced,
    OwnedPlaylists,
    CollaborativePlaylists,
    SubscribedPlaylists,
}

impl KeyCategory {
    pub const ALL: [KeyCategory; 5] = [
        KeyCategory::Favorites,
        KeyCategory::Synced,
        KeyCategory::OwnedPlaylists,
        KeyCategory::CollaborativePlaylists,
        KeyCategory::SubscribedPlaylists,
    ];

    /// Name used in snapshots and log output
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyCategory::Favorites => "favorites",
            KeyCategory::Synced => "synced",
            KeyCategory::OwnedPlaylists => "owned_playlists",
            KeyCategory::CollaborativePlaylists => "collaborative_playlists",
            KeyCategory::SubscribedPlaylists => "subscribed_playlists",
        }
    }
}

/// Per-category key membership for one account
///
/// Categories may overlap: an owned playlist can also be a favorite.
pub type KeySet = BTreeMap<KeyCategory, BTreeSet<Key>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serde_names_match_as_str() {
        for category in KeyCategory::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn test_key_serializes_as_plain_string() {
        let json = serde_json::to_string(&Key::new("pl:42")).unwrap();
        assert_eq!(json, "\"pl:42\"");
    }
}
