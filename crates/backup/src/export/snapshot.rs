//! Snapshot document format

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::SyncError;
use crate::models::{Key, KeySet, User};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// A persisted export: accounts with their key categories, plus one pool
/// of records covering every key any account references
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub users: Vec<UserRecord>,
    /// Raw records by key, written verbatim
    pub objects: BTreeMap<Key, Value>,
}

/// One account in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user: User,
    pub total_keys: usize,
    pub keys: KeySet,
}

impl UserRecord {
    /// Distinct keys across all categories
    pub fn key_union(&self) -> BTreeSet<Key> {
        self.keys.values().flatten().cloned().collect()
    }
}

impl Snapshot {
    /// Read a snapshot previously written by the exporter
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let content = std::fs::read_to_string(path).map_err(|e| SyncError::export_io(path, e))?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(SyncError::Snapshot {
                message: format!(
                    "unsupported snapshot version {} (newest known is {})",
                    snapshot.version, SNAPSHOT_VERSION
                ),
            });
        }

        Ok(snapshot)
    }

    /// Find an account by user key
    pub fn user(&self, key: &str) -> Option<&UserRecord> {
        self.users.iter().find(|r| r.user.key == key)
    }

    /// Keys referenced by some account but missing from the record pool
    pub fn missing_objects(&self) -> BTreeSet<Key> {
        self.users
            .iter()
            .flat_map(|r| r.key_union())
            .filter(|key| !self.objects.contains_key(key))
            .collect()
    }
}
