//! Snapshot export
//!
//! Serializes one or more key stores together with the object store they
//! reference into a single JSON snapshot.

mod snapshot;

pub use snapshot::{SNAPSHOT_VERSION, Snapshot, UserRecord};

use chrono::Utc;
use log::info;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use crate::error::SyncError;
use crate::models::KeyCategory;
use crate::storage::{SharedObjectStore, UserKeyStore};

/// Writes key stores and their object store to a snapshot file
///
/// Records are written exactly once no matter how many accounts reference
/// them; deduplication already happened in the object store.
pub struct Exporter {
    store: SharedObjectStore,
    key_stores: Vec<UserKeyStore>,
}

impl Exporter {
    /// Exporter for one account and its own object store
    pub fn single(key_store: UserKeyStore) -> Self {
        Self {
            store: Arc::clone(key_store.store()),
            key_stores: vec![key_store],
        }
    }

    /// Exporter for several accounts sharing `store`
    ///
    /// Fails if any key store references a different object store.
    pub fn shared(
        store: SharedObjectStore,
        key_stores: Vec<UserKeyStore>,
    ) -> Result<Self, SyncError> {
        let store_ptr = Arc::as_ptr(&store) as *const ();
        if let Some(stray) = key_stores
            .iter()
            .find(|ks| Arc::as_ptr(ks.store()) as *const () != store_ptr)
        {
            return Err(SyncError::Snapshot {
                message: format!(
                    "key store for {} does not reference the shared object store",
                    stray.user().key
                ),
            });
        }

        Ok(Self { store, key_stores })
    }

    /// Number of accounts in the export
    pub fn user_count(&self) -> usize {
        self.key_stores.len()
    }

    /// Number of distinct records in the export
    pub fn object_count(&self) -> usize {
        self.store.count()
    }

    /// Build the in-memory snapshot document
    pub fn snapshot(&self) -> Snapshot {
        let users = self
            .key_stores
            .iter()
            .map(|ks| {
                let mut keys = ks.categories().clone();
                for category in KeyCategory::ALL {
                    keys.entry(category).or_default();
                }
                UserRecord {
                    user: ks.user().clone(),
                    total_keys: ks.total_keys(),
                    keys,
                }
            })
            .collect();

        let objects: BTreeMap<_, _> = self.store.entries().into_iter().collect();

        Snapshot {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            users,
            objects,
        }
    }

    /// Write the snapshot to `path`, replacing any existing file
    ///
    /// The parent directory must already exist.
    pub fn export(&self, path: &Path) -> Result<(), SyncError> {
        let snapshot = self.snapshot();

        // Write to a sibling temp file, then rename over the target
        let temp_path = path.with_extension("json.tmp");
        let write_temp = || -> std::io::Result<()> {
            let file = fs::File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &snapshot)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            Ok(())
        };

        if let Err(e) = write_temp() {
            let _ = fs::remove_file(&temp_path);
            return Err(SyncError::export_io(path, e));
        }
        fs::rename(&temp_path, path).map_err(|e| SyncError::export_io(path, e))?;

        info!(
            "Exported {} users ({} objects) to {}",
            snapshot.users.len(),
            snapshot.objects.len(),
            path.display()
        );
        Ok(())
    }
}
