//! Per-account sync state machine

use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{CancelToken, StepOutcome, SyncOptions, SyncProgress};
use crate::error::SyncError;
use crate::export::Exporter;
use crate::models::{Key, RemoteObject, SyncState, User};
use crate::remote::RemoteApi;
use crate::storage::{SharedObjectStore, UserKeyStore};

/// Drives one account from resolution to a completed key store
///
/// Single use: once `Finished` (or after any failed step) the controller
/// must be dropped. Each call to [`sync_step`](Self::sync_step) performs
/// exactly one unit of work.
pub struct UserSyncController {
    remote: Arc<dyn RemoteApi>,
    store: SharedObjectStore,
    identifier: String,
    options: SyncOptions,
    cancel: CancelToken,
    state: SyncState,
    user: Option<User>,
    key_store: Option<UserKeyStore>,
    /// Keys still to fetch, in key order
    pending: VecDeque<Key>,
    total_objects: usize,
    synced_objects: usize,
    started_at: Option<Instant>,
}

impl UserSyncController {
    /// Create a controller for `identifier` writing into `store`
    ///
    /// Pass a fresh store for a private export, or a clone of one shared
    /// handle to deduplicate records across accounts.
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        identifier: impl Into<String>,
        store: SharedObjectStore,
    ) -> Self {
        Self {
            remote,
            store,
            identifier: identifier.into(),
            options: SyncOptions::default(),
            cancel: CancelToken::new(),
            state: SyncState::Start,
            user: None,
            key_store: None,
            pending: VecDeque::new(),
            total_objects: 0,
            synced_objects: 0,
            started_at: None,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// The identifier this controller was asked to sync
    pub fn user_identifier(&self) -> &str {
        &self.identifier
    }

    /// The resolved user, once `FoundUser` is reached
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The account's key store, once `SyncingUserKeys` is reached
    pub fn user_key_store(&self) -> Option<&UserKeyStore> {
        self.key_store.as_ref()
    }

    /// Take the key store out of a finished controller
    pub fn into_user_key_store(self) -> Option<UserKeyStore> {
        self.key_store
    }

    /// Objects to fetch for this account (fixed on entering `SyncingObjects`)
    pub fn total_objects(&self) -> usize {
        self.total_objects
    }

    /// Objects resolved so far
    pub fn synced_objects(&self) -> usize {
        self.synced_objects
    }

    pub fn progress(&self) -> SyncProgress {
        SyncProgress {
            current: self.synced_objects,
            total: self.total_objects,
        }
    }

    /// Time since the first step ran
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    /// Snapshot file name derived from the resolved user
    ///
    /// Available once `FoundUser` is reached.
    pub fn file_name(&self) -> Option<String> {
        let user = self.user.as_ref()?;
        let mut stem = format!("conservator-{}", self.identifier);
        if user.key != self.identifier {
            stem.push('-');
            stem.push_str(&user.key);
        }
        Some(format!("{}.json", sanitize_filename::sanitize(stem)))
    }

    /// Exporter for this account's key store and its object store
    ///
    /// Only valid once the controller is `Finished`.
    pub fn create_exporter(&self) -> Result<Exporter, SyncError> {
        match (&self.key_store, self.state) {
            (Some(key_store), SyncState::Finished) => Ok(Exporter::single(key_store.clone())),
            _ => Err(SyncError::InvalidState { state: self.state }),
        }
    }

    /// Perform one unit of work
    ///
    /// Advances the state by at most one transition; while in
    /// `SyncingObjects` each call fetches one batch. `on_progress` is invoked
    /// after every fetched batch. On failure the state is left unchanged and
    /// the error is returned as-is.
    pub fn sync_step<F>(&mut self, mut on_progress: F) -> Result<StepOutcome, SyncError>
    where
        F: FnMut(SyncProgress),
    {
        if self.state.is_finished() {
            return Err(SyncError::InvalidState { state: self.state });
        }
        if self.cancel.is_canceled() {
            return Err(SyncError::Canceled);
        }
        self.started_at.get_or_insert_with(Instant::now);

        let current = self.state;
        let mut progress = None;
        let advance = match current {
            SyncState::Start => true,
            SyncState::FindingUser => {
                let user = self.remote.resolve_user(&self.identifier)?;
                info!(
                    "Resolved '{}' to {} ({})",
                    self.identifier, user.display_name, user.key
                );
                self.user = Some(user);
                true
            }
            SyncState::FoundUser => {
                let user = self.require_user()?.clone();
                self.key_store = Some(UserKeyStore::new(user, Arc::clone(&self.store)));
                true
            }
            SyncState::SyncingUserKeys => {
                let user = self.require_user()?.clone();
                let key_set = self.remote.get_user_keys(&user)?;
                let key_store = self.require_key_store()?;
                for (category, keys) in key_set {
                    key_store.add_keys(category, keys);
                }
                true
            }
            SyncState::SyncedUserKeys => {
                self.begin_object_fetch()?;
                true
            }
            SyncState::SyncingObjects => {
                if !self.pending.is_empty() {
                    let p = self.fetch_next_batch()?;
                    on_progress(p);
                    progress = Some(p);
                }
                self.pending.is_empty()
            }
            SyncState::SyncedObjects => {
                info!(
                    "Finished '{}': {} objects fetched",
                    self.identifier, self.total_objects
                );
                true
            }
            SyncState::Finished => return Err(SyncError::InvalidState { state: current }),
        };

        let next = if advance {
            current.next().ok_or(SyncError::InvalidState { state: current })?
        } else {
            current
        };

        let transitioned = next != current;
        self.state = next;

        Ok(StepOutcome {
            state: next,
            transitioned,
            progress,
        })
    }

    /// Run steps until `Finished`
    pub fn run_to_completion<F>(&mut self, mut on_progress: F) -> Result<(), SyncError>
    where
        F: FnMut(SyncProgress),
    {
        while !self.state.is_finished() {
            self.sync_step(&mut on_progress)?;
        }
        Ok(())
    }

    fn require_user(&self) -> Result<&User, SyncError> {
        self.user
            .as_ref()
            .ok_or(SyncError::InvalidState { state: self.state })
    }

    fn require_key_store(&mut self) -> Result<&mut UserKeyStore, SyncError> {
        let state = self.state;
        self.key_store
            .as_mut()
            .ok_or(SyncError::InvalidState { state })
    }

    /// Fix the key union and the set of keys the store still lacks
    fn begin_object_fetch(&mut self) -> Result<(), SyncError> {
        let store = Arc::clone(&self.store);
        let key_store = self.require_key_store()?;
        let total_keys = key_store.compute_total_keys();

        let pending: VecDeque<Key> = key_store
            .key_union()
            .into_iter()
            .filter(|key| !store.contains(key))
            .collect();

        info!(
            "'{}': {} keys of interest, {} not yet stored",
            self.identifier,
            total_keys,
            pending.len()
        );

        self.total_objects = pending.len();
        self.synced_objects = 0;
        self.pending = pending;
        Ok(())
    }

    /// Fetch and store the next batch of pending keys
    ///
    /// Nothing is committed unless every request of the batch succeeded.
    fn fetch_next_batch(&mut self) -> Result<SyncProgress, SyncError> {
        let batch_len = self.options.batch_size.max(1).min(self.pending.len());
        let batch: Vec<Key> = self.pending.iter().take(batch_len).cloned().collect();

        // Another account sharing the store may have fetched some already
        let to_fetch: Vec<Key> = batch
            .iter()
            .filter(|key| !self.store.contains(key))
            .cloned()
            .collect();

        let fetched = self.fetch_concurrently(&to_fetch)?;

        let mut added = 0;
        for object in fetched {
            if self.store.add(object.key, object.data) {
                added += 1;
            }
        }

        let missing: Vec<&Key> = to_fetch
            .iter()
            .filter(|key| !self.store.contains(key))
            .collect();
        if !missing.is_empty() {
            warn!(
                "'{}': remote returned no record for {} keys: {:?}",
                self.identifier,
                missing.len(),
                missing
            );
        }

        self.pending.drain(..batch_len);
        self.synced_objects += batch_len;

        debug!(
            "'{}': batch of {} keys ({} requested, {} stored), {}/{}",
            self.identifier,
            batch_len,
            to_fetch.len(),
            added,
            self.synced_objects,
            self.total_objects
        );

        Ok(self.progress())
    }

    /// Split `keys` into up to `parallel_requests` concurrent fetches
    fn fetch_concurrently(&self, keys: &[Key]) -> Result<Vec<RemoteObject>, SyncError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_size = keys.len().div_ceil(self.options.parallel_requests.max(1));
        let remote = &self.remote;

        let chunks: Vec<Vec<RemoteObject>> = keys
            .par_chunks(chunk_size)
            .map(|chunk| remote.fetch_objects(chunk))
            .collect::<Result<_, _>>()?;

        Ok(chunks.into_iter().flatten().collect())
    }
}
