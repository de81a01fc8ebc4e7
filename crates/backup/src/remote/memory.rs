//! In-memory remote API
//!
//! Serves a scripted set of users, key sets and records without network
//! access. Every call is recorded so callers can assert what was requested.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use super::RemoteApi;
use crate::error::SyncError;
use crate::models::{Key, KeyCategory, KeySet, RemoteObject, User};

/// A call made against an InMemoryRemote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    ResolveUser(String),
    GetUserKeys(String),
    FetchObjects(Vec<Key>),
    GetFollowing(String),
}

struct Account {
    user: User,
    keys: KeySet,
    following: Vec<String>,
}

/// Scripted implementation of RemoteApi
///
/// Accounts are looked up by identifier; objects by key. A failure can be
/// injected for the next call of a given kind.
pub struct InMemoryRemote {
    accounts: RwLock<HashMap<String, Account>>,
    objects: RwLock<HashMap<Key, Value>>,
    calls: Mutex<Vec<RemoteCall>>,
    fail_fetch_with: Mutex<Option<SyncError>>,
    fail_keys_with: Mutex<Option<SyncError>>,
    fail_following_with: Mutex<Option<SyncError>>,
}

impl InMemoryRemote {
    /// Create an empty remote with no accounts
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_fetch_with: Mutex::new(None),
            fail_keys_with: Mutex::new(None),
            fail_following_with: Mutex::new(None),
        }
    }

    /// Register an account reachable under `identifier`
    pub fn add_user(&self, identifier: impl Into<String>, user: User) {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        accounts.insert(
            identifier.into(),
            Account {
                user,
                keys: KeySet::new(),
                following: Vec::new(),
            },
        );
    }

    /// Add keys to a category of a registered account
    ///
    /// Records are synthesized for keys that have no explicit object.
    pub fn add_keys<I, K>(&self, identifier: &str, category: KeyCategory, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let keys: Vec<Key> = keys.into_iter().map(Into::into).collect();
        {
            let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
            for key in &keys {
                objects
                    .entry(key.clone())
                    .or_insert_with(|| serde_json::json!({ "key": key.as_str() }));
            }
        }

        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(account) = accounts.get_mut(identifier) {
            account.keys.entry(category).or_default().extend(keys);
        }
    }

    /// Set the identifiers a registered account follows
    pub fn set_following<I, S>(&self, identifier: &str, following: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(account) = accounts.get_mut(identifier) {
            account.following = following.into_iter().map(Into::into).collect();
        }
    }

    /// Set (or replace) the record served for `key`
    pub fn put_object(&self, key: impl Into<Key>, data: Value) {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        objects.insert(key.into(), data);
    }

    /// Stop serving the record for `key`, as if it were deleted remotely
    pub fn remove_object(&self, key: &Key) {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        objects.remove(key);
    }

    /// Make the next `fetch_objects` call fail with `error`
    pub fn fail_next_fetch(&self, error: SyncError) {
        *self.fail_fetch_with.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Make the next `get_user_keys` call fail with `error`
    pub fn fail_next_keys(&self, error: SyncError) {
        *self.fail_keys_with.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Make the next `get_following` call fail with `error`
    pub fn fail_next_following(&self, error: SyncError) {
        *self.fail_following_with.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, call: RemoteCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Find an account by user key
    fn with_account<T>(&self, user: &User, f: impl FnOnce(&Account) -> T) -> Option<T> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts.values().find(|a| a.user.key == user.key).map(f)
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteApi for InMemoryRemote {
    fn resolve_user(&self, identifier: &str) -> Result<User, SyncError> {
        self.record(RemoteCall::ResolveUser(identifier.to_string()));

        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts
            .get(identifier)
            .or_else(|| accounts.values().find(|a| a.user.key == identifier))
            .map(|a| a.user.clone())
            .ok_or_else(|| SyncError::user_not_found(identifier))
    }

    fn get_user_keys(&self, user: &User) -> Result<KeySet, SyncError> {
        self.record(RemoteCall::GetUserKeys(user.key.clone()));

        if let Some(error) = self
            .fail_keys_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(error);
        }

        self.with_account(user, |a| a.keys.clone())
            .ok_or_else(|| SyncError::user_not_found(&user.key))
    }

    fn fetch_objects(&self, keys: &[Key]) -> Result<Vec<RemoteObject>, SyncError> {
        self.record(RemoteCall::FetchObjects(keys.to_vec()));

        if let Some(error) = self
            .fail_fetch_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(error);
        }

        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(keys
            .iter()
            .filter_map(|key| {
                objects
                    .get(key)
                    .map(|data| RemoteObject::new(key.clone(), data.clone()))
            })
            .collect())
    }

    fn get_following(&self, user: &User) -> Result<Vec<String>, SyncError> {
        self.record(RemoteCall::GetFollowing(user.key.clone()));

        if let Some(error) = self
            .fail_following_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(error);
        }

        self.with_account(user, |a| a.following.clone())
            .ok_or_else(|| SyncError::user_not_found(&user.key))
    }
}
