//! Remote music-service API
//!
//! This module provides:
//! - The narrow capability trait the sync controller consumes
//! - A blocking HTTP client for the real service
//! - A scripted in-memory implementation for tests and offline runs

mod client;
mod memory;

pub use client::HttpRemoteClient;
pub use memory::{InMemoryRemote, RemoteCall};

use crate::error::SyncError;
use crate::models::{Key, KeySet, RemoteObject, User};

/// Operations the sync engine needs from the remote service
///
/// Every call may fail with `Connectivity` or `Canceled`; `resolve_user`
/// additionally fails with `UserNotFound`.
pub trait RemoteApi: Send + Sync {
    /// Resolve an account identifier (vanity name or user key)
    fn resolve_user(&self, identifier: &str) -> Result<User, SyncError>;

    /// Fetch every key category for an account
    fn get_user_keys(&self, user: &User) -> Result<KeySet, SyncError>;

    /// Fetch the records for `keys`
    ///
    /// Keys unknown to the service are simply absent from the result.
    fn fetch_objects(&self, keys: &[Key]) -> Result<Vec<RemoteObject>, SyncError>;

    /// Identifiers of the accounts `user` follows
    fn get_following(&self, user: &User) -> Result<Vec<String>, SyncError>;
}

/// Remote API response types
pub mod api {
    use serde::Deserialize;
    use serde_json::Value;

    /// Envelope wrapping every method call response
    #[derive(Debug, Deserialize)]
    pub struct Envelope {
        pub status: String,
        pub result: Option<Value>,
        pub message: Option<String>,
    }

    /// User record as returned by `findUser` / `get`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UserRecord {
        pub key: String,
        pub first_name: Option<String>,
        pub last_name: Option<String>,
        pub vanity_name: Option<String>,
    }

    impl UserRecord {
        /// "First Last", falling back to the vanity name, then the key
        pub fn display_name(&self) -> String {
            let name = [self.first_name.as_deref(), self.last_name.as_deref()]
                .into_iter()
                .flatten()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            if !name.is_empty() {
                name
            } else if let Some(vanity) = &self.vanity_name {
                vanity.clone()
            } else {
                self.key.clone()
            }
        }
    }

    /// Minimal keyed record (listing calls request only the key field)
    #[derive(Debug, Deserialize)]
    pub struct KeyRef {
        pub key: String,
    }
}
