//! Backup crate - Business logic for music-service account backups
//!
//! This crate provides platform-independent backup functionality including:
//! - Domain models (User, Key, KeyCategory, SyncState)
//! - Remote API capability trait, HTTP client and in-memory fake
//! - Deduplicating object store, optionally shared across accounts
//! - Resumable per-account sync state machine
//! - JSON snapshot export and re-import
//! - Batch driver with follow expansion
//!
//! This crate has zero UI dependencies; console rendering lives in the
//! `conservator` app.

pub mod config;
pub mod driver;
pub mod error;
pub mod export;
pub mod models;
pub mod remote;
pub mod storage;
pub mod sync;

pub use config::ApiCredentials;
pub use driver::{
    BackupDriver, BackupOptions, BackupReport, NoopObserver, SHARED_EXPORT_FILE, SyncObserver,
};
pub use error::SyncError;
pub use export::{Exporter, Snapshot, UserRecord};
pub use models::{Key, KeyCategory, KeySet, RemoteObject, SyncState, User};
pub use remote::{HttpRemoteClient, InMemoryRemote, RemoteApi, RemoteCall};
pub use storage::{InMemoryObjectStore, ObjectStore, SharedObjectStore, UserKeyStore};
pub use sync::{
    CancelToken, StepOutcome, SyncOptions, SyncProgress, UserSyncController, friendly_duration,
};
