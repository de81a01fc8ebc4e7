//! Batch backup of several accounts
//!
//! Runs one controller per requested account, sequentially, and decides
//! between per-account exports and a single shared export. A failure on one
//! account is logged and the batch moves on to the next.

use log::{info, warn};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::SyncError;
use crate::export::Exporter;
use crate::remote::RemoteApi;
use crate::storage::{InMemoryObjectStore, SharedObjectStore, UserKeyStore};
use crate::sync::{CancelToken, StepOutcome, SyncOptions, SyncProgress, UserSyncController};

/// File name of the combined export when accounts share one object store
pub const SHARED_EXPORT_FILE: &str = "conservator-export.json";

/// Driver configuration
#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// Directory snapshots are written to (must exist)
    pub output_dir: PathBuf,
    /// Share one object store across all accounts and export them together
    pub single_store: bool,
    /// Also back up the accounts each requested account follows (one level)
    pub following: bool,
    pub sync: SyncOptions,
}

impl BackupOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            single_store: false,
            following: false,
            sync: SyncOptions::default(),
        }
    }
}

/// Receives driver events for display
///
/// All methods default to no-ops.
pub trait SyncObserver {
    /// A step finished; `controller` reflects the state after it
    fn on_step(&mut self, _controller: &UserSyncController, _outcome: &StepOutcome) {}

    /// Object-fetch counters changed
    fn on_progress(&mut self, _identifier: &str, _progress: SyncProgress) {}

    /// An account's workflow was abandoned
    fn on_failure(&mut self, _identifier: &str, _error: &SyncError) {}

    /// A snapshot is about to be written
    ///
    /// `shared` is set for the combined export of a single-store run.
    fn on_export_started(&mut self, _path: &Path, _shared: bool, _users: usize, _objects: usize) {}

    /// A snapshot was written
    fn on_exported(&mut self, _path: &Path, _shared: bool) {}
}

/// Observer that ignores every event
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BackupReport {
    /// Identifiers synced to completion, in processing order
    pub completed: Vec<String>,
    /// Identifiers abandoned, with the failure that stopped them
    pub failed: Vec<(String, SyncError)>,
    /// Snapshot files written
    pub exports: Vec<PathBuf>,
}

impl BackupReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// An account waiting to be processed
#[derive(Debug, Clone)]
struct PendingAccount {
    identifier: String,
    expand_following: bool,
}

/// Processes requested accounts one after another
pub struct BackupDriver {
    remote: Arc<dyn RemoteApi>,
    options: BackupOptions,
    cancel: CancelToken,
    shared_store: Option<SharedObjectStore>,
    shared_key_stores: Vec<UserKeyStore>,
}

impl BackupDriver {
    pub fn new(remote: Arc<dyn RemoteApi>, options: BackupOptions) -> Self {
        let shared_store = options
            .single_store
            .then(|| Arc::new(InMemoryObjectStore::new()) as SharedObjectStore);
        Self {
            remote,
            options,
            cancel: CancelToken::new(),
            shared_store,
            shared_key_stores: Vec::new(),
        }
    }

    /// Token that cancels the account currently being synced
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Back up every identifier, then write the shared export if enabled
    ///
    /// Only a missing output directory fails the whole run; per-account
    /// failures are collected in the report.
    pub fn run<I, S>(
        &mut self,
        identifiers: I,
        observer: &mut dyn SyncObserver,
    ) -> Result<BackupReport, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.options.output_dir.is_dir() {
            return Err(SyncError::export_io(
                &self.options.output_dir,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "output directory does not exist",
                ),
            ));
        }

        let mut queue: VecDeque<PendingAccount> = identifiers
            .into_iter()
            .map(|identifier| PendingAccount {
                identifier: identifier.into(),
                expand_following: self.options.following,
            })
            .collect();
        let mut report = BackupReport::default();

        while let Some(account) = queue.pop_front() {
            let followed = self.process_account(&account, observer, &mut report);

            // Followed accounts run next, before the remaining requests,
            // and never expand further
            for identifier in followed.into_iter().rev() {
                queue.push_front(PendingAccount {
                    identifier,
                    expand_following: false,
                });
            }
        }

        self.export_shared(observer, &mut report);
        Ok(report)
    }

    /// Sync and (for private stores) export one account
    ///
    /// Returns the identifiers it follows when expansion was requested.
    fn process_account(
        &mut self,
        account: &PendingAccount,
        observer: &mut dyn SyncObserver,
        report: &mut BackupReport,
    ) -> Vec<String> {
        let identifier = account.identifier.as_str();
        info!("Starting work for '{}'", identifier);

        // A cancellation only abandons the account it interrupted
        self.cancel.reset();

        let store = self
            .shared_store
            .clone()
            .unwrap_or_else(|| Arc::new(InMemoryObjectStore::new()) as SharedObjectStore);
        let mut controller = UserSyncController::new(Arc::clone(&self.remote), identifier, store)
            .with_options(self.options.sync)
            .with_cancel_token(self.cancel.clone());

        if let Err(e) = Self::drive(&mut controller, observer) {
            Self::record_failure(identifier, e, observer, report);
            return Vec::new();
        }

        if self.shared_store.is_none() {
            if let Err(e) = self.export_private(&controller, observer, report) {
                Self::record_failure(identifier, e, observer, report);
                return Vec::new();
            }
        }

        report.completed.push(identifier.to_string());

        let followed = if account.expand_following {
            match controller.user() {
                Some(user) => match self.remote.get_following(user) {
                    Ok(followed) => {
                        info!("'{}' follows {} users", identifier, followed.len());
                        followed
                    }
                    Err(e) => {
                        warn!("Could not list users followed by '{}': {}", identifier, e);
                        observer.on_failure(identifier, &e);
                        Vec::new()
                    }
                },
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        if self.shared_store.is_some() {
            if let Some(key_store) = controller.into_user_key_store() {
                self.shared_key_stores.push(key_store);
            }
        }

        followed
    }

    /// Step a controller to completion, reporting every step
    fn drive(
        controller: &mut UserSyncController,
        observer: &mut dyn SyncObserver,
    ) -> Result<(), SyncError> {
        while !controller.state().is_finished() {
            let identifier = controller.user_identifier().to_string();
            let outcome = controller.sync_step(|p| observer.on_progress(&identifier, p))?;
            observer.on_step(controller, &outcome);
        }
        Ok(())
    }

    fn export_private(
        &self,
        controller: &UserSyncController,
        observer: &mut dyn SyncObserver,
        report: &mut BackupReport,
    ) -> Result<(), SyncError> {
        let file_name = controller.file_name().ok_or(SyncError::InvalidState {
            state: controller.state(),
        })?;
        let path = self.options.output_dir.join(file_name);
        let exporter = controller.create_exporter()?;

        observer.on_export_started(&path, false, exporter.user_count(), exporter.object_count());
        exporter.export(&path)?;
        observer.on_exported(&path, false);
        report.exports.push(path);
        Ok(())
    }

    fn export_shared(&mut self, observer: &mut dyn SyncObserver, report: &mut BackupReport) {
        let Some(store) = self.shared_store.clone() else {
            return;
        };
        if self.shared_key_stores.is_empty() {
            return;
        }

        let path = self.options.output_dir.join(SHARED_EXPORT_FILE);
        let key_stores = std::mem::take(&mut self.shared_key_stores);
        let result = Exporter::shared(store, key_stores).and_then(|exporter| {
            observer.on_export_started(&path, true, exporter.user_count(), exporter.object_count());
            exporter.export(&path)
        });

        match result {
            Ok(()) => {
                observer.on_exported(&path, true);
                report.exports.push(path);
            }
            Err(e) => {
                warn!("Shared export failed: {}", e);
                observer.on_failure(SHARED_EXPORT_FILE, &e);
                report.failed.push((SHARED_EXPORT_FILE.to_string(), e));
            }
        }
    }

    fn record_failure(
        identifier: &str,
        error: SyncError,
        observer: &mut dyn SyncObserver,
        report: &mut BackupReport,
    ) {
        warn!("Abandoning '{}': {}", identifier, error.classification());
        observer.on_failure(identifier, &error);
        report.failed.push((identifier.to_string(), error));
    }
}
