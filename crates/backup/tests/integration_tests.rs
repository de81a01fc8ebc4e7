//! Integration tests for the backup crate
//!
//! These tests verify the complete flow from resolving accounts to reading
//! the exported snapshots back.

use backup::driver::{BackupDriver, BackupOptions, NoopObserver, SHARED_EXPORT_FILE, SyncObserver};
use backup::models::{Key, KeyCategory, SyncState, User};
use backup::remote::{InMemoryRemote, RemoteCall};
use backup::storage::{InMemoryObjectStore, ObjectStore, SharedObjectStore};
use backup::sync::{CancelToken, StepOutcome, SyncOptions, SyncProgress, UserSyncController};
use backup::{Snapshot, SyncError};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to build a remote with alice, bob and carol
fn make_remote() -> Arc<InMemoryRemote> {
    let remote = InMemoryRemote::new();

    remote.add_user("alice", User::new("s1", "Alice"));
    remote.add_keys("alice", KeyCategory::Favorites, ["t1", "t2", "pl:42"]);
    remote.add_keys("alice", KeyCategory::Synced, ["t1", "t3"]);
    remote.add_keys("alice", KeyCategory::OwnedPlaylists, ["pl:1"]);

    remote.add_user("bob", User::new("s2", "Bob"));
    remote.add_keys("bob", KeyCategory::Favorites, ["t2", "pl:42"]);
    remote.add_keys("bob", KeyCategory::SubscribedPlaylists, ["pl:1", "pl:9"]);

    remote.add_user("carol", User::new("s3", "Carol"));
    remote.add_keys("carol", KeyCategory::CollaborativePlaylists, ["pl:5"]);

    remote.put_object("pl:42", json!({"key": "pl:42", "name": "Shared Mix", "length": 12}));

    Arc::new(remote)
}

fn options(dir: &TempDir) -> BackupOptions {
    BackupOptions::new(dir.path())
}

#[derive(Default)]
struct StateRecorder {
    transitions: Vec<(String, SyncState)>,
}

impl SyncObserver for StateRecorder {
    fn on_step(&mut self, controller: &UserSyncController, outcome: &StepOutcome) {
        if outcome.transitioned {
            self.transitions
                .push((controller.user_identifier().to_string(), outcome.state));
        }
    }
}

/// Cancels the run the first time `target` reports progress
struct CancelOnProgress {
    target: &'static str,
    token: CancelToken,
    fired: bool,
}

impl SyncObserver for CancelOnProgress {
    fn on_progress(&mut self, identifier: &str, _progress: SyncProgress) {
        if identifier == self.target && !self.fired {
            self.token.cancel();
            self.fired = true;
        }
    }
}

#[test]
fn test_single_account_private_export() {
    let dir = TempDir::new().unwrap();
    let remote = make_remote();
    let mut driver = BackupDriver::new(remote.clone(), options(&dir));

    let report = driver.run(["alice"], &mut NoopObserver).unwrap();

    assert!(report.is_success());
    assert_eq!(report.exports.len(), 1);
    let path = &report.exports[0];
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "conservator-alice-s1.json"
    );

    let snapshot = Snapshot::load(path).unwrap();
    assert_eq!(snapshot.users.len(), 1);
    let alice = snapshot.user("s1").unwrap();
    assert_eq!(alice.total_keys, 5);

    let expected: BTreeSet<Key> = ["t1", "t2", "t3", "pl:42", "pl:1"]
        .into_iter()
        .map(Key::new)
        .collect();
    assert_eq!(snapshot.objects.keys().cloned().collect::<BTreeSet<_>>(), expected);
    assert!(snapshot.missing_objects().is_empty());
}

#[test]
fn test_shared_store_deduplicates_across_accounts() {
    let dir = TempDir::new().unwrap();
    let remote = make_remote();
    let mut opts = options(&dir);
    opts.single_store = true;
    let mut driver = BackupDriver::new(remote.clone(), opts);

    let report = driver.run(["alice", "bob"], &mut NoopObserver).unwrap();

    assert_eq!(report.completed, vec!["alice", "bob"]);
    assert_eq!(report.exports, vec![dir.path().join(SHARED_EXPORT_FILE)]);

    let snapshot = Snapshot::load(&report.exports[0]).unwrap();
    let alice = snapshot.user("s1").unwrap();
    let bob = snapshot.user("s2").unwrap();

    // alice: t1 t2 t3 pl:42 pl:1, bob: t2 pl:42 pl:1 pl:9
    assert_eq!(alice.total_keys + bob.total_keys, 9);
    assert_eq!(snapshot.objects.len(), 6);
    assert!(snapshot.objects.len() < alice.total_keys + bob.total_keys);
    assert_eq!(snapshot.objects[&Key::new("pl:42")]["name"], "Shared Mix");

    // Only one per-key entry exists in the raw file
    let raw = std::fs::read_to_string(&report.exports[0]).unwrap();
    assert_eq!(raw.matches("\"Shared Mix\"").count(), 1);

    // bob never refetched what alice already brought in
    let fetched: Vec<Key> = remote
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            RemoteCall::FetchObjects(keys) => Some(keys),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(fetched.len(), 6);
}

#[test]
fn test_unknown_user_skipped_and_batch_continues() {
    let dir = TempDir::new().unwrap();
    let remote = make_remote();
    let mut driver = BackupDriver::new(remote.clone(), options(&dir));
    let mut recorder = StateRecorder::default();

    let report = driver.run(["doesnotexist", "bob"], &mut recorder).unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "doesnotexist");
    assert!(matches!(report.failed[0].1, SyncError::UserNotFound { .. }));
    assert_eq!(report.completed, vec!["bob"]);

    // No key fetch ran for the unknown account
    assert_eq!(
        remote
            .calls()
            .iter()
            .filter(|c| matches!(c, RemoteCall::GetUserKeys(_)))
            .count(),
        1
    );

    // Only bob's snapshot was written
    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);

    let unknown: Vec<_> = recorder
        .transitions
        .iter()
        .filter(|(id, _)| id == "doesnotexist")
        .map(|(_, state)| *state)
        .collect();
    assert_eq!(unknown, vec![SyncState::FindingUser]);
}

#[test]
fn test_following_is_one_level_deep() {
    let dir = TempDir::new().unwrap();
    let remote = make_remote();
    remote.set_following("alice", ["bob", "carol"]);
    remote.set_following("bob", ["carol"]);

    let mut opts = options(&dir);
    opts.following = true;
    let mut driver = BackupDriver::new(remote.clone(), opts);

    let report = driver.run(["alice"], &mut NoopObserver).unwrap();

    assert_eq!(report.completed, vec!["alice", "bob", "carol"]);

    let following_queries: Vec<_> = remote
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            RemoteCall::GetFollowing(key) => Some(key),
            _ => None,
        })
        .collect();
    assert_eq!(following_queries, vec!["s1"]);
}

#[test]
fn test_followed_accounts_run_before_remaining_requests() {
    let dir = TempDir::new().unwrap();
    let remote = make_remote();
    remote.set_following("alice", ["carol"]);

    let mut opts = options(&dir);
    opts.following = true;
    let mut driver = BackupDriver::new(remote.clone(), opts);

    let report = driver.run(["alice", "bob"], &mut NoopObserver).unwrap();
    assert_eq!(report.completed, vec!["alice", "carol", "bob"]);
}

#[test]
fn test_snapshot_round_trip_preserves_categories() {
    let dir = TempDir::new().unwrap();
    let remote = make_remote();
    let mut opts = options(&dir);
    opts.single_store = true;
    let mut driver = BackupDriver::new(remote.clone(), opts);

    let report = driver.run(["alice", "bob"], &mut NoopObserver).unwrap();
    let snapshot = Snapshot::load(&report.exports[0]).unwrap();

    for record in &snapshot.users {
        assert_eq!(record.key_union().len(), record.total_keys);
    }

    let alice = snapshot.user("s1").unwrap();
    let synced: Vec<_> = alice.keys[&KeyCategory::Synced]
        .iter()
        .map(Key::as_str)
        .collect();
    assert_eq!(synced, vec!["t1", "t3"]);
    assert!(alice.keys[&KeyCategory::SubscribedPlaylists].is_empty());
}

#[test]
fn test_controller_progress_is_monotonic() {
    let remote = make_remote();
    let mut controller =
        UserSyncController::new(remote.clone(), "alice", Arc::new(InMemoryObjectStore::new()))
            .with_options(SyncOptions {
                batch_size: 2,
                parallel_requests: 3,
            });

    let mut last = 0;
    while controller.state() != SyncState::Finished {
        let before = controller.state();
        let outcome = controller
            .sync_step(|p| {
                assert!(p.current <= p.total);
                assert!(p.current >= last);
                last = p.current;
            })
            .unwrap();

        if before == SyncState::SyncingObjects && outcome.state == SyncState::SyncedObjects {
            assert_eq!(controller.synced_objects(), controller.total_objects());
        }
    }

    assert_eq!(last, 5);
    assert_eq!(
        controller.user_key_store().unwrap().key_union().len(),
        controller.total_objects()
    );
}

#[test]
fn test_shared_store_add_is_idempotent_across_controllers() {
    let remote = make_remote();
    let store: SharedObjectStore = Arc::new(InMemoryObjectStore::new());

    for identifier in ["alice", "bob", "alice"] {
        let mut controller = UserSyncController::new(remote.clone(), identifier, store.clone());
        controller.run_to_completion(|_| {}).unwrap();
    }

    assert_eq!(store.count(), 6);
    assert!(!store.add(Key::new("pl:42"), json!({"key": "pl:42", "name": "Other"})));
    assert_eq!(store.get(&Key::new("pl:42")).unwrap()["name"], "Shared Mix");
}

#[test]
fn test_connection_error_abandons_account_without_export() {
    let dir = TempDir::new().unwrap();
    let remote = make_remote();
    remote.fail_next_keys(SyncError::connectivity("connection refused"));
    let mut driver = BackupDriver::new(remote.clone(), options(&dir));

    let report = driver.run(["alice", "bob"], &mut NoopObserver).unwrap();

    assert_eq!(report.completed, vec!["bob"]);
    assert_eq!(report.failed[0].1.classification(), "Connection Error");
    assert_eq!(report.exports.len(), 1);
    assert!(!dir.path().join("conservator-alice-s1.json").exists());
}

#[test]
fn test_canceled_account_is_dropped_and_batch_moves_on() {
    let dir = TempDir::new().unwrap();
    let remote = make_remote();
    let mut opts = options(&dir);
    opts.sync.batch_size = 1;
    let mut driver = BackupDriver::new(remote.clone(), opts);
    let mut observer = CancelOnProgress {
        target: "alice",
        token: driver.cancel_token(),
        fired: false,
    };

    let report = driver.run(["alice", "bob"], &mut observer).unwrap();

    assert!(observer.fired);
    assert_eq!(report.completed, vec!["bob"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "alice");
    assert!(matches!(report.failed[0].1, SyncError::Canceled));

    // No partial export for the canceled account
    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(files, vec!["conservator-bob-s2.json"]);
}
