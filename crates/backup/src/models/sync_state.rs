//! Sync state machine states

use serde::{Deserialize, Serialize};

/// Phase of one account's sync
///
/// States are ordered; a controller only ever moves forward by one state
/// per step and never leaves `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SyncState {
    Start,
    FindingUser,
    FoundUser,
    SyncingUserKeys,
    SyncedUserKeys,
    SyncingObjects,
    SyncedObjects,
    Finished,
}

impl SyncState {
    /// The state that follows this one, or `None` for `Finished`
    pub fn next(self) -> Option<SyncState> {
        match self {
            SyncState::Start => Some(SyncState::FindingUser),
            SyncState::FindingUser => Some(SyncState::FoundUser),
            SyncState::FoundUser => Some(SyncState::SyncingUserKeys),
            SyncState::SyncingUserKeys => Some(SyncState::SyncedUserKeys),
            SyncState::SyncedUserKeys => Some(SyncState::SyncingObjects),
            SyncState::SyncingObjects => Some(SyncState::SyncedObjects),
            SyncState::SyncedObjects => Some(SyncState::Finished),
            SyncState::Finished => None,
        }
    }

    pub fn is_finished(self) -> bool {
        self == SyncState::Finished
    }
}
