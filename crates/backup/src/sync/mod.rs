//! Sync engine for resolving accounts and fetching their records
//!
//! One `UserSyncController` drives one account through a fixed sequence of
//! states, one externally-paced step at a time, so callers can render
//! progress and check for cancellation between steps.

mod controller;
mod progress;
mod timing;

pub use controller::UserSyncController;
pub use progress::{CancelToken, StepOutcome, SyncOptions, SyncProgress};
pub use timing::friendly_duration;
