//! Step results, progress events and fetch tuning

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::models::SyncState;

/// Object-fetch progress for one account
///
/// `current <= total` always holds; `current` never decreases over the
/// lifetime of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    pub current: usize,
    pub total: usize,
}

impl SyncProgress {
    /// Completed fraction in `0.0..=1.0` (an empty fetch counts as complete)
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}

/// Result of one successful sync step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// State after the step
    pub state: SyncState,
    /// Whether the step moved to a new state
    pub transitioned: bool,
    /// Counters after an object batch, if one was fetched
    pub progress: Option<SyncProgress>,
}

/// Tuning for the object-fetch phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Maximum keys fetched per step
    pub batch_size: usize,
    /// Maximum concurrent requests a batch is split into
    pub parallel_requests: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            parallel_requests: 4,
        }
    }
}

/// Cooperative cancellation flag shared between a driver and its controllers
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the next step of any holder fails with `Canceled`
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previous cancellation request
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
