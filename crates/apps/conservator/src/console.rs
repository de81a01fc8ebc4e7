//! Console rendering of sync progress

use std::io::Write;
use std::path::Path;

use backup::{
    StepOutcome, SyncError, SyncObserver, SyncProgress, SyncState, UserSyncController,
    friendly_duration,
};

const BAR_WIDTH: usize = 30;

/// Prints a status line per state transition and a progress bar while
/// objects are fetched
pub struct ConsoleObserver {
    /// Accounts are collected into one export at the end of the run
    shared: bool,
    /// Whether the cursor sits at the end of a progress bar line
    bar_active: bool,
}

impl ConsoleObserver {
    pub fn new(shared: bool) -> Self {
        Self {
            shared,
            bar_active: false,
        }
    }

    fn end_bar(&mut self) {
        if self.bar_active {
            println!();
            self.bar_active = false;
        }
    }
}

impl SyncObserver for ConsoleObserver {
    fn on_step(&mut self, controller: &UserSyncController, outcome: &StepOutcome) {
        if !outcome.transitioned {
            return;
        }

        match outcome.state {
            SyncState::Start => {}
            SyncState::FindingUser => {
                println!("Starting work for '{}'...", controller.user_identifier());
            }
            SyncState::FoundUser => {
                if let Some(user) = controller.user() {
                    println!("  * Resolved user {} ({})...", user.display_name, user.key);
                }
            }
            SyncState::SyncingUserKeys => println!("  * Fetching keys..."),
            SyncState::SyncedUserKeys => {
                if let Some(key_store) = controller.user_key_store() {
                    println!("    {} toplevel keys of interest", key_store.key_union().len());
                }
            }
            SyncState::SyncingObjects => println!("  * Fetching objects..."),
            SyncState::SyncedObjects => {
                self.end_bar();
                println!("    {} objects fetched", controller.total_objects());
            }
            SyncState::Finished => {
                if let Some(elapsed) = controller.elapsed() {
                    println!("  * Fetched in {}", friendly_duration(elapsed));
                }
                // Private exports report completion once written
                if self.shared {
                    println!("  * Done!");
                }
            }
        }
    }

    fn on_progress(&mut self, _identifier: &str, progress: SyncProgress) {
        print!("\r    {}", render_bar(progress));
        let _ = std::io::stdout().flush();
        self.bar_active = true;
    }

    fn on_failure(&mut self, _identifier: &str, error: &SyncError) {
        self.end_bar();
        println!("  ! {}", error.classification());
    }

    fn on_export_started(&mut self, path: &Path, shared: bool, users: usize, objects: usize) {
        println!("{}", export_banner(path, shared, users, objects));
    }

    fn on_exported(&mut self, _path: &Path, shared: bool) {
        println!("{}", if shared { "Done!" } else { "  * Done!" });
    }
}

/// Announce an export; a shared export names the users and objects it holds
fn export_banner(path: &Path, shared: bool, users: usize, objects: usize) -> String {
    if shared {
        format!(
            "Exporting data for {} users ({} total objects) to {}...",
            users,
            objects,
            path.display()
        )
    } else {
        format!("  * Exporting to {}...", path.display())
    }
}

/// Render `[#####     ] 50.0% (5 / 10)`
fn render_bar(progress: SyncProgress) -> String {
    let fraction = progress.fraction();
    let filled = ((BAR_WIDTH as f64) * fraction).round() as usize;

    format!(
        "[{}{}] {:.1}% ({} / {}) ",
        "#".repeat(filled),
        " ".repeat(BAR_WIDTH - filled),
        fraction * 100.0,
        progress.current,
        progress.total
    )
}
