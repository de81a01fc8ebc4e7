//! Error taxonomy for sync, fetch and export operations

use std::path::PathBuf;

use crate::models::SyncState;

/// Errors surfaced by the sync controller, the remote client and the exporter
///
/// The controller never recovers from any of these internally; a failing step
/// is reported to the caller unmodified and the controller must be discarded.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Connection error: {message}")]
    Connectivity { message: String },

    #[error("User not found: {identifier}")]
    UserNotFound { identifier: String },

    #[error("Operation canceled")]
    Canceled,

    #[error("Snapshot I/O error at {}: {source}", .path.display())]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid snapshot: {message}")]
    Snapshot { message: String },

    #[error("Operation not valid in sync state {state:?}")]
    InvalidState { state: SyncState },
}

impl SyncError {
    pub fn connectivity(message: impl Into<String>) -> Self {
        SyncError::Connectivity {
            message: message.into(),
        }
    }

    pub fn user_not_found(identifier: impl Into<String>) -> Self {
        SyncError::UserNotFound {
            identifier: identifier.into(),
        }
    }

    pub fn export_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::ExportIo {
            path: path.into(),
            source,
        }
    }

    /// Short human-readable classification for console output
    pub fn classification(&self) -> String {
        match self {
            SyncError::Connectivity { .. } => "Connection Error".to_string(),
            SyncError::UserNotFound { identifier } => {
                format!("Could not find user {}", identifier)
            }
            SyncError::Canceled => "Canceled".to_string(),
            SyncError::ExportIo { path, .. } => {
                format!("Could not write {}", path.display())
            }
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Snapshot {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            SyncError::connectivity("reset by peer").classification(),
            "Connection Error"
        );
        assert_eq!(
            SyncError::user_not_found("doesnotexist").classification(),
            "Could not find user doesnotexist"
        );
        assert_eq!(SyncError::Canceled.classification(), "Canceled");
    }

    #[test]
    fn test_export_io_display_includes_path() {
        let err = SyncError::export_io(
            "/missing/dir/out.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"),
        );
        assert!(err.to_string().contains("/missing/dir/out.json"));
    }
}
