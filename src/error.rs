//! Error types shared by the sweep and watch engines.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while organizing or watching a directory.
///
/// Per-file variants (`PermissionDenied`, `SourceVanished`,
/// `DestinationCollisionUnresolvable`, `Io`) end up inside `MoveOutcome::Failed`
/// and never abort a sweep. The remaining variants are directory-level and end
/// the operation that raised them.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrganizeError {
    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Directory vanished: {}", path.display())]
    DirectoryVanished { path: PathBuf },

    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("File vanished before it could be moved: {}", path.display())]
    SourceVanished { path: PathBuf },

    #[error("No free destination name for {} after {attempts} attempts", path.display())]
    DestinationCollisionUnresolvable { path: PathBuf, attempts: u32 },

    #[error("Directory is already being watched: {}", path.display())]
    DuplicateWatchSession { path: PathBuf },

    #[error("Notification stream failed for {}: {reason}", path.display())]
    NotificationStreamFailure { path: PathBuf, reason: String },

    #[error("IO error on {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },
}

impl OrganizeError {
    /// Maps an IO error on a single file to the matching per-file variant.
    pub fn from_io(path: &Path, err: &io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            io::ErrorKind::NotFound => Self::SourceVanished { path },
            _ => Self::Io {
                path,
                reason: err.to_string(),
            },
        }
    }

    /// Returns true for errors that end a whole sweep or watch session.
    pub fn is_directory_level(&self) -> bool {
        matches!(
            self,
            Self::NotADirectory { .. }
                | Self::DirectoryVanished { .. }
                | Self::DuplicateWatchSession { .. }
                | Self::NotificationStreamFailure { .. }
        )
    }
}

/// Result type for organize operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;
