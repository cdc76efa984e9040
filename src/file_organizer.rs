/// File relocation into category directories.
///
/// This module moves a single file into a category subdirectory of the
/// directory it lives in. Moves never overwrite: a name collision is resolved
/// by appending a numeric suffix (`report (1).pdf`, `report (2).pdf`, ...).
use crate::error::OrganizeError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Upper bound on `name (n).ext` candidates tried before giving up.
pub const MAX_DISAMBIGUATION_ATTEMPTS: u32 = 1000;

/// Why a file was left where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The extension is not in the rule table.
    NoMatchingCategory,
    /// The file already lives in its category folder.
    AlreadyOrganized,
    /// The path is a directory, symlink or other non-regular entry.
    NotARegularFile,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingCategory => write!(f, "no matching category"),
            Self::AlreadyOrganized => write!(f, "already in its category folder"),
            Self::NotARegularFile => write!(f, "not a regular file"),
        }
    }
}

/// Result of a single move attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MoveOutcome {
    Moved {
        source_path: PathBuf,
        dest_path: PathBuf,
        category: String,
    },
    Skipped {
        source_path: PathBuf,
        reason: SkipReason,
    },
    Failed {
        source_path: PathBuf,
        error: OrganizeError,
    },
}

impl MoveOutcome {
    /// The path the outcome refers to.
    pub fn source_path(&self) -> &Path {
        match self {
            Self::Moved { source_path, .. }
            | Self::Skipped { source_path, .. }
            | Self::Failed { source_path, .. } => source_path,
        }
    }

    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Moves files into category subdirectories.
///
/// Collision resolution and the rename itself run under a lock held per
/// watched directory, so two concurrent moves into the same folder can never
/// pick the same free name. Clones share the same locks.
#[derive(Debug, Clone, Default)]
pub struct Mover {
    locks: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl Mover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `file_path` into `<parent>/<category>/`.
    ///
    /// The category directory is created if it does not exist yet. Any IO
    /// problem is reported as `MoveOutcome::Failed`; this function does not
    /// return errors.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use autotidy::file_organizer::{MoveOutcome, Mover};
    /// use std::path::Path;
    ///
    /// let mover = Mover::new();
    /// match mover.move_file(Path::new("/home/user/Downloads/cat.png"), "Images") {
    ///     MoveOutcome::Moved { dest_path, .. } => println!("Moved to {}", dest_path.display()),
    ///     other => eprintln!("Not moved: {:?}", other),
    /// }
    /// ```
    pub fn move_file(&self, file_path: &Path, category: &str) -> MoveOutcome {
        let source_path = file_path.to_path_buf();

        let metadata = match fs::symlink_metadata(file_path) {
            Ok(metadata) => metadata,
            Err(e) => {
                return MoveOutcome::Failed {
                    error: OrganizeError::from_io(file_path, &e),
                    source_path,
                };
            }
        };
        if !metadata.is_file() {
            return MoveOutcome::Skipped {
                source_path,
                reason: SkipReason::NotARegularFile,
            };
        }

        let (Some(parent), Some(file_name)) = (file_path.parent(), file_path.file_name()) else {
            return MoveOutcome::Skipped {
                source_path,
                reason: SkipReason::NotARegularFile,
            };
        };

        // Idempotence guard: the file is already inside its own category folder.
        if parent.file_name().is_some_and(|name| name == category) {
            return MoveOutcome::Skipped {
                source_path,
                reason: SkipReason::AlreadyOrganized,
            };
        }

        let category_path = parent.join(category);
        let lock = self.lock_for(parent);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Err(e) = fs::create_dir_all(&category_path) {
            warn!(path = %category_path.display(), error = %e, "Failed to create category directory");
            return MoveOutcome::Failed {
                error: OrganizeError::from_io(&category_path, &e),
                source_path,
            };
        }

        let dest_path = match resolve_destination(&category_path, Path::new(file_name)) {
            Ok(dest_path) => dest_path,
            Err(error) => {
                warn!(path = %file_path.display(), %error, "Giving up on destination name");
                return MoveOutcome::Failed { source_path, error };
            }
        };

        if let Err(e) = fs::rename(file_path, &dest_path) {
            warn!(
                source = %file_path.display(),
                destination = %dest_path.display(),
                error = %e,
                "Failed to move file"
            );
            return MoveOutcome::Failed {
                error: OrganizeError::from_io(file_path, &e),
                source_path,
            };
        }

        info!(
            source = %file_path.display(),
            destination = %dest_path.display(),
            category,
            "Moved file"
        );
        MoveOutcome::Moved {
            source_path,
            dest_path,
            category: category.to_string(),
        }
    }

    /// Lock guarding collision resolution and renames in `dir`.
    ///
    /// Keyed on the canonical path, so every spelling of a directory shares
    /// one lock.
    fn lock_for(&self, dir: &Path) -> Arc<Mutex<()>> {
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        let key = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key).or_default())
    }
}

/// Picks the first free name for `file_name` inside `dir`.
///
/// Returns `dir/file_name` when that is free, otherwise the first free
/// `stem (n).ext` with `n` counting up from 1.
pub fn resolve_destination(dir: &Path, file_name: &Path) -> Result<PathBuf, OrganizeError> {
    let candidate = dir.join(file_name);
    if !exists_no_follow(&candidate) {
        return Ok(candidate);
    }

    for attempt in 1..=MAX_DISAMBIGUATION_ATTEMPTS {
        let candidate = dir.join(disambiguated_name(file_name, attempt));
        if !exists_no_follow(&candidate) {
            debug!(path = %candidate.display(), attempt, "Resolved name collision");
            return Ok(candidate);
        }
    }

    Err(OrganizeError::DestinationCollisionUnresolvable {
        path: dir.join(file_name),
        attempts: MAX_DISAMBIGUATION_ATTEMPTS,
    })
}

/// Builds `stem (n).ext`, or `stem (n)` for names without an extension.
pub fn disambiguated_name(file_name: &Path, n: u32) -> String {
    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    }
}

fn exists_no_follow(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}
