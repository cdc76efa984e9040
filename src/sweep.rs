//! One-pass organization of a directory.
//!
//! A sweep looks at the immediate regular files of a directory, classifies
//! each one and moves the matched ones into their category folders. The watch
//! engine reuses the same machinery for single files through
//! [`Sweeper::sweep_file`].

use crate::config::CompiledFilters;
use crate::error::{OrganizeError, OrganizeResult};
use crate::events::{EventSink, OrganizerEvent};
use crate::file_category::{Classification, RuleTable};
use crate::file_organizer::{MoveOutcome, Mover, SkipReason};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Aggregate counters of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepCounts {
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
}

/// Everything that happened during one sweep, in enumeration order.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub directory: PathBuf,
    pub outcomes: Vec<MoveOutcome>,
    pub counts: SweepCounts,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SweepReport {
    fn new(directory: &Path) -> Self {
        let now = Utc::now();
        Self {
            directory: directory.to_path_buf(),
            outcomes: Vec::new(),
            counts: SweepCounts::default(),
            started_at: now,
            finished_at: now,
        }
    }

    fn push(&mut self, outcome: MoveOutcome) {
        match outcome {
            MoveOutcome::Moved { .. } => self.counts.moved += 1,
            MoveOutcome::Skipped { .. } => self.counts.skipped += 1,
            MoveOutcome::Failed { .. } => self.counts.failed += 1,
        }
        self.counts.total += 1;
        self.outcomes.push(outcome);
    }

    fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// True when the sweep found nothing to look at.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of moved files per category, sorted by category name.
    pub fn by_category(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.outcomes {
            if let MoveOutcome::Moved { category, .. } = outcome {
                *counts.entry(category.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// A file and the category it would go to, as reported by a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub source_path: PathBuf,
    pub classification: Classification,
}

/// Classifies and moves the files of a directory.
#[derive(Debug, Clone)]
pub struct Sweeper {
    rules: Arc<RuleTable>,
    filters: Arc<CompiledFilters>,
    mover: Mover,
}

impl Sweeper {
    pub fn new(rules: Arc<RuleTable>, filters: Arc<CompiledFilters>) -> Self {
        Self {
            rules,
            filters,
            mover: Mover::new(),
        }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Sweeps the immediate files of `directory`.
    ///
    /// Emits a `Progress` event per file, a `FileMoved` event per successful
    /// move and finally `SweepComplete`. A directory with no eligible files
    /// emits `NothingToOrganize` instead and returns an empty report.
    ///
    /// # Errors
    ///
    /// Only directory-level problems are errors (`NotADirectory`,
    /// `DirectoryVanished`, `PermissionDenied` on the directory itself). Per-file
    /// failures are recorded in the report.
    pub fn sweep(&self, directory: &Path, sink: &dyn EventSink) -> OrganizeResult<SweepReport> {
        info!(directory = %directory.display(), "Sweeping directory");
        let files = self.eligible_files(directory)?;
        Ok(self.process(directory, &files, sink))
    }

    /// Classifies and moves a single file of `directory`.
    ///
    /// Returns `None` without emitting anything when `path` no longer names an
    /// eligible file, e.g. because it was moved away before its settle delay
    /// ran out.
    pub fn sweep_file(
        &self,
        directory: &Path,
        path: &Path,
        sink: &dyn EventSink,
    ) -> Option<SweepReport> {
        if path.parent() != Some(directory) {
            debug!(path = %path.display(), "Ignoring path outside the swept directory");
            return None;
        }
        if !self.is_eligible(path) {
            debug!(path = %path.display(), "Path is no longer an eligible file");
            return None;
        }
        Some(self.process(directory, &[path.to_path_buf()], sink))
    }

    /// Reports what a sweep would do without touching the filesystem.
    pub fn plan(&self, directory: &Path) -> OrganizeResult<Vec<PlannedMove>> {
        let files = self.eligible_files(directory)?;
        Ok(files
            .into_iter()
            .map(|source_path| PlannedMove {
                classification: self.rules.classify_path(&source_path),
                source_path,
            })
            .collect())
    }

    fn process(&self, directory: &Path, files: &[PathBuf], sink: &dyn EventSink) -> SweepReport {
        let mut report = SweepReport::new(directory);
        let total = files.len();

        if total == 0 {
            report.finish();
            info!(directory = %directory.display(), "No files to organize");
            sink.emit(OrganizerEvent::NothingToOrganize {
                directory: directory.to_path_buf(),
            });
            return report;
        }

        for (index, path) in files.iter().enumerate() {
            let outcome = match self.rules.classify_path(path) {
                Classification::Matched { category } => self.mover.move_file(path, &category),
                Classification::Unmatched => {
                    debug!(path = %path.display(), "No matching category");
                    MoveOutcome::Skipped {
                        source_path: path.clone(),
                        reason: SkipReason::NoMatchingCategory,
                    }
                }
            };

            if let MoveOutcome::Moved {
                source_path,
                dest_path,
                category,
            } = &outcome
            {
                sink.emit(OrganizerEvent::FileMoved {
                    file_name: source_path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    category: category.clone(),
                    dest_path: dest_path.clone(),
                });
            }

            report.push(outcome);
            sink.emit(OrganizerEvent::Progress {
                directory: directory.to_path_buf(),
                current: index + 1,
                total,
            });
        }

        report.finish();
        info!(
            directory = %directory.display(),
            moved = report.counts.moved,
            skipped = report.counts.skipped,
            failed = report.counts.failed,
            "Sweep complete"
        );
        sink.emit(OrganizerEvent::SweepComplete {
            report: report.clone(),
        });
        report
    }

    /// Immediate regular files of `directory` that pass the filters, sorted by
    /// name. Symlinks and directories are never eligible.
    fn eligible_files(&self, directory: &Path) -> OrganizeResult<Vec<PathBuf>> {
        match fs::metadata(directory) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(OrganizeError::NotADirectory {
                    path: directory.to_path_buf(),
                });
            }
            Err(e) => return Err(directory_error(directory, &e)),
        }

        let entries = fs::read_dir(directory).map_err(|e| directory_error(directory, &e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| self.eligible_entry(directory, entry))
            .collect();

        if !directory.is_dir() {
            return Err(OrganizeError::DirectoryVanished {
                path: directory.to_path_buf(),
            });
        }

        files.sort();
        Ok(files)
    }

    /// Path of a listed entry if it should be organized. Entries that cannot
    /// be inspected are logged and left out.
    fn eligible_entry(&self, directory: &Path, entry: io::Result<fs::DirEntry>) -> Option<PathBuf> {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!(directory = %directory.display(), %error, "Failed to read directory entry");
                return None;
            }
        };
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(error) => {
                warn!(path = %entry.path().display(), %error, "Failed to read file type");
                return None;
            }
        };
        if file_type.is_file() && self.filters.should_include(Path::new(&entry.file_name())) {
            Some(entry.path())
        } else {
            None
        }
    }

    fn is_eligible(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name() else {
            return false;
        };
        fs::symlink_metadata(path).is_ok_and(|m| m.is_file())
            && self.filters.should_include(Path::new(file_name))
    }
}

fn directory_error(directory: &Path, err: &io::Error) -> OrganizeError {
    let path = directory.to_path_buf();
    match err.kind() {
        io::ErrorKind::NotFound => OrganizeError::NotADirectory { path },
        io::ErrorKind::PermissionDenied => OrganizeError::PermissionDenied { path },
        _ => OrganizeError::Io {
            path,
            reason: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::events::NullSink;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn sweeper() -> Sweeper {
        Sweeper::new(
            Arc::new(RuleTable::default()),
            Arc::new(AppConfig::default().compile_filters().unwrap()),
        )
    }

    #[test]
    fn test_sweep_mixed_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a.jpg"), "jpg").unwrap();
        fs::write(dir.join("b.txt"), "txt").unwrap();
        fs::write(dir.join("c.xyz"), "xyz").unwrap();

        let report = sweeper().sweep(dir, &NullSink).unwrap();

        assert_eq!(
            report.counts,
            SweepCounts {
                moved: 2,
                skipped: 1,
                failed: 0,
                total: 3
            }
        );
        assert!(dir.join("Images/a.jpg").exists());
        assert!(dir.join("Documents/b.txt").exists());
        assert!(dir.join("c.xyz").exists());
        assert_eq!(
            report.outcomes[2],
            MoveOutcome::Skipped {
                source_path: dir.join("c.xyz"),
                reason: SkipReason::NoMatchingCategory,
            }
        );
    }

    #[test]
    fn test_sweep_emits_progress_per_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a.jpg"), "").unwrap();
        fs::write(dir.join("b.unknown"), "").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        sweeper().sweep(dir, &tx).unwrap();

        let mut progress = Vec::new();
        let mut moved = Vec::new();
        let mut completed = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                OrganizerEvent::Progress { current, total, .. } => progress.push((current, total)),
                OrganizerEvent::FileMoved {
                    file_name,
                    category,
                    ..
                } => moved.push((file_name, category)),
                OrganizerEvent::SweepComplete { .. } => completed += 1,
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(progress, vec![(1, 2), (2, 2)]);
        assert_eq!(moved, vec![("a.jpg".to_string(), "Images".to_string())]);
        assert_eq!(completed, 1);
    }

    #[test]
    fn test_empty_directory_signals_nothing_to_do() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let report = sweeper().sweep(temp_dir.path(), &tx).unwrap();

        assert!(report.is_empty());
        assert!(matches!(
            rx.try_recv().unwrap(),
            OrganizerEvent::NothingToOrganize { .. }
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_sweep_missing_directory_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        let err = sweeper().sweep(&missing, &NullSink).unwrap_err();
        assert_eq!(err, OrganizeError::NotADirectory { path: missing });
    }

    #[test]
    fn test_sweep_file_path_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "").unwrap();

        assert!(matches!(
            sweeper().sweep(&file, &NullSink),
            Err(OrganizeError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_sweep_ignores_subdirectories_and_hidden_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::create_dir(dir.join("Images")).unwrap();
        fs::write(dir.join("Images/old.jpg"), "").unwrap();
        fs::create_dir(dir.join("nested.jpg")).unwrap();
        fs::write(dir.join(".hidden.jpg"), "").unwrap();

        let report = sweeper().sweep(dir, &NullSink).unwrap();

        assert!(report.is_empty());
        assert!(dir.join(".hidden.jpg").exists());
        assert!(dir.join("nested.jpg").is_dir());
    }

    #[test]
    fn test_sweep_file_single_entry() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("song.mp3"), "").unwrap();
        fs::write(dir.join("other.pdf"), "").unwrap();

        let report = sweeper()
            .sweep_file(dir, &dir.join("song.mp3"), &NullSink)
            .unwrap();

        assert_eq!(report.counts.total, 1);
        assert!(dir.join("Music/song.mp3").exists());
        assert!(dir.join("other.pdf").exists(), "only the given file is touched");
    }

    #[test]
    fn test_sweep_file_vanished_path_is_silent() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = sweeper().sweep_file(temp_dir.path(), &temp_dir.path().join("gone.jpg"), &tx);

        assert!(result.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_plan_does_not_move() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a.png"), "").unwrap();
        fs::write(dir.join("b.zzz"), "").unwrap();

        let plan = sweeper().plan(dir).unwrap();

        assert_eq!(
            plan,
            vec![
                PlannedMove {
                    source_path: dir.join("a.png"),
                    classification: Classification::matched("Images"),
                },
                PlannedMove {
                    source_path: dir.join("b.zzz"),
                    classification: Classification::Unmatched,
                },
            ]
        );
        assert!(dir.join("a.png").exists());
        assert!(!dir.join("Images").exists());
    }

    #[test]
    fn test_by_category() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for name in ["a.jpg", "b.png", "c.pdf"] {
            fs::write(dir.join(name), "").unwrap();
        }

        let report = sweeper().sweep(dir, &NullSink).unwrap();
        let by_category = report.by_category();

        assert_eq!(by_category.get("Images"), Some(&2));
        assert_eq!(by_category.get("Documents"), Some(&1));
    }

    #[test]
    fn test_unreadable_entry_is_left_out() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a.jpg"), "").unwrap();
        let sweeper = sweeper();

        let broken = Err(io::Error::other("entry vanished"));
        assert_eq!(sweeper.eligible_entry(dir, broken), None);

        let entry = fs::read_dir(dir).unwrap().next().unwrap();
        assert_eq!(sweeper.eligible_entry(dir, entry), Some(dir.join("a.jpg")));
    }
}
