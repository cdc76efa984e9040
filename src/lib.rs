//! autotidy - keeps a directory organized by file type
//!
//! This library sorts the files of a directory into category subfolders
//! (`Images/`, `Documents/`, ...) based on their extension, then watches the
//! directory and organizes new files once they have finished being written.
//! Progress and results are reported as [`OrganizerEvent`]s to an
//! [`EventSink`] chosen by the caller.

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod file_category;
pub mod file_organizer;
pub mod output;
pub mod session;
pub mod settle;
pub mod sweep;
pub mod watcher;

pub use config::{AppConfig, CompiledFilters, ConfigError};
pub use error::{OrganizeError, OrganizeResult};
pub use events::{EventSink, NullSink, OrganizerEvent};
pub use file_category::{Category, Classification, RuleTable};
pub use file_organizer::{MoveOutcome, Mover, SkipReason};
pub use session::SessionController;
pub use settle::SettleQueue;
pub use sweep::{PlannedMove, SweepCounts, SweepReport, Sweeper};
pub use watcher::{WatchEngine, WatchHandle, WatchState};

pub use cli::{Args, run};
