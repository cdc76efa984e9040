//! Continuous organization of a directory.
//!
//! The watch engine subscribes to OS notifications for a directory
//! (non-recursive) and feeds new files through a [`SettleQueue`]. Once a file
//! has been quiet for the settle delay it is handed to
//! [`Sweeper::sweep_file`] on a blocking worker. The directory is never
//! re-scanned as a whole.
//!
//! Each watched directory gets one Tokio task that owns the OS subscription
//! and the settle timers. Cancelling the session's token ends the task, which
//! drops both.

use crate::error::{OrganizeError, OrganizeResult};
use crate::events::{EventSink, OrganizerEvent};
use crate::settle::SettleQueue;
use crate::sweep::Sweeper;
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle state of a directory with respect to watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Watching,
}

/// Handle to an active watch session, returned by
/// [`WatchEngine::start_watch`].
#[derive(Debug, Clone)]
pub struct WatchHandle {
    directory: PathBuf,
    id: u64,
    cancel: CancellationToken,
}

impl WatchHandle {
    /// Canonical path of the watched directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// False once the session was stopped or failed.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Resolves once the session was stopped or failed.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await
    }
}

#[derive(Debug)]
struct ActiveSession {
    id: u64,
    cancel: CancellationToken,
}

type SessionRegistry = Arc<Mutex<HashMap<PathBuf, ActiveSession>>>;

/// Starts and stops watch sessions; at most one per directory.
#[derive(Clone)]
pub struct WatchEngine {
    sweeper: Arc<Sweeper>,
    sink: Arc<dyn EventSink>,
    settle_delay: Duration,
    sessions: SessionRegistry,
    next_id: Arc<AtomicU64>,
}

impl WatchEngine {
    pub fn new(sweeper: Arc<Sweeper>, sink: Arc<dyn EventSink>, settle_delay: Duration) -> Self {
        Self {
            sweeper,
            sink,
            settle_delay,
            sessions: Arc::default(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Starts watching `directory` for new files.
    ///
    /// Must be called from within a Tokio runtime; the watch loop runs as a
    /// spawned task and this call returns immediately. Emits `WatchStarted`
    /// on success and `WatchError` on failure.
    ///
    /// # Errors
    ///
    /// * `NotADirectory` if `directory` does not exist or is not a directory
    /// * `DuplicateWatchSession` if the directory is already watched; the
    ///   running session is left alone
    /// * `NotificationStreamFailure` if the OS subscription cannot be created
    pub fn start_watch(&self, directory: &Path) -> OrganizeResult<WatchHandle> {
        self.try_start(directory).inspect_err(|error| {
            warn!(directory = %directory.display(), %error, "Failed to start watching");
            self.sink.emit(OrganizerEvent::WatchError {
                directory: directory.to_path_buf(),
                error: error.clone(),
            });
        })
    }

    fn try_start(&self, directory: &Path) -> OrganizeResult<WatchHandle> {
        let directory = canonical_directory(directory)?;

        let mut sessions = lock(&self.sessions);
        if sessions.contains_key(&directory) {
            return Err(OrganizeError::DuplicateWatchSession { path: directory });
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| {
                if events_tx.send(result).is_err() {
                    trace!("Watch loop gone; dropping notification");
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| stream_failure(&directory, &e))?;
        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| stream_failure(&directory, &e))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        sessions.insert(
            directory.clone(),
            ActiveSession {
                id,
                cancel: cancel.clone(),
            },
        );
        drop(sessions);

        info!(directory = %directory.display(), settle_ms = self.settle_delay.as_millis() as u64, "Watching directory");
        self.sink.emit(OrganizerEvent::WatchStarted {
            directory: directory.clone(),
        });

        let watch_loop = WatchLoop {
            directory: directory.clone(),
            id,
            sweeper: Arc::clone(&self.sweeper),
            sink: Arc::clone(&self.sink),
            sessions: Arc::clone(&self.sessions),
            queue: SettleQueue::new(self.settle_delay),
        };
        tokio::spawn(watch_loop.run(watcher, events_rx, cancel.clone()));

        Ok(WatchHandle {
            directory,
            id,
            cancel,
        })
    }

    /// Stops the session behind `handle`.
    ///
    /// Pending settle timers are dropped; sweeps already running finish.
    /// Calling this again, or after the session failed on its own, is a no-op.
    /// `WatchStopped` is emitted once.
    pub fn stop_watch(&self, handle: &WatchHandle) {
        let removed = {
            let mut sessions = lock(&self.sessions);
            match sessions.get(&handle.directory) {
                Some(session) if session.id == handle.id => sessions.remove(&handle.directory),
                _ => None,
            }
        };
        handle.cancel.cancel();

        if let Some(session) = removed {
            session.cancel.cancel();
            info!(directory = %handle.directory.display(), "Stopped watching");
            self.sink.emit(OrganizerEvent::WatchStopped {
                directory: handle.directory.clone(),
            });
        }
    }

    /// Stops every active session.
    pub fn stop_all(&self) {
        let drained: Vec<(PathBuf, ActiveSession)> = lock(&self.sessions).drain().collect();
        for (directory, session) in drained {
            session.cancel.cancel();
            info!(directory = %directory.display(), "Stopped watching");
            self.sink.emit(OrganizerEvent::WatchStopped { directory });
        }
    }

    pub fn state(&self, directory: &Path) -> WatchState {
        let Ok(directory) = canonical_directory(directory) else {
            return WatchState::Idle;
        };
        if lock(&self.sessions).contains_key(&directory) {
            WatchState::Watching
        } else {
            WatchState::Idle
        }
    }

    pub fn is_watching(&self, directory: &Path) -> bool {
        self.state(directory) == WatchState::Watching
    }

    /// Number of active sessions.
    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }
}

/// State owned by the task of one watch session.
struct WatchLoop {
    directory: PathBuf,
    id: u64,
    sweeper: Arc<Sweeper>,
    sink: Arc<dyn EventSink>,
    sessions: SessionRegistry,
    queue: SettleQueue,
}

impl WatchLoop {
    async fn run(
        mut self,
        watcher: RecommendedWatcher,
        mut events_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
        cancel: CancellationToken,
    ) {
        // Dropping the watcher at the end of this function ends the OS subscription.
        let _watcher = watcher;

        loop {
            let deadline = self.queue.next_deadline();
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!(directory = %self.directory.display(), pending = self.queue.len(), "Watch loop cancelled");
                    break;
                }

                received = events_rx.recv() => {
                    let result = match received {
                        Some(Ok(event)) => self.handle_event(event),
                        Some(Err(e)) => Err(stream_failure(&self.directory, &e)),
                        None => Err(OrganizeError::NotificationStreamFailure {
                            path: self.directory.clone(),
                            reason: "notification channel closed".to_string(),
                        }),
                    };
                    if let Err(error) = result {
                        self.fail(error);
                        break;
                    }
                }

                () = sleep_until_deadline(deadline) => self.fire_due(),
            }
        }

        self.queue.clear();
    }

    fn handle_event(&mut self, event: Event) -> OrganizeResult<()> {
        trace!(?event, "Notification");

        if !self.directory.is_dir() {
            return Err(OrganizeError::DirectoryVanished {
                path: self.directory.clone(),
            });
        }

        let now = Instant::now();
        match event.kind {
            EventKind::Create(CreateKind::Folder) => {}
            EventKind::Create(_) => {
                for path in event.paths {
                    self.schedule(path, now);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both)) => {
                if let Some(path) = event.paths.into_iter().last() {
                    self.schedule(path, now);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => {
                for path in &event.paths {
                    if self.queue.cancel(path) {
                        debug!(path = %path.display(), "Pending file went away");
                    }
                }
            }
            // Platforms that cannot pair renames report each side on its own.
            EventKind::Modify(ModifyKind::Name(_)) => {
                for path in event.paths {
                    if path.exists() {
                        self.schedule(path, now);
                    } else {
                        self.queue.cancel(&path);
                    }
                }
            }
            EventKind::Modify(_) | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
                for path in &event.paths {
                    if self.queue.touch(path, now) {
                        trace!(path = %path.display(), "Settle deadline pushed back");
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn schedule(&mut self, path: PathBuf, now: Instant) {
        if path.parent() != Some(self.directory.as_path()) || path.is_dir() {
            return;
        }
        if self.queue.schedule(path.clone(), now) {
            debug!(path = %path.display(), "New file; waiting for it to settle");
        }
    }

    fn fire_due(&mut self) {
        for path in self.queue.take_due(Instant::now()) {
            debug!(path = %path.display(), "File settled");
            let sweeper = Arc::clone(&self.sweeper);
            let sink = Arc::clone(&self.sink);
            let directory = self.directory.clone();
            let sweep_path = path.clone();
            let task = tokio::task::spawn_blocking(move || {
                sweeper.sweep_file(&directory, &sweep_path, sink.as_ref());
            });
            tokio::spawn(await_sweep(path, task));
        }
    }

    /// Ends the session after a terminal error, unless it was stopped already.
    fn fail(&mut self, error: OrganizeError) {
        let removed = {
            let mut sessions = lock(&self.sessions);
            match sessions.get(&self.directory) {
                Some(session) if session.id == self.id => sessions.remove(&self.directory),
                _ => None,
            }
        };
        let Some(session) = removed else {
            return;
        };
        session.cancel.cancel();

        warn!(directory = %self.directory.display(), %error, "Watch session failed");
        self.sink.emit(OrganizerEvent::WatchError {
            directory: self.directory.clone(),
            error,
        });
        self.sink.emit(OrganizerEvent::WatchStopped {
            directory: self.directory.clone(),
        });
    }
}

/// Waits for a single-file sweep. Returns false if the worker panicked or
/// was cancelled.
async fn await_sweep(path: PathBuf, task: JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Sweep worker failed");
            false
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

fn canonical_directory(directory: &Path) -> OrganizeResult<PathBuf> {
    match directory.canonicalize() {
        Ok(canonical) if canonical.is_dir() => Ok(canonical),
        _ => Err(OrganizeError::NotADirectory {
            path: directory.to_path_buf(),
        }),
    }
}

fn stream_failure(directory: &Path, err: &notify::Error) -> OrganizeError {
    OrganizeError::NotificationStreamFailure {
        path: directory.to_path_buf(),
        reason: err.to_string(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::events::NullSink;
    use crate::file_category::RuleTable;
    use std::fs;
    use tempfile::TempDir;

    fn engine() -> WatchEngine {
        let sweeper = Sweeper::new(
            Arc::new(RuleTable::default()),
            Arc::new(AppConfig::default().compile_filters().unwrap()),
        );
        WatchEngine::new(Arc::new(sweeper), Arc::new(NullSink), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_start_and_stop_transitions_state() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine();
        assert_eq!(engine.state(temp_dir.path()), WatchState::Idle);

        let handle = engine.start_watch(temp_dir.path()).unwrap();
        assert!(handle.is_running());
        assert_eq!(engine.state(temp_dir.path()), WatchState::Watching);

        engine.stop_watch(&handle);
        assert!(!handle.is_running());
        assert_eq!(engine.state(temp_dir.path()), WatchState::Idle);

        engine.stop_watch(&handle);
        assert_eq!(engine.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_missing_directory_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let err = engine().start_watch(&missing).unwrap_err();
        assert_eq!(err, OrganizeError::NotADirectory { path: missing });
    }

    #[tokio::test]
    async fn test_duplicate_session_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine();

        let first = engine.start_watch(temp_dir.path()).unwrap();
        // A different spelling of the same directory is still a duplicate.
        let dotted = temp_dir.path().join(".");
        let err = engine.start_watch(&dotted).unwrap_err();

        assert!(matches!(err, OrganizeError::DuplicateWatchSession { .. }));
        assert!(first.is_running());
        assert_eq!(engine.active_sessions(), 1);
        engine.stop_all();
        assert!(!first.is_running());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine();

        let first = engine.start_watch(temp_dir.path()).unwrap();
        engine.stop_watch(&first);
        let second = engine.start_watch(temp_dir.path()).unwrap();

        // The stale handle must not stop the new session.
        engine.stop_watch(&first);
        assert!(second.is_running());
        assert!(engine.is_watching(temp_dir.path()));
        engine.stop_watch(&second);
    }

    #[tokio::test]
    async fn test_failed_sweep_worker_is_reported() {
        let path = PathBuf::from("/downloads/a.jpg");

        let ok = tokio::task::spawn_blocking(|| {});
        assert!(await_sweep(path.clone(), ok).await);

        let panicked = tokio::task::spawn_blocking(|| panic!("sweep blew up"));
        assert!(!await_sweep(path, panicked).await);
    }
}
