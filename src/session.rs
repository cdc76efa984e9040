//! Lifecycle of organizing one directory: initial sweep, then watching.
//!
//! The session controller is the only type a shell needs to talk to. It owns
//! the sweep and watch engines and forwards everything they report to one
//! [`EventSink`].

use crate::config::{AppConfig, CompiledFilters, ConfigError};
use crate::error::{OrganizeError, OrganizeResult};
use crate::events::{EventSink, OrganizerEvent};
use crate::file_category::RuleTable;
use crate::sweep::{SweepReport, Sweeper};
use crate::watcher::{WatchEngine, WatchHandle};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

/// Drives sweeps and the watch session for one directory at a time.
///
/// Starting a new directory implicitly stops the watch on the previous one.
pub struct SessionController {
    sweeper: Arc<Sweeper>,
    watch: WatchEngine,
    sink: Arc<dyn EventSink>,
    active: Mutex<Option<WatchHandle>>,
    // Held for the whole of `start` so overlapping calls run one after the other.
    starting: AsyncMutex<()>,
}

impl SessionController {
    pub fn new(
        rules: RuleTable,
        filters: CompiledFilters,
        settle_delay: Duration,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let sweeper = Arc::new(Sweeper::new(Arc::new(rules), Arc::new(filters)));
        let watch = WatchEngine::new(Arc::clone(&sweeper), Arc::clone(&sink), settle_delay);
        Self {
            sweeper,
            watch,
            sink,
            active: Mutex::new(None),
            starting: AsyncMutex::new(()),
        }
    }

    /// Builds a controller from a loaded configuration.
    pub fn from_config(config: &AppConfig, sink: Arc<dyn EventSink>) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.rule_table()?,
            config.compile_filters()?,
            config.settle_delay(),
            sink,
        ))
    }

    pub fn sweeper(&self) -> &Sweeper {
        &self.sweeper
    }

    pub fn watch_engine(&self) -> &WatchEngine {
        &self.watch
    }

    /// Sweeps `directory` once, then keeps watching it.
    ///
    /// Any previous watch of this controller is stopped first. The sweep runs
    /// on a blocking worker so the runtime stays responsive. Concurrent calls
    /// are serialized; the last one to finish owns the active watch.
    ///
    /// # Errors
    ///
    /// Directory-level failures of the sweep or of the watch start. Each one is
    /// also emitted as a `SweepFailed` or `WatchError` event.
    pub async fn start(&self, directory: &Path) -> OrganizeResult<WatchHandle> {
        let _starting = self.starting.lock().await;
        self.stop();

        info!(directory = %directory.display(), "Starting session");
        self.sweep_once(directory).await?;

        let handle = self.watch.start_watch(directory)?;
        let replaced = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle.clone());
        if let Some(previous) = replaced {
            self.watch.stop_watch(&previous);
        }
        Ok(handle)
    }

    /// Runs a single sweep of `directory` without watching it.
    ///
    /// # Errors
    ///
    /// Directory-level sweep failures, also emitted as `SweepFailed`.
    pub async fn sweep_once(&self, directory: &Path) -> OrganizeResult<SweepReport> {
        let sweeper = Arc::clone(&self.sweeper);
        let sink = Arc::clone(&self.sink);
        let dir = directory.to_path_buf();

        let result = tokio::task::spawn_blocking(move || sweeper.sweep(&dir, sink.as_ref()))
            .await
            .unwrap_or_else(|e| {
                Err(OrganizeError::Io {
                    path: directory.to_path_buf(),
                    reason: format!("sweep worker failed: {e}"),
                })
            });

        if let Err(error) = &result {
            warn!(directory = %directory.display(), %error, "Sweep failed");
            self.sink.emit(OrganizerEvent::SweepFailed {
                directory: directory.to_path_buf(),
                error: error.clone(),
            });
        }
        result
    }

    /// Stops the active watch, if any. Safe to call repeatedly.
    pub fn stop(&self) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = previous {
            self.watch.stop_watch(&handle);
        }
    }

    /// The directory currently being watched.
    ///
    /// Returns `None` after `stop` and after the session ended on its own,
    /// e.g. because the directory was deleted.
    pub fn active_directory(&self) -> Option<PathBuf> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|handle| handle.is_running())
            .map(|handle| handle.directory().to_path_buf())
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}
