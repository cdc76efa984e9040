//! Command-line interface for autotidy.
//!
//! Parses the arguments, loads the configuration and drives a
//! [`SessionController`], rendering its events on the terminal.

use crate::config::AppConfig;
use crate::events::{EventSink, OrganizerEvent};
use crate::output::{EventRenderer, OutputFormatter};
use crate::session::SessionController;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Sorts the files of a directory into category folders and keeps it tidy.
#[derive(Debug, Clone, Parser)]
#[command(name = "autotidy", version, about)]
pub struct Args {
    /// Directory to organize
    pub directory: PathBuf,

    /// Organize the directory once and exit instead of watching it
    #[arg(long)]
    pub once: bool,

    /// Show what would be moved without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Quiet period in milliseconds before a new file is organized
    #[arg(long, value_name = "MS")]
    pub settle_ms: Option<u64>,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Runs autotidy with the given arguments.
///
/// Without `--once` or `--dry-run` this sweeps the directory, then watches it
/// until Ctrl-C is pressed or the directory disappears.
///
/// # Examples
///
/// ```no_run
/// use autotidy::cli::{run, Args};
/// use clap::Parser;
///
/// # async fn demo() {
/// let args = Args::parse_from(["autotidy", "/path/to/downloads", "--once"]);
/// if let Err(e) = run(args).await {
///     eprintln!("Error: {}", e);
/// }
/// # }
/// ```
pub async fn run(args: Args) -> Result<(), String> {
    if !args.directory.is_dir() {
        return Err(format!(
            "'{}' is not a valid directory",
            args.directory.display()
        ));
    }

    let mut config = AppConfig::load(args.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(settle_ms) = args.settle_ms {
        config.settle_ms = settle_ms;
    }
    debug!(?config, "Configuration loaded");

    let (tx, mut rx) = mpsc::unbounded_channel::<OrganizerEvent>();
    let sink: Arc<dyn EventSink> = Arc::new(tx);
    let controller = SessionController::from_config(&config, sink).map_err(|e| e.to_string())?;

    if args.dry_run {
        let plan = controller
            .sweeper()
            .plan(&args.directory)
            .map_err(|e| e.to_string())?;
        OutputFormatter::plan(&args.directory, &plan);
        return Ok(());
    }

    let json = args.json;
    let renderer = tokio::spawn(async move {
        let mut renderer = EventRenderer::new(json);
        while let Some(event) = rx.recv().await {
            renderer.render(&event);
        }
    });

    let result = if args.once {
        controller
            .sweep_once(&args.directory)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    } else {
        watch_until_interrupted(&controller, &args).await
    };

    controller.stop();
    drop(controller);
    // Watch tasks drop their senders shortly after being cancelled.
    let _ = tokio::time::timeout(Duration::from_secs(2), renderer).await;

    result
}

async fn watch_until_interrupted(
    controller: &SessionController,
    args: &Args,
) -> Result<(), String> {
    let handle = controller
        .start(&args.directory)
        .await
        .map_err(|e| e.to_string())?;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| format!("Failed to listen for Ctrl-C: {}", e))?;
            info!("Interrupted, shutting down");
            Ok(())
        }
        _ = handle.stopped() => {
            Err(format!("Stopped watching '{}'", handle.directory().display()))
        }
    }
}
