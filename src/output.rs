//! Output formatting and styling module.
//!
//! Renders [`OrganizerEvent`]s for a terminal: colored log lines, a progress
//! bar for multi-file sweeps and a summary table, or one JSON object per line
//! when machine-readable output is requested.

use crate::events::OrganizerEvent;
use crate::file_category::Classification;
use crate::file_organizer::MoveOutcome;
use crate::sweep::{PlannedMove, SweepReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;

/// Consistent styling for all CLI output.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` files.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints a table of moved files per category.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use autotidy::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("Documents".to_string(), 15);
    /// counts.insert("Images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let width = category_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = width
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Prints the result of a dry run.
    pub fn plan(directory: &Path, plan: &[PlannedMove]) {
        Self::dry_run_notice(&format!("Analyzing contents of: {}", directory.display()));
        if plan.is_empty() {
            Self::info("No files to organize in this folder.");
            return;
        }

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for planned in plan {
            let name = file_name(&planned.source_path);
            match &planned.classification {
                Classification::Matched { category } => {
                    println!(" - {} → {}/", name, category);
                    *counts.entry(category.clone()).or_insert(0) += 1;
                }
                Classification::Unmatched => {
                    println!(" - {} {}", name, "(no matching category, stays)".dimmed());
                }
            }
        }

        let total = counts.values().sum();
        Self::summary_table(&counts, total);
        Self::dry_run_notice("No files were modified.");
    }
}

/// Turns the event stream into terminal output.
pub struct EventRenderer {
    json: bool,
    progress: Option<ProgressBar>,
}

impl EventRenderer {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            progress: None,
        }
    }

    pub fn render(&mut self, event: &OrganizerEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => OutputFormatter::error(&format!("Could not encode event: {}", e)),
            }
            return;
        }

        match event {
            OrganizerEvent::Progress { current, total, .. } => {
                // Single-file sweeps from the watcher do not get a bar.
                if *total > 1 {
                    let pb = self
                        .progress
                        .get_or_insert_with(|| OutputFormatter::create_progress_bar(*total as u64));
                    pb.set_position(*current as u64);
                }
            }
            OrganizerEvent::FileMoved {
                file_name,
                category,
                ..
            } => {
                let line = format!("{} Moved: {} → {}", "✓".green(), file_name, category);
                match &self.progress {
                    Some(pb) => pb.println(line),
                    None => println!("{}", line),
                }
            }
            OrganizerEvent::SweepComplete { report } => {
                if let Some(pb) = self.progress.take() {
                    pb.finish_and_clear();
                }
                Self::report(report);
            }
            OrganizerEvent::NothingToOrganize { directory } => {
                OutputFormatter::info(&format!(
                    "No files to organize in {}.",
                    directory.display()
                ));
            }
            OrganizerEvent::SweepFailed { directory, error } => {
                self.progress.take();
                OutputFormatter::error(&format!(
                    "Could not organize {}: {}",
                    directory.display(),
                    error
                ));
            }
            OrganizerEvent::WatchStarted { directory } => {
                OutputFormatter::info(&format!(
                    "Watching '{}' for new files... (Ctrl-C to stop)",
                    directory.display()
                ));
            }
            OrganizerEvent::WatchStopped { directory } => {
                OutputFormatter::info(&format!("Stopped watching '{}'.", directory.display()));
            }
            OrganizerEvent::WatchError { directory, error } => {
                OutputFormatter::error(&format!(
                    "Watching '{}' failed: {}",
                    directory.display(),
                    error
                ));
            }
        }
    }

    fn report(report: &SweepReport) {
        for outcome in &report.outcomes {
            if let MoveOutcome::Failed { source_path, error } = outcome {
                OutputFormatter::error(&format!("{}: {}", file_name(source_path), error));
            }
        }

        // Incremental sweeps only log the move itself.
        if report.counts.total <= 1 && report.counts.failed == 0 {
            return;
        }

        OutputFormatter::summary_table(&report.by_category(), report.counts.moved);
        if report.counts.skipped > 0 {
            OutputFormatter::warning(&format!(
                "{} {} left in place",
                report.counts.skipped,
                plural(report.counts.skipped)
            ));
        }
        if report.counts.failed > 0 {
            OutputFormatter::warning(&format!(
                "{} {} could not be organized",
                report.counts.failed,
                plural(report.counts.failed)
            ));
        } else {
            OutputFormatter::success(&format!(
                "Organized {} {} successfully!",
                report.counts.moved,
                plural(report.counts.moved)
            ));
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
