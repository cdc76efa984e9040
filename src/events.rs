//! Events emitted by the sweep and watch engines.
//!
//! The core never talks to a UI directly. Anything that wants progress or log
//! output subscribes by handing an [`EventSink`] to the engines.

use crate::error::OrganizeError;
use crate::sweep::SweepReport;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};
use tracing::trace;

/// Structured notification for the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrganizerEvent {
    /// One file of a sweep has been processed.
    Progress {
        directory: PathBuf,
        current: usize,
        total: usize,
    },

    /// A file landed in its category folder.
    FileMoved {
        file_name: String,
        category: String,
        dest_path: PathBuf,
    },

    /// A sweep finished; carries the full report.
    SweepComplete { report: SweepReport },

    /// A sweep found no eligible files.
    NothingToOrganize { directory: PathBuf },

    /// A sweep could not run at all.
    SweepFailed {
        directory: PathBuf,
        error: OrganizeError,
    },

    WatchStarted { directory: PathBuf },

    WatchStopped { directory: PathBuf },

    /// Starting or running a watch session failed.
    WatchError {
        directory: PathBuf,
        error: OrganizeError,
    },
}

/// Receiver side of the event interface.
///
/// Implementations must not block; events are emitted from sweep workers and
/// from the watch loop.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: OrganizerEvent);
}

impl EventSink for mpsc::UnboundedSender<OrganizerEvent> {
    fn emit(&self, event: OrganizerEvent) {
        if self.send(event).is_err() {
            trace!("Event receiver dropped; discarding event");
        }
    }
}

impl EventSink for broadcast::Sender<OrganizerEvent> {
    fn emit(&self, event: OrganizerEvent) {
        // No subscribers is not an error for a broadcast bus.
        let _ = self.send(event);
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: OrganizerEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_sender_delivers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.emit(OrganizerEvent::WatchStarted {
            directory: PathBuf::from("/downloads"),
        });

        match rx.try_recv().unwrap() {
            OrganizerEvent::WatchStarted { directory } => {
                assert_eq!(directory, PathBuf::from("/downloads"))
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.emit(OrganizerEvent::NothingToOrganize {
            directory: PathBuf::from("/empty"),
        });
    }

    #[test]
    fn test_event_json_shape() {
        let event = OrganizerEvent::FileMoved {
            file_name: "a.jpg".to_string(),
            category: "Images".to_string(),
            dest_path: PathBuf::from("/d/Images/a.jpg"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "file_moved");
        assert_eq!(json["category"], "Images");
    }
}
