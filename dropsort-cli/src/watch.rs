//! Filesystem watcher adapter
//!
//! Subscribes to the watch folder (non-recursive) and feeds paths of new or
//! renamed-in files into a bounded queue. All sorting happens on the
//! receiving side; this module only enqueues.

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Debounce window for bursts of events on the same file
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Keeps the subscription alive; dropping or stopping it unsubscribes
pub struct WatchHandle {
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    path: PathBuf,
}

impl WatchHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unsubscribe and wait for the event thread to finish.
    ///
    /// Takes the receiving end of the queue and closes it first, so an event
    /// thread blocked on a full queue is released before it is joined.
    pub fn stop(self, rx: mpsc::Receiver<PathBuf>) {
        tracing::debug!(path = %self.path.display(), "Stopping watcher");
        drop(rx);
        self.debouncer.stop();
    }
}

/// Start watching `path`, sending candidate file paths to `tx` in arrival order
pub fn start_watcher(path: &Path, tx: mpsc::Sender<PathBuf>) -> Result<WatchHandle> {
    let mut debouncer = new_debouncer(
        DEBOUNCE,
        None,
        move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
            Ok(events) => {
                for event in events {
                    for path in candidate_paths(&event) {
                        // Blocks when the queue is full; fails only once the loop is gone
                        if tx.blocking_send(path).is_err() {
                            return;
                        }
                    }
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::warn!(error = %error, "Watcher error");
                }
            }
        },
    )
    .context("Failed to create watcher")?;

    debouncer
        .watch(path, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", path.display()))?;

    Ok(WatchHandle {
        debouncer,
        path: path.to_path_buf(),
    })
}

/// Paths worth classifying for one event: created files, files renamed into
/// the folder, and files whose data changed (a download finishing in place).
pub fn candidate_paths(event: &Event) -> Vec<PathBuf> {
    let paths: Vec<&PathBuf> = match event.kind {
        EventKind::Create(_) => event.paths.iter().collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.last().into_iter().collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any))
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any) => event.paths.iter().collect(),
        _ => Vec::new(),
    };

    paths
        .into_iter()
        .filter(|path| !path.is_dir())
        .cloned()
        .collect()
}
