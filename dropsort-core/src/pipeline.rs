//! Per-file processing: classify, move, and track files that are not ready
//!
//! ```text
//! Observed -> Pending | Ready -> Classified (destination | unmatched) -> Moved | LeftInPlace
//!                 |                                                   \-> Failed
//!                 \-> (too many deferrals) -> Unresolved
//! ```
//!
//! The pipeline is driven by one caller at a time; files are processed in
//! the order they are handed in.

use crate::classifier::{Classification, Classifier};
use crate::mover::Mover;
use crate::SortError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default number of readiness checks before a file is given up on
pub const DEFAULT_MAX_READINESS_ATTEMPTS: u32 = 5;

/// Terminal or intermediate state of one processed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Moved {
        from: PathBuf,
        to: PathBuf,
        renamed: bool,
    },
    /// No rule matched
    LeftInPlace { path: PathBuf },
    /// Not ready; queued for another attempt
    Deferred { path: PathBuf, attempt: u32 },
    /// Never became ready; left in place until a new event arrives for it
    Unresolved { path: PathBuf, attempts: u32 },
    /// Gone or not a regular file
    Skipped { path: PathBuf },
    /// Move failed; the file is still in the watch folder
    Failed { path: PathBuf, error: String },
}

impl Outcome {
    pub fn path(&self) -> &Path {
        match self {
            Outcome::Moved { from, .. } => from,
            Outcome::LeftInPlace { path }
            | Outcome::Deferred { path, .. }
            | Outcome::Unresolved { path, .. }
            | Outcome::Skipped { path }
            | Outcome::Failed { path, .. } => path,
        }
    }

    pub fn is_moved(&self) -> bool {
        matches!(self, Outcome::Moved { .. })
    }
}

/// Running counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub moved: usize,
    pub renamed: usize,
    pub left_in_place: usize,
    pub deferred: usize,
    pub unresolved: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Stats {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Moved { renamed, .. } => {
                self.moved += 1;
                if *renamed {
                    self.renamed += 1;
                }
            }
            Outcome::LeftInPlace { .. } => self.left_in_place += 1,
            Outcome::Deferred { .. } => self.deferred += 1,
            Outcome::Unresolved { .. } => self.unresolved += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Classifier + mover + retry bookkeeping
#[derive(Debug)]
pub struct Pipeline {
    classifier: Classifier,
    mover: Mover,
    max_attempts: u32,
    /// Deferred paths and how many times they were found not ready
    pending: BTreeMap<PathBuf, u32>,
    /// Paths that gave up waiting; reconsidered on their next event
    unresolved: BTreeSet<PathBuf>,
    stats: Stats,
}

impl Pipeline {
    pub fn new(classifier: Classifier, mover: Mover, max_attempts: u32) -> Self {
        Self {
            classifier,
            mover,
            max_attempts: max_attempts.max(1),
            pending: BTreeMap::new(),
            unresolved: BTreeSet::new(),
            stats: Stats::default(),
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn mover(&self) -> &Mover {
        &self.mover
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn pending_paths(&self) -> Vec<PathBuf> {
        self.pending.keys().cloned().collect()
    }

    pub fn unresolved_paths(&self) -> Vec<PathBuf> {
        self.unresolved.iter().cloned().collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Process one path to completion. Never returns an error: failures are
    /// logged and reported as [`Outcome::Failed`].
    pub fn process(&mut self, path: &Path) -> Outcome {
        let outcome = match self.classifier.classify_file(path) {
            Classification::Missing => {
                self.settle(path);
                tracing::debug!(path = %path.display(), "Gone before processing");
                Outcome::Skipped {
                    path: path.to_path_buf(),
                }
            }
            Classification::Deferred => self.defer(path),
            Classification::Unmatched => {
                self.settle(path);
                tracing::debug!(path = %path.display(), "No rule matched, leaving in place");
                Outcome::LeftInPlace {
                    path: path.to_path_buf(),
                }
            }
            Classification::Destination(folder) => {
                self.settle(path);
                match self.mover.move_file(path, &folder) {
                    Ok(moved) => Outcome::Moved {
                        from: path.to_path_buf(),
                        to: moved.path,
                        renamed: moved.renamed,
                    },
                    Err(e) => {
                        tracing::error!(path = %path.display(), folder = %folder, error = %e, "Move failed, file left in place");
                        Outcome::Failed {
                            path: path.to_path_buf(),
                            error: e.to_string(),
                        }
                    }
                }
            }
        };

        self.stats.record(&outcome);
        outcome
    }

    /// Re-process every deferred path
    pub fn retry_pending(&mut self) -> Vec<Outcome> {
        self.forget_missing();
        let paths = self.pending_paths();
        paths.iter().map(|path| self.process(path)).collect()
    }

    /// Drop unresolved paths that no longer exist
    pub fn forget_missing(&mut self) {
        self.unresolved.retain(|path| path.is_file());
    }

    /// Process every regular file directly inside `dir`, in name order
    pub fn scan_existing(&mut self, dir: &Path) -> crate::Result<Vec<Outcome>> {
        let files = Self::existing_files(dir)?;
        Ok(files.iter().map(|path| self.process(path)).collect())
    }

    /// Regular files directly inside `dir`, sorted by name
    pub fn existing_files(dir: &Path) -> crate::Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(SortError::Io(e.into()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    fn defer(&mut self, path: &Path) -> Outcome {
        self.unresolved.remove(path);
        let attempts = self.pending.entry(path.to_path_buf()).or_insert(0);
        *attempts += 1;
        let attempt = *attempts;

        if attempt >= self.max_attempts {
            self.pending.remove(path);
            self.unresolved.insert(path.to_path_buf());
            let err = SortError::ReadinessTimeout {
                path: path.to_path_buf(),
                attempts: attempt,
            };
            tracing::warn!(error = %err, "Leaving file unresolved until it changes again");
            return Outcome::Unresolved {
                path: path.to_path_buf(),
                attempts: attempt,
            };
        }

        tracing::debug!(path = %path.display(), attempt, "Not ready, will retry");
        Outcome::Deferred {
            path: path.to_path_buf(),
            attempt,
        }
    }

    /// Drop any retry state once a path reaches a terminal state
    fn settle(&mut self, path: &Path) {
        self.pending.remove(path);
        self.unresolved.remove(path);
    }
}
