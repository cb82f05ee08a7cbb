//! Readiness checks: is a file fully written and safe to move?

use crate::candidate::file_name_of;
use crate::{PARTIAL_DOWNLOAD_SUFFIXES, TEMP_PREFIXES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Result of a readiness check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Readiness {
    /// Stable and not an in-progress download
    Ready,
    /// Still being written, or named like a partial download; check again later
    Pending,
    /// Gone, or not a regular file
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sample {
    size: u64,
    modified: Option<SystemTime>,
}

/// Decides whether a file may be moved yet
#[derive(Debug, Clone)]
pub struct ReadinessChecker {
    /// Lowercased suffixes marking partial downloads (".crdownload", ".part", ...)
    partial_suffixes: Vec<String>,
    /// Name prefixes of temporary files ("~$")
    temp_prefixes: Vec<String>,
    /// Delay between the two size samples
    poll_interval: Duration,
}

impl Default for ReadinessChecker {
    fn default() -> Self {
        Self {
            partial_suffixes: PARTIAL_DOWNLOAD_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            temp_prefixes: TEMP_PREFIXES.iter().map(|s| s.to_string()).collect(),
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl ReadinessChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the partial-download suffixes. A missing leading dot is added.
    pub fn with_partial_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.partial_suffixes = suffixes
            .into_iter()
            .map(|s| normalize_suffix(s.as_ref()))
            .filter(|s| s.len() > 1)
            .collect();
        self
    }

    pub fn with_temp_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.temp_prefixes = prefixes
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Named like an in-flight download or an editor lock file
    pub fn is_partial_download(&self, path: &Path) -> bool {
        let name = file_name_of(path);
        let lower = name.to_lowercase();

        self.partial_suffixes.iter().any(|suffix| lower.ends_with(suffix.as_str()))
            || self.temp_prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// Sample size and mtime twice, `poll_interval` apart. Never errors.
    pub fn check(&self, path: &Path) -> Readiness {
        let first = match sample(path) {
            Some(s) => s,
            None => return Readiness::Missing,
        };

        if self.is_partial_download(path) {
            tracing::debug!(path = %path.display(), "Partial download name, not ready");
            return Readiness::Pending;
        }

        if !self.poll_interval.is_zero() {
            std::thread::sleep(self.poll_interval);
        }

        match sample(path) {
            None => Readiness::Missing,
            Some(second) if second == first => Readiness::Ready,
            Some(second) => {
                tracing::debug!(
                    path = %path.display(),
                    before = first.size,
                    after = second.size,
                    "File still changing"
                );
                Readiness::Pending
            }
        }
    }

    pub fn is_ready(&self, path: &Path) -> bool {
        self.check(path) == Readiness::Ready
    }
}

fn sample(path: &Path) -> Option<Sample> {
    let metadata = std::fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    Some(Sample {
        size: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

fn normalize_suffix(suffix: &str) -> String {
    let lower = suffix.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}
