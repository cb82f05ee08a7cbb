//! Snapshot of a file observed in the watch folder

use crate::Result;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A file that may be sorted, captured at the time of an event
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    /// Full path in the watch folder
    pub path: PathBuf,
    /// File name including extension
    pub file_name: String,
    /// Lowercased extension without the dot (empty if none)
    pub extension: String,
    /// Size in bytes when observed
    pub size: u64,
    /// Last modification time when observed
    pub modified: DateTime<Utc>,
}

impl CandidateFile {
    /// Build a candidate from the file's metadata.
    ///
    /// Returns `Ok(None)` if the path is gone or is not a regular file, so
    /// re-running on an already moved file is a no-op.
    pub fn from_path(path: &Path) -> Result<Option<Self>> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if !metadata.is_file() {
            return Ok(None);
        }

        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(Self {
            path: path.to_path_buf(),
            file_name: file_name_of(path),
            extension: extension_of(path),
            size: metadata.len(),
            modified,
        }))
    }

    /// Build a candidate without touching the filesystem
    pub fn from_name(name: &str) -> Self {
        let path = PathBuf::from(name);
        Self {
            file_name: file_name_of(&path),
            extension: extension_of(&path),
            path,
            size: 0,
            modified: Utc::now(),
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
