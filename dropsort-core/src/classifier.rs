//! Classifier: readiness + rule set + optional content inspection

use crate::candidate::CandidateFile;
use crate::inspector::ContentInspector;
use crate::readiness::{Readiness, ReadinessChecker};
use crate::rules::RuleSet;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Where a file should go, if anywhere
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Move into this folder under the destination root
    Destination(String),
    /// No rule matched; leave the file alone
    Unmatched,
    /// Not ready yet; the caller must ask again later
    Deferred,
    /// The path is gone or is not a regular file
    Missing,
}

impl Classification {
    pub fn destination(&self) -> Option<&str> {
        match self {
            Classification::Destination(folder) => Some(folder),
            _ => None,
        }
    }
}

/// Decides the destination folder for files in the watch folder
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: RuleSet,
    readiness: ReadinessChecker,
    /// `None` disables content inspection entirely
    inspector: Option<ContentInspector>,
}

impl Classifier {
    pub fn new(rules: RuleSet, readiness: ReadinessChecker, inspector: Option<ContentInspector>) -> Self {
        Self {
            rules,
            readiness,
            inspector,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn readiness(&self) -> &ReadinessChecker {
        &self.readiness
    }

    /// Check readiness, then classify.
    pub fn classify_file(&self, path: &Path) -> Classification {
        match self.readiness.check(path) {
            Readiness::Missing => return Classification::Missing,
            Readiness::Pending => return Classification::Deferred,
            Readiness::Ready => {}
        }

        let candidate = match CandidateFile::from_path(path) {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return Classification::Missing,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Could not stat file");
                return Classification::Deferred;
            }
        };

        let excerpt = self.excerpt_for(&candidate);
        self.classify_candidate(&candidate, excerpt.as_deref())
    }

    /// Classify without readiness checks or filesystem access
    pub fn classify_candidate(&self, candidate: &CandidateFile, excerpt: Option<&str>) -> Classification {
        match self.rules.classify(candidate, excerpt) {
            Some(folder) => Classification::Destination(folder.to_string()),
            None => Classification::Unmatched,
        }
    }

    /// Content is only read when some rule could use it
    pub fn excerpt_for(&self, candidate: &CandidateFile) -> Option<String> {
        if !self.rules.has_content_rules() {
            return None;
        }
        let inspector = self.inspector.as_ref()?;
        if !inspector.supports(&candidate.path) {
            return None;
        }
        inspector.excerpt(&candidate.path)
    }
}
