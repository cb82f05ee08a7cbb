//! Sorter configuration: JSON file, defaults, validation and builders

use crate::classifier::Classifier;
use crate::inspector::{ContentInspector, DEFAULT_EXCERPT_BYTES};
use crate::mover::Mover;
use crate::pipeline::{Pipeline, DEFAULT_MAX_READINESS_ATTEMPTS};
use crate::readiness::ReadinessChecker;
use crate::rules::{Rule, RuleSet};
use crate::{Result, SortError, PARTIAL_DOWNLOAD_SUFFIXES, TEMP_PREFIXES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sorter configuration, loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SorterConfig {
    /// Folder to watch for new files
    pub watch_path: PathBuf,
    /// Root under which destination folders are created
    pub dest_root: PathBuf,
    /// Ordered routing rules; first match wins
    pub rules: Vec<Rule>,
    /// Read file content for content rules
    pub content_inspection: bool,
    /// Name suffixes of in-progress downloads
    pub partial_download_suffixes: Vec<String>,
    /// Name prefixes of temporary/lock files
    pub temp_prefixes: Vec<String>,
    /// Delay between the two size samples of a readiness check
    pub stability_poll_interval_ms: u64,
    /// Maximum excerpt size for content rules
    pub excerpt_max_bytes: usize,
    /// Readiness checks before a file is left unresolved
    pub max_readiness_attempts: u32,
    /// How often deferred files are re-checked
    pub retry_interval_ms: u64,
    /// Capacity of the event queue between watcher and sorter
    pub queue_capacity: usize,
    /// Sort files already in the watch folder at startup
    pub scan_existing_on_start: bool,
}

impl Default for SorterConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            watch_path: dirs::download_dir().unwrap_or_else(|| home.join("Downloads")),
            dest_root: home.join("SortedDownloads"),
            rules: RuleSet::default_rules(),
            content_inspection: true,
            partial_download_suffixes: PARTIAL_DOWNLOAD_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            temp_prefixes: TEMP_PREFIXES.iter().map(|s| s.to_string()).collect(),
            stability_poll_interval_ms: 2000,
            excerpt_max_bytes: DEFAULT_EXCERPT_BYTES,
            max_readiness_attempts: DEFAULT_MAX_READINESS_ATTEMPTS,
            retry_interval_ms: 5000,
            queue_capacity: 256,
            scan_existing_on_start: true,
        }
    }
}

impl SorterConfig {
    /// Create a new SorterConfig with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SortError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| SortError::Config(format!("invalid config: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn with_watch_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.watch_path = path.into();
        self
    }

    pub fn with_dest_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.dest_root = path.into();
        self
    }

    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_content_inspection(mut self, enabled: bool) -> Self {
        self.content_inspection = enabled;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.stability_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_max_readiness_attempts(mut self, attempts: u32) -> Self {
        self.max_readiness_attempts = attempts;
        self
    }

    pub fn stability_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stability_poll_interval_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms.max(100))
    }

    /// Startup checks. Every failure here is fatal.
    pub fn validate(&self) -> Result<()> {
        if !self.watch_path.is_dir() {
            return Err(SortError::Config(format!(
                "watch path {} does not exist or is not a directory",
                self.watch_path.display()
            )));
        }

        if self.dest_root.as_os_str().is_empty() {
            return Err(SortError::Config("destination root is empty".to_string()));
        }

        if same_path(&self.watch_path, &self.dest_root) {
            return Err(SortError::Config(format!(
                "destination root {} must differ from the watch path",
                self.dest_root.display()
            )));
        }

        if self.queue_capacity == 0 {
            return Err(SortError::Config("queue_capacity must be at least 1".to_string()));
        }

        self.build_rule_set()?;
        Ok(())
    }

    pub fn build_rule_set(&self) -> Result<RuleSet> {
        RuleSet::new(self.rules.clone())
    }

    pub fn build_readiness(&self) -> ReadinessChecker {
        ReadinessChecker::new()
            .with_partial_suffixes(&self.partial_download_suffixes)
            .with_temp_prefixes(&self.temp_prefixes)
            .with_poll_interval(self.stability_poll_interval())
    }

    pub fn build_inspector(&self) -> Option<ContentInspector> {
        self.content_inspection
            .then(|| ContentInspector::new(self.excerpt_max_bytes))
    }

    pub fn build_classifier(&self) -> Result<Classifier> {
        Ok(Classifier::new(
            self.build_rule_set()?,
            self.build_readiness(),
            self.build_inspector(),
        ))
    }

    pub fn build_pipeline(&self) -> Result<Pipeline> {
        Ok(Pipeline::new(
            self.build_classifier()?,
            Mover::new(&self.dest_root),
            self.max_readiness_attempts,
        ))
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleKind;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SorterConfig::default();
        assert_eq!(config.stability_poll_interval_ms, 2000);
        assert!(config.content_inspection);
        assert!(config.scan_existing_on_start);
        assert!(!config.rules.is_empty());
        assert!(config.partial_download_suffixes.contains(&".crdownload".to_string()));
        assert!(config.dest_root.ends_with("SortedDownloads"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SorterConfig::from_json(
            r#"{
                "watch_path": "/tmp/in",
                "dest_root": "/tmp/out",
                "rules": [
                    {"kind": "extension", "pattern": "*.png", "destination": "Images"},
                    {"kind": "content", "pattern": "invoice", "destination": "Finance"}
                ],
                "content_inspection": false
            }"#,
        )
        .unwrap();

        assert_eq!(config.watch_path, PathBuf::from("/tmp/in"));
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[1].kind, RuleKind::Content);
        assert!(!config.content_inspection);
        assert!(config.build_inspector().is_none());
        assert_eq!(config.max_readiness_attempts, DEFAULT_MAX_READINESS_ATTEMPTS);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = SorterConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SortError::Config(_)));

        let err = SorterConfig::from_json(r#"{"rules": [{"kind": "regex", "pattern": "x", "destination": "y"}]}"#)
            .unwrap_err();
        assert!(matches!(err, SortError::Config(_)));
    }

    #[test]
    fn test_validate_missing_watch_path() {
        let dir = TempDir::new().unwrap();
        let config = SorterConfig::new()
            .with_watch_path(dir.path().join("missing"))
            .with_dest_root(dir.path().join("out"));
        assert!(matches!(config.validate(), Err(SortError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_same_root() {
        let dir = TempDir::new().unwrap();
        let config = SorterConfig::new()
            .with_watch_path(dir.path())
            .with_dest_root(dir.path());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_rule() {
        let watch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let config = SorterConfig::new()
            .with_watch_path(watch.path())
            .with_dest_root(out.path())
            .with_rules(vec![Rule::extension("[oops", "X")]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ok() {
        let watch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let config = SorterConfig::new()
            .with_watch_path(watch.path())
            .with_dest_root(out.path().join("Sorted"));
        assert!(config.validate().is_ok());
        assert!(config.build_pipeline().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dropsort.json");
        let config = SorterConfig::new()
            .with_watch_path("/data/in")
            .with_rules(vec![Rule::keyword("tax", "Finance")])
            .with_poll_interval(Duration::from_millis(250));
        config.save(&path).unwrap();

        let loaded = SorterConfig::load(&path).unwrap();
        assert_eq!(loaded.watch_path, PathBuf::from("/data/in"));
        assert_eq!(loaded.rules, vec![Rule::keyword("tax", "Finance")]);
        assert_eq!(loaded.stability_poll_interval(), Duration::from_millis(250));
    }
}
