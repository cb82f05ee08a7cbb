//! Ordered routing rules
//!
//! A [`RuleSet`] is an ordered list of matchers. Each rule either matches a
//! candidate file or it does not; the first matching rule decides the
//! destination folder.
//!
//! Rule kinds:
//! - `keyword`: case-insensitive substring of the file name
//! - `extension`: case-insensitive glob against the whole file name (`*.png`)
//! - `content`: case-insensitive substring of the content excerpt

use crate::candidate::CandidateFile;
use crate::{Result, SortError};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Characters that turn a route key into a glob
const GLOB_CHARS: &[char] = &['*', '?', '[', ']'];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Original routing table: (keyword or glob, destination folder)
const DEFAULT_ROUTES: &[(&str, &str)] = &[
    ("invoice", "Finance"),
    ("receipt", "Finance"),
    ("tax", "Finance"),
    ("resume", "Resumes"),
    ("cover letter", "Resumes"),
    ("*.png", "Images"),
    ("*.jpg", "Images"),
    ("*.jpeg", "Images"),
    ("*.gif", "Images"),
    ("report", "Reports"),
    ("homework", "School"),
    ("assignment", "School"),
];

/// What part of a file a rule looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Substring of the file name
    Keyword,
    /// Glob over the file name
    Extension,
    /// Substring of the content excerpt
    Content,
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Keyword => "keyword",
            RuleKind::Extension => "extension",
            RuleKind::Content => "content",
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single routing rule as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub kind: RuleKind,
    pub pattern: String,
    /// Folder name relative to the destination root
    pub destination: String,
}

impl Rule {
    pub fn new(kind: RuleKind, pattern: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
            destination: destination.into(),
        }
    }

    pub fn keyword(pattern: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(RuleKind::Keyword, pattern, destination)
    }

    pub fn extension(pattern: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(RuleKind::Extension, pattern, destination)
    }

    pub fn content(pattern: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(RuleKind::Content, pattern, destination)
    }

    /// Pick the kind from the pattern itself: glob metacharacters make an
    /// extension rule, anything else is a filename keyword.
    pub fn infer(pattern: impl Into<String>, destination: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let kind = if is_glob(&pattern) {
            RuleKind::Extension
        } else {
            RuleKind::Keyword
        };
        Self::new(kind, pattern, destination)
    }
}

/// Whether a route key should be treated as a glob
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(GLOB_CHARS)
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Lowercased needle
    Substring(String),
    Glob(Pattern),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: Rule,
    matcher: Matcher,
}

impl CompiledRule {
    fn compile(rule: Rule) -> Result<Self> {
        if rule.pattern.trim().is_empty() {
            return Err(SortError::Config(format!(
                "{} rule for '{}' has an empty pattern",
                rule.kind, rule.destination
            )));
        }
        validate_destination(&rule.destination)?;

        let matcher = match rule.kind {
            RuleKind::Keyword | RuleKind::Content => Matcher::Substring(rule.pattern.to_lowercase()),
            RuleKind::Extension => Matcher::Glob(Pattern::new(&rule.pattern)?),
        };

        Ok(Self { rule, matcher })
    }

    fn matches(&self, candidate: &CandidateFile, lower_name: &str, lower_excerpt: Option<&str>) -> bool {
        match (&self.rule.kind, &self.matcher) {
            (RuleKind::Keyword, Matcher::Substring(needle)) => lower_name.contains(needle.as_str()),
            (RuleKind::Extension, Matcher::Glob(glob)) => {
                glob.matches_with(&candidate.file_name, MATCH_OPTIONS)
            }
            (RuleKind::Content, Matcher::Substring(needle)) => lower_excerpt
                .map(|text| text.contains(needle.as_str()))
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Destinations must stay below the destination root
fn validate_destination(destination: &str) -> Result<()> {
    if destination.trim().is_empty() {
        return Err(SortError::Config("rule destination is empty".to_string()));
    }

    let escapes = Path::new(destination)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(SortError::Config(format!(
            "rule destination '{}' must be a relative folder without '..'",
            destination
        )));
    }

    Ok(())
}

/// Ordered, validated collection of rules. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile and validate rules, keeping their order
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Built-in routes, highest priority first: every glob, then
    /// every filename keyword, then every keyword again against content.
    pub fn default_rules() -> Vec<Rule> {
        let globs = DEFAULT_ROUTES
            .iter()
            .filter(|(key, _)| is_glob(key))
            .map(|(key, dest)| Rule::extension(*key, *dest));
        let keywords = DEFAULT_ROUTES
            .iter()
            .filter(|(key, _)| !is_glob(key))
            .map(|(key, dest)| Rule::keyword(*key, *dest));
        let content = DEFAULT_ROUTES
            .iter()
            .filter(|(key, _)| !is_glob(key))
            .map(|(key, dest)| Rule::content(*key, *dest));

        globs.chain(keywords).chain(content).collect()
    }

    pub fn default_routes() -> Self {
        // Built-in routes are known to compile
        Self::new(Self::default_rules()).unwrap_or_default()
    }

    /// Return the destination of the first rule that matches.
    ///
    /// Content rules are skipped when no excerpt is supplied.
    pub fn classify(&self, candidate: &CandidateFile, excerpt: Option<&str>) -> Option<&str> {
        let lower_name = candidate.file_name.to_lowercase();
        let lower_excerpt = excerpt.map(|text| text.to_lowercase());

        self.rules
            .iter()
            .find(|compiled| compiled.matches(candidate, &lower_name, lower_excerpt.as_deref()))
            .map(|compiled| compiled.rule.destination.as_str())
    }

    /// Whether classification can use a content excerpt at all
    pub fn has_content_rules(&self) -> bool {
        self.rules.iter().any(|c| c.rule.kind == RuleKind::Content)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|c| &c.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
