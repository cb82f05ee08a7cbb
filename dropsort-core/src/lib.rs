//! dropsort - rule-based download folder sorter
//!
//! Watches one folder for new files and files each one into a destination
//! subfolder chosen by an ordered rule set (filename keyword, extension glob,
//! content keyword). Files that match nothing are left alone.

pub mod candidate;
pub mod classifier;
pub mod config;
pub mod error;
pub mod inspector;
pub mod mover;
pub mod pipeline;
pub mod readiness;
pub mod rules;

pub use candidate::CandidateFile;
pub use classifier::{Classification, Classifier};
pub use config::SorterConfig;
pub use error::{Result, SortError};
pub use inspector::ContentInspector;
pub use mover::{MovedFile, Mover};
pub use pipeline::{Outcome, Pipeline, Stats};
pub use readiness::{Readiness, ReadinessChecker};
pub use rules::{Rule, RuleKind, RuleSet};

/// dropsort version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Suffixes browsers and download managers use while a file is still in flight
pub const PARTIAL_DOWNLOAD_SUFFIXES: &[&str] = &[".crdownload", ".part", ".tmp", ".download"];

/// Name prefixes of lock/owner files written by office suites
pub const TEMP_PREFIXES: &[&str] = &["~$"];

/// Plain text and source extensions whose content can be read directly
pub const TEXT_EXTENSIONS: &[&str] = &[
    // Docs
    "txt", "md", "markdown", "rst", "rtf", "log", "tex", "adoc",
    // Data
    "csv", "tsv", "json", "yaml", "yml", "toml", "xml", "ini", "conf", "cfg",
    // Web
    "html", "htm", "css",
    // Code
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "c", "cpp", "h", "hpp",
    "cs", "rb", "php", "swift", "kt", "scala", "r", "sql", "sh", "bash", "zsh",
    "ps1", "bat", "cmd",
];

/// Word processor extensions handled by the DOCX reader
pub const DOCX_EXTENSIONS: &[&str] = &["docx", "docm", "dotx", "dotm"];

/// Check if a file extension is a directly readable text format
pub fn is_text_file(ext: &str) -> bool {
    TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Check if a file extension is a DOCX-family document
pub fn is_docx_file(ext: &str) -> bool {
    DOCX_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Check if a file extension is a PDF
pub fn is_pdf_file(ext: &str) -> bool {
    ext.eq_ignore_ascii_case("pdf")
}
