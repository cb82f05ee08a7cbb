//! Content excerpts for keyword rules
//!
//! Supported inputs:
//! - plain text and source files, read directly
//! - DOCX family (ZIP container, `word/document.xml`)
//! - PDF, with the `pdf` feature
//!
//! Extraction never fails past this module: any problem yields `None`, which
//! simply means no content rule can match.

use crate::candidate::extension_of;
use crate::{is_docx_file, is_pdf_file, is_text_file, Result, SortError};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Default excerpt size (64 KB)
pub const DEFAULT_EXCERPT_BYTES: usize = 64 * 1024;

/// Extracts bounded text excerpts from supported file types
#[derive(Debug, Clone)]
pub struct ContentInspector {
    max_bytes: usize,
}

impl Default for ContentInspector {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_EXCERPT_BYTES,
        }
    }
}

impl ContentInspector {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Whether this type can be inspected at all
    pub fn supports(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        is_text_file(&ext) || is_docx_file(&ext) || (cfg!(feature = "pdf") && is_pdf_file(&ext))
    }

    /// Excerpt using the configured size limit
    pub fn excerpt(&self, path: &Path) -> Option<String> {
        self.extract_excerpt(path, self.max_bytes)
    }

    /// Extract up to `max_bytes` of text. `None` for unsupported types,
    /// empty documents, or any extraction failure.
    pub fn extract_excerpt(&self, path: &Path, max_bytes: usize) -> Option<String> {
        match extract(path, max_bytes) {
            Ok(text) if text.trim().is_empty() => None,
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(error = %e, "No content excerpt");
                None
            }
        }
    }
}

fn extract(path: &Path, max_bytes: usize) -> Result<String> {
    let ext = extension_of(path);

    let text = if is_text_file(&ext) {
        read_text_prefix(path, max_bytes)?
    } else if is_docx_file(&ext) {
        read_docx(path, max_bytes)?
    } else if is_pdf_file(&ext) {
        read_pdf(path)?
    } else {
        return Err(extraction_error(path, format!("unsupported type '{}'", ext)));
    };

    Ok(truncate_at_char_boundary(text, max_bytes))
}

fn extraction_error(path: &Path, reason: impl Into<String>) -> SortError {
    SortError::Extraction {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_text_prefix(path: &Path, max_bytes: usize) -> Result<String> {
    let mut buf = Vec::with_capacity(max_bytes.min(64 * 1024));
    File::open(path)?
        .take(max_bytes as u64)
        .read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn read_docx(path: &Path, max_bytes: usize) -> Result<String> {
    let file = File::open(path)?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| extraction_error(path, format!("not a ZIP container: {}", e)))?;
    let mut document = archive
        .by_name("word/document.xml")
        .map_err(|e| extraction_error(path, format!("missing word/document.xml: {}", e)))?;

    // Markup is several times larger than the text it carries
    let budget = (max_bytes as u64).saturating_mul(8);
    let mut xml = Vec::new();
    (&mut document)
        .take(budget)
        .read_to_end(&mut xml)
        .map_err(|e| extraction_error(path, e.to_string()))?;

    // The budget may split a multi-byte character
    Ok(docx_text(&String::from_utf8_lossy(&xml)))
}

/// Pull run text out of WordprocessingML. Paragraph ends become newlines.
fn docx_text(xml: &str) -> String {
    let mut out = String::new();
    let mut in_text = false;
    let mut rest = xml;

    while let Some(lt) = rest.find('<') {
        if in_text {
            out.push_str(&decode_entities(&rest[..lt]));
        }

        let after = &rest[lt + 1..];
        let Some(gt) = after.find('>') else {
            rest = "";
            break;
        };
        let raw_tag = &after[..gt];
        let name = raw_tag
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or("");

        match name {
            "w:t" => in_text = !raw_tag.ends_with('/'),
            "/w:t" => in_text = false,
            "/w:p" | "w:br" | "w:cr" => out.push('\n'),
            "w:tab" => out.push('\t'),
            _ => {}
        }

        rest = &after[gt + 1..];
    }

    // Markup cut off by the read budget inside a run
    if in_text {
        out.push_str(&decode_entities(rest));
    }

    out
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(feature = "pdf")]
fn read_pdf(path: &Path) -> Result<String> {
    // pdf-extract panics on some malformed documents
    match std::panic::catch_unwind(|| pdf_extract::extract_text(path)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(extraction_error(path, e.to_string())),
        Err(_) => Err(extraction_error(path, "PDF parser panicked")),
    }
}

#[cfg(not(feature = "pdf"))]
fn read_pdf(path: &Path) -> Result<String> {
    Err(extraction_error(path, "built without the `pdf` feature"))
}

fn truncate_at_char_boundary(mut text: String, max_bytes: usize) -> String {
    if text.len() > max_bytes {
        let mut cut = max_bytes;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn write_docx(path: &Path, document_xml: &str) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        zip.start_file("word/document.xml", FileOptions::<()>::default())
            .unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_plain_text_excerpt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bill.txt");
        std::fs::write(&path, "Invoice #123\nAmount due: 40 EUR").unwrap();

        let excerpt = ContentInspector::default().excerpt(&path).unwrap();
        assert!(excerpt.contains("Invoice #123"));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("long.md");
        std::fs::write(&path, "a".repeat(10_000)).unwrap();

        let excerpt = ContentInspector::default().extract_excerpt(&path, 100).unwrap();
        assert_eq!(excerpt.len(), 100);
    }

    #[test]
    fn test_unsupported_type_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let inspector = ContentInspector::default();
        assert!(!inspector.supports(&path));
        assert!(inspector.excerpt(&path).is_none());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(ContentInspector::default().excerpt(&dir.path().join("x.txt")).is_none());
    }

    #[test]
    fn test_empty_file_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "  \n").unwrap();
        assert!(ContentInspector::default().excerpt(&path).is_none());
    }

    #[test]
    fn test_docx_excerpt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("letter.docx");
        write_docx(
            &path,
            r#"<?xml version="1.0"?><w:document><w:body>
            <w:p><w:r><w:t>Dear Sir,</w:t></w:r></w:p>
            <w:p><w:r><w:t xml:space="preserve">Please find my </w:t></w:r><w:r><w:t>Resume &amp; references</w:t></w:r></w:p>
            </w:body></w:document>"#,
        );

        let inspector = ContentInspector::default();
        assert!(inspector.supports(&path));
        let excerpt = inspector.excerpt(&path).unwrap();
        assert!(excerpt.contains("Dear Sir,\n"));
        assert!(excerpt.contains("Please find my Resume & references"));
        assert!(!excerpt.contains("w:t"));
    }

    #[test]
    fn test_docx_budget_splitting_a_character() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("euro.docx");
        write_docx(&path, "<w:t>ab\u{20ac}\u{20ac}\u{20ac}\u{20ac} invoice</w:t>");

        // 8 bytes of markup ends inside the first euro sign
        let excerpt = ContentInspector::default().extract_excerpt(&path, 1);
        assert_eq!(excerpt.as_deref(), Some("a"));

        let excerpt = ContentInspector::default().extract_excerpt(&path, 64).unwrap();
        assert!(excerpt.contains("invoice"));
    }

    #[test]
    fn test_corrupt_docx_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip at all").unwrap();
        assert!(ContentInspector::default().excerpt(&path).is_none());
    }

    #[test]
    fn test_docx_text_ignores_similar_tags() {
        let text = docx_text("<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r><w:r><w:tab/></w:r></w:p></w:tc></w:tr></w:tbl>");
        assert_eq!(text, "cell\t\n");
    }

    #[test]
    fn test_docx_text_keeps_cut_off_run() {
        assert_eq!(docx_text("<w:p><w:r><w:t>Invoice #12"), "Invoice #12");
        assert_eq!(docx_text("<w:t>done</w:t><w:r"), "done");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &amp;amp;"), "a <b> &amp;");
        assert_eq!(decode_entities("plain"), "plain");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "héllo".to_string();
        // 'é' spans bytes 1..3
        assert_eq!(truncate_at_char_boundary(text, 2), "h");
    }

    #[cfg(not(feature = "pdf"))]
    #[test]
    fn test_pdf_without_feature_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("invoice.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let inspector = ContentInspector::default();
        assert!(!inspector.supports(&path));
        assert!(inspector.excerpt(&path).is_none());
    }
}
