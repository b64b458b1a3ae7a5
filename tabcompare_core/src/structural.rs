use similar::TextDiff;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tabcompare_common::TabCompareError;
use tracing::debug;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";
const PARAGRAPH_END: &str = "</w:p>";
const CONTEXT_RADIUS: usize = 3;

/// Document body handed to a [`StructuralDiffEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Compares two normalized documents and renders the result
///
/// Implementations own the document diff entirely; this crate only validates
/// inputs, prepares byte streams and stores whatever artifact comes back.
pub trait StructuralDiffEngine: Send + Sync {
    /// File name of the artifact within the session
    fn artifact_name(&self) -> &str;

    fn diff(
        &self,
        left: &NormalizedDocument,
        right: &NormalizedDocument,
    ) -> Result<Vec<u8>, TabCompareError>;
}

/// Validates `.docx` containers and extracts their main document part
pub struct DocumentNormalizer;

impl DocumentNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Existence of both files first, then the format of both
    pub fn validate_pair(&self, first: &Path, second: &Path) -> Result<(), TabCompareError> {
        ensure_file(first)?;
        ensure_file(second)?;
        self.read_document_part(first)?;
        self.read_document_part(second)?;
        Ok(())
    }

    /// Main document XML with one paragraph per line
    pub fn normalize(&self, path: &Path) -> Result<NormalizedDocument, TabCompareError> {
        ensure_file(path)?;
        let raw = self.read_document_part(path)?;
        let xml = String::from_utf8_lossy(&raw);
        let normalized = xml.replace(PARAGRAPH_END, "</w:p>\n");

        debug!("Normalized {} ({} bytes)", path.display(), normalized.len());

        Ok(NormalizedDocument {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            bytes: normalized.into_bytes(),
        })
    }

    fn read_document_part(&self, path: &Path) -> Result<Vec<u8>, TabCompareError> {
        if !is_docx_file(path) {
            return Err(TabCompareError::Format(format!(
                "{} is not a .docx document",
                path.display()
            )));
        }

        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TabCompareError::NotFound(path.display().to_string()),
            _ => TabCompareError::storage(format!("open {}", path.display()), e),
        })?;
        let format_error = |e: &dyn std::fmt::Display| {
            TabCompareError::Format(format!("{}: {}", path.display(), e))
        };

        let mut archive = ZipArchive::new(file).map_err(|e| format_error(&e))?;
        let mut part = archive.by_name(DOCUMENT_PART).map_err(|e| format_error(&e))?;
        let mut bytes = Vec::new();
        part.read_to_end(&mut bytes).map_err(|e| format_error(&e))?;
        Ok(bytes)
    }
}

impl Default for DocumentNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_file(path: &Path) -> Result<(), TabCompareError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(TabCompareError::NotFound(path.display().to_string()))
    }
}

/// Unified line diff of the normalized documents
pub struct LineDiffEngine;

impl LineDiffEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LineDiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuralDiffEngine for LineDiffEngine {
    fn artifact_name(&self) -> &str {
        "comparison_result.diff"
    }

    fn diff(
        &self,
        left: &NormalizedDocument,
        right: &NormalizedDocument,
    ) -> Result<Vec<u8>, TabCompareError> {
        let old = String::from_utf8_lossy(&left.bytes);
        let new = String::from_utf8_lossy(&right.bytes);
        let diff = TextDiff::from_lines(old.as_ref(), new.as_ref());

        let rendered = diff
            .unified_diff()
            .context_radius(CONTEXT_RADIUS)
            .header(&left.name, &right.name)
            .to_string();
        Ok(rendered.into_bytes())
    }
}

/// Check if a file path appears to be a Word document based on extension
pub fn is_docx_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("docx"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_docx;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_validate_pair_accepts_docx() {
        let temp = TempDir::new().unwrap();
        let left = temp.path().join("a.docx");
        let right = temp.path().join("b.docx");
        write_docx(&left, &["Hello"]);
        write_docx(&right, &["World"]);
        assert!(DocumentNormalizer::new().validate_pair(&left, &right).is_ok());
    }

    #[test]
    fn test_normalize_rejects_other_extensions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.doc");
        fs::write(&path, b"binary").unwrap();
        let err = DocumentNormalizer::new().normalize(&path).unwrap_err();
        assert!(matches!(err, TabCompareError::Format(_)));
    }

    #[test]
    fn test_normalize_rejects_container_without_body() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.docx");
        let mut zip = zip::ZipWriter::new(fs::File::create(&path).unwrap());
        zip.start_file("other.xml", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        zip.finish().unwrap();

        let err = DocumentNormalizer::new().normalize(&path).unwrap_err();
        assert!(matches!(err, TabCompareError::Format(_)));
    }

    #[test]
    fn test_normalize_rejects_corrupt_container() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.docx");
        fs::write(&path, b"not a zip").unwrap();
        let err = DocumentNormalizer::new().normalize(&path).unwrap_err();
        assert!(matches!(err, TabCompareError::Format(_)));
    }

    #[test]
    fn test_validate_pair_reports_missing_first() {
        let temp = TempDir::new().unwrap();
        let broken = temp.path().join("broken.docx");
        fs::write(&broken, b"not a zip").unwrap();
        let err = DocumentNormalizer::new()
            .validate_pair(&broken, &temp.path().join("missing.docx"))
            .unwrap_err();
        assert!(matches!(err, TabCompareError::NotFound(_)));
    }

    #[test]
    fn test_normalize_splits_paragraphs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.docx");
        write_docx(&path, &["One", "Two"]);

        let doc = DocumentNormalizer::new().normalize(&path).unwrap();
        let text = String::from_utf8(doc.bytes).unwrap();

        assert_eq!(doc.name, "a.docx");
        assert_eq!(text.matches("</w:p>\n").count(), 2);
    }

    #[test]
    fn test_line_diff_reports_changed_paragraph() {
        let temp = TempDir::new().unwrap();
        let left = temp.path().join("left.docx");
        let right = temp.path().join("right.docx");
        write_docx(&left, &["Alpha", "Beta", "Gamma"]);
        write_docx(&right, &["Alpha", "Delta", "Gamma"]);

        let normalizer = DocumentNormalizer::new();
        let engine = LineDiffEngine::new();
        let out = engine
            .diff(
                &normalizer.normalize(&left).unwrap(),
                &normalizer.normalize(&right).unwrap(),
            )
            .unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.starts_with("--- left.docx"));
        assert!(out.contains("-<w:p><w:r><w:t>Beta</w:t></w:r></w:p>"));
        assert!(out.contains("+<w:p><w:r><w:t>Delta</w:t></w:r></w:p>"));
    }

    #[test]
    fn test_line_diff_identical_is_empty() {
        let doc = NormalizedDocument {
            name: "same.docx".to_string(),
            bytes: b"<w:p>x</w:p>\n".to_vec(),
        };
        let out = LineDiffEngine::new().diff(&doc, &doc).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_is_docx_file() {
        assert!(is_docx_file(Path::new("a.docx")));
        assert!(is_docx_file(Path::new("A.DOCX")));
        assert!(!is_docx_file(Path::new("a.doc")));
        assert!(!is_docx_file(Path::new("a")));
    }
}
