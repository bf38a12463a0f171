//! Document conversion — raw bytes to markdown text.
//!
//! Failures are isolated per document: a typed error comes back, the
//! caller keeps the original bytes, and ingestion of other documents is
//! unaffected.

use assay_core::IngestError;
use tracing::info;

/// The format a document was declared to be at the ingestion boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredFormat {
    Markdown,
    PlainText,
    Docx,
}

impl DeclaredFormat {
    /// Map a file extension to a format, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "txt" | "text" => Some(Self::PlainText),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::PlainText => "text",
            Self::Docx => "docx",
        }
    }
}

/// Convert raw document bytes to markdown text.
///
/// Markdown passes through; plain text is treated as header-less markdown.
/// Docx is recognized but has no native converter here, so it yields a
/// typed `Unsupported` error rather than a crash or silent skip.
pub fn convert(source_id: &str, bytes: &[u8], format: DeclaredFormat) -> Result<String, IngestError> {
    match format {
        DeclaredFormat::Markdown | DeclaredFormat::PlainText => {
            let text = std::str::from_utf8(bytes).map_err(|_| IngestError::InvalidEncoding {
                source_id: source_id.to_string(),
            })?;
            if text.trim().is_empty() {
                return Err(IngestError::EmptyDocument {
                    source_id: source_id.to_string(),
                });
            }
            info!(source_id, format = format.as_str(), bytes = bytes.len(), "converted document");
            Ok(text.to_string())
        }
        DeclaredFormat::Docx => Err(IngestError::Unsupported {
            source_id: source_id.to_string(),
            format: "docx".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_passes_through() {
        let text = convert("notes.md", b"# Title\n\nBody.", DeclaredFormat::Markdown).unwrap();
        assert_eq!(text, "# Title\n\nBody.");
    }

    #[test]
    fn docx_is_a_typed_error() {
        let err = convert("broken.docx", b"PK\x03\x04", DeclaredFormat::Docx).unwrap_err();
        assert!(matches!(err, IngestError::Unsupported { .. }));
        assert!(err.to_string().contains("broken.docx"));
    }

    #[test]
    fn invalid_utf8_is_a_typed_error() {
        let err = convert("junk.md", &[0xff, 0xfe, 0x00], DeclaredFormat::Markdown).unwrap_err();
        assert!(matches!(err, IngestError::InvalidEncoding { .. }));
    }

    #[test]
    fn empty_document_is_rejected() {
        let err = convert("blank.txt", b"  \n ", DeclaredFormat::PlainText).unwrap_err();
        assert!(matches!(err, IngestError::EmptyDocument { .. }));
    }

    #[test]
    fn extension_mapping() {
        assert_eq!(DeclaredFormat::from_extension("MD"), Some(DeclaredFormat::Markdown));
        assert_eq!(DeclaredFormat::from_extension("docx"), Some(DeclaredFormat::Docx));
        assert_eq!(DeclaredFormat::from_extension("pdf"), None);
    }
}
