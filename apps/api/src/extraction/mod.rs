//! Turns an uploaded resume into one plain-text blob.
//!
//! Dispatch is by declared media type: PDF is read page by page, Word
//! documents are reduced to raw paragraph text, plain text is decoded as
//! UTF-8. Anything else is rejected before a parser is touched.
//!
//! No network calls happen here; the analyzer only ever sees `ExtractedText`.

use std::path::Path;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

mod pdf;
mod word;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_TEXT: &str = "text/plain";
const MIME_OCTET_STREAM: &str = "application/octet-stream";

/// The formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Word,
    #[serde(rename = "text")]
    PlainText,
}

impl DocumentKind {
    /// Maps a declared media type (parameters such as `charset` ignored).
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            MIME_PDF => Some(Self::Pdf),
            MIME_DOCX | MIME_DOC => Some(Self::Word),
            MIME_TEXT => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Maps a filename extension; used only when no usable media type was sent.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" | "doc" => Some(Self::Word),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Word => "DOCX",
            Self::PlainText => "text",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported media type '{media_type}'")]
    UnsupportedFormat { media_type: String },

    #[error("Failed to extract {} text: {reason}", .kind.label())]
    ExtractionFailed { kind: DocumentKind, reason: String },
}

impl ExtractionError {
    fn failed(kind: DocumentKind, reason: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            kind,
            reason: reason.into(),
        }
    }
}

/// Raw upload as received from the client. Consumed once by `extract`.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub bytes: Bytes,
    pub media_type: Option<String>,
    pub file_name: String,
}

impl UploadedDocument {
    pub fn new(bytes: impl Into<Bytes>, media_type: Option<String>, file_name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type,
            file_name: file_name.into(),
        }
    }

    /// Resolves the document kind. The declared media type wins; the
    /// extension is consulted only for missing or `application/octet-stream`.
    pub fn kind(&self) -> Result<DocumentKind, ExtractionError> {
        let declared = self
            .media_type
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        let resolved = match declared {
            Some(m) if !m.eq_ignore_ascii_case(MIME_OCTET_STREAM) => {
                DocumentKind::from_media_type(m)
            }
            _ => DocumentKind::from_file_name(&self.file_name),
        };

        resolved.ok_or_else(|| ExtractionError::UnsupportedFormat {
            media_type: declared.unwrap_or("unknown").to_string(),
        })
    }
}

/// Normalized text of one uploaded document. Immutable once produced.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    text: String,
    kind: DocumentKind,
    source_name: String,
}

impl ExtractedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Name of the plain-text rendition: `resume.pdf` → `resume.txt`.
    pub fn text_file_name(&self) -> String {
        let stem = Path::new(&self.source_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("resume");
        format!("{stem}.txt")
    }
}

/// Extracts plain text from an upload. Never returns empty or partial text.
pub fn extract(document: &UploadedDocument) -> Result<ExtractedText, ExtractionError> {
    let kind = document.kind()?;
    debug!(
        "Extracting {} ({} bytes) as {:?}",
        document.file_name,
        document.bytes.len(),
        kind
    );

    let text = match kind {
        DocumentKind::Pdf => pdf::extract_pdf_text(&document.bytes)?,
        DocumentKind::Word => word::extract_docx_text(&document.bytes)?,
        DocumentKind::PlainText => decode_plain_text(&document.bytes)?,
    };

    if text.trim().is_empty() {
        return Err(ExtractionError::failed(kind, "document contains no text"));
    }

    let extracted = ExtractedText {
        text,
        kind,
        source_name: document.file_name.clone(),
    };
    info!(
        "Converted {} to {} ({} chars)",
        document.file_name,
        extracted.text_file_name(),
        extracted.text.chars().count()
    );
    Ok(extracted)
}

/// Runs `extract` on the blocking pool; PDF and DOCX parsing is CPU-bound.
pub async fn extract_in_background(
    document: UploadedDocument,
) -> Result<ExtractedText, ExtractionError> {
    let fallback_kind = document.kind()?;
    tokio::task::spawn_blocking(move || extract(&document))
        .await
        .map_err(|e| ExtractionError::failed(fallback_kind, format!("extraction task failed: {e}")))?
}

fn decode_plain_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ExtractionError::failed(DocumentKind::PlainText, e.to_string()))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
}
