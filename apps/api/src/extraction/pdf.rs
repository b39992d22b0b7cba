use lopdf::Document;
use tracing::debug;

use super::{DocumentKind, ExtractionError};

/// Extracts text page by page in ascending page order. Each page's tokens are
/// collapsed to single spaces; pages are joined with `\n`.
pub(super) fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let doc = Document::load_mem(bytes).map_err(|e| failed(e.to_string()))?;

    if doc.is_encrypted() {
        return Err(failed("document is encrypted"));
    }

    // BTreeMap keyed by page number, so iteration is already 1..=N.
    let pages = doc.get_pages();
    debug!("PDF has {} pages", pages.len());

    let mut page_texts = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        let raw = doc
            .extract_text(&[*page_number])
            .map_err(|e| failed(format!("page {page_number}: {e}")))?;
        page_texts.push(raw.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    Ok(page_texts.join("\n"))
}

fn failed(reason: impl Into<String>) -> ExtractionError {
    ExtractionError::failed(DocumentKind::Pdf, reason)
}
