//! Page-level text extraction for uploaded PDFs.
//!
//! Each non-blank page becomes one [`PageRecord`] tagged with its 1-based
//! position in its own file. Extraction never panics: a malformed file that
//! trips the PDF library is reported as [`RagError::DocumentParse`].

use pdfqa_core::models::PageRecord;
use pdfqa_core::RagError;

/// Extracts the non-blank pages of one PDF.
///
/// Page text is kept as the library returns it; only the blank check trims.
/// A PDF whose pages are all blank yields an empty vector, not an error.
pub fn extract_pages(file_name: &str, bytes: &[u8]) -> Result<Vec<PageRecord>, RagError> {
    if bytes.is_empty() {
        return Err(RagError::parse(file_name, "file is empty"));
    }

    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| RagError::parse(file_name, "PDF library panicked while reading the file"))?
        .map_err(|e| RagError::parse(file_name, e.to_string()))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| PageRecord::new(file_name, i + 1, text))
        .collect())
}
