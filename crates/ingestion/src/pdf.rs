//! PDF text extraction module
//!
//! Extracts text per page using lopdf, keeping 1-based page numbers.

use crate::extract::{extraction_error, PageText};
use raga_common::Result;
use std::path::Path;
use tracing::{debug, warn};

/// Extract the text of every page in document order.
///
/// A page whose content cannot be decoded is skipped with a warning; a file
/// that cannot be loaded at all is an extraction error.
pub fn extract_pages(path: &Path, filename: &str) -> Result<Vec<PageText>> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| extraction_error(filename, format!("Failed to load PDF: {}", e)))?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut result = Vec::with_capacity(pages.len());
    for &page_number in pages.keys() {
        match doc.extract_text(&[page_number]) {
            Ok(text) => result.push(PageText {
                page_number,
                text: clean_text(&text),
            }),
            Err(e) => {
                warn!(page = page_number, error = %e, "Failed to extract text from page, skipping");
            }
        }
    }

    Ok(result)
}

/// Remove encoding artifacts while keeping line structure
fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|&c| c != '\u{FEFF}' && c != '\0')
        .collect()
}
