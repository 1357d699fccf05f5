//! Document type dispatch and text extraction
//!
//! Extraction is blocking (file I/O plus parsing); callers run it on the
//! blocking thread pool.

use crate::{docx, pdf, tabular};
use raga_common::{AppError, Result};
use std::path::Path;

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Txt,
    Docx,
    Csv,
}

impl DocumentKind {
    /// Resolve the format from the lower-cased text after the last dot.
    ///
    /// A name without a dot is treated as its own extension and rejected.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = filename
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" => Ok(Self::Txt),
            "docx" => Ok(Self::Docx),
            "csv" => Ok(Self::Csv),
            _ => Err(AppError::UnsupportedFileType { extension }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Docx => "docx",
            Self::Csv => "csv",
        }
    }
}

/// Text of one page; non-paginated formats produce a single page 1
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

impl PageText {
    pub fn single(text: String) -> Self {
        Self { page_number: 1, text }
    }
}

/// Extract the pages of `path`, naming `filename` in errors
pub fn extract_pages(kind: DocumentKind, path: &Path, filename: &str) -> Result<Vec<PageText>> {
    match kind {
        DocumentKind::Pdf => pdf::extract_pages(path, filename),
        DocumentKind::Txt => read_text(path, filename).map(|text| vec![PageText::single(text)]),
        DocumentKind::Docx => docx::extract_text(path, filename).map(|text| vec![PageText::single(text)]),
        DocumentKind::Csv => tabular::extract_text(path, filename).map(|text| vec![PageText::single(text)]),
    }
}

fn read_text(path: &Path, filename: &str) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| extraction_error(filename, e))?;
    String::from_utf8(bytes).map_err(|e| extraction_error(filename, format!("invalid UTF-8: {}", e)))
}

pub(crate) fn extraction_error(filename: &str, message: impl ToString) -> AppError {
    AppError::Extraction {
        filename: filename.to_string(),
        message: message.to_string(),
    }
}
