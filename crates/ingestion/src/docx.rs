//! DOCX text extraction
//!
//! Reads `word/document.xml` from the package and collects the text of
//! body-level paragraphs. Paragraphs inside tables are not part of the body
//! paragraph list and are skipped.

use crate::extract::extraction_error;
use raga_common::{AppError, Result};
use regex_lite::Regex;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract paragraph texts joined by `"\n"`
pub fn extract_text(path: &Path, filename: &str) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|e| extraction_error(filename, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| extraction_error(filename, format!("not a DOCX package: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| extraction_error(filename, format!("missing {}: {}", DOCUMENT_PART, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| extraction_error(filename, e))?;

    Ok(paragraphs(&xml)?.join("\n"))
}

/// Tokenizer splitting markup tags from character data
fn token_pattern() -> Result<&'static Regex> {
    static TOKEN: OnceLock<std::result::Result<Regex, String>> = OnceLock::new();

    TOKEN
        .get_or_init(|| Regex::new(r"<[^>]*>|[^<]+").map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| AppError::Internal {
            message: format!("invalid DOCX token pattern: {}", e),
        })
}

/// Walk the WordprocessingML token stream and collect body paragraphs.
///
/// Paragraphs nested inside another paragraph (text boxes) are not part of
/// the enclosing paragraph's text and are skipped.
fn paragraphs(xml: &str) -> Result<Vec<String>> {
    let token = token_pattern()?;

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut table_depth = 0usize;
    let mut paragraph_depth = 0usize;

    for m in token.find_iter(xml) {
        let tok = m.as_str();
        let outermost = paragraph_depth <= 1;

        if !tok.starts_with('<') {
            if in_text && outermost {
                current.push_str(&decode_entities(tok));
            }
            continue;
        }

        let closing = tok.starts_with("</");
        let self_closing = tok.ends_with("/>");
        let name = tok
            .trim_start_matches("</")
            .trim_start_matches('<')
            .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .next()
            .unwrap_or_default();

        match (name, closing) {
            ("w:tbl", false) if !self_closing => table_depth += 1,
            ("w:tbl", true) => table_depth = table_depth.saturating_sub(1),
            ("w:p", false) if self_closing => {
                if table_depth == 0 && paragraph_depth == 0 {
                    paragraphs.push(String::new());
                }
            }
            ("w:p", false) => {
                if paragraph_depth == 0 {
                    current.clear();
                }
                paragraph_depth += 1;
            }
            ("w:p", true) => {
                if paragraph_depth == 1 && table_depth == 0 {
                    paragraphs.push(std::mem::take(&mut current));
                }
                paragraph_depth = paragraph_depth.saturating_sub(1);
            }
            ("w:t", false) => in_text = !self_closing,
            ("w:t", true) => in_text = false,
            ("w:tab", false) if outermost => current.push('\t'),
            ("w:br", false) | ("w:cr", false) if outermost => current.push('\n'),
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// Decode the XML entities and character references that may appear in text runs
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let decoded = tail.find(';').and_then(|semi| {
            let entity = &tail[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
