//! CSV text extraction
//!
//! Each data row becomes `"col: value | col: value ..."`; rows are joined by
//! newlines so the chunker can split on row boundaries.

use crate::extract::extraction_error;
use raga_common::Result;
use std::path::Path;

/// Serialise every row of the CSV file at `path`
pub fn extract_text(path: &Path, filename: &str) -> Result<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| extraction_error(filename, e))?;

    let headers = reader
        .headers()
        .map_err(|e| extraction_error(filename, e))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| extraction_error(filename, e))?;
        rows.push(render_row(&headers, &record));
    }

    Ok(rows.join("\n"))
}

/// Pair each header with the row's value; missing trailing cells render empty
fn render_row(headers: &csv::StringRecord, record: &csv::StringRecord) -> String {
    headers
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{}: {}", column, record.get(i).unwrap_or_default()))
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_rendered_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "name,age\nAda,36\nAlan,41\n").unwrap();

        let text = extract_text(&path, "people.csv").unwrap();
        assert_eq!(text, "name: Ada | age: 36\nname: Alan | age: 41");
    }

    #[test]
    fn test_short_row_and_quoted_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.csv");
        std::fs::write(&path, "item,note\n\"Widget, large\",\"says \"\"hi\"\"\"\nGadget\n").unwrap();

        let text = extract_text(&path, "notes.csv").unwrap();
        assert_eq!(
            text,
            "item: Widget, large | note: says \"hi\"\nitem: Gadget | note: "
        );
    }

    #[test]
    fn test_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "a,b\n").unwrap();

        assert_eq!(extract_text(&path, "empty.csv").unwrap(), "");
    }
}
