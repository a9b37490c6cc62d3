//! CSV extraction with encoding and delimiter auto-detection.
//!
//! Raw spreadsheet exports become a [`Table`] of text cells. No
//! dataset-specific logic here: headers are kept verbatim and every field is
//! either `Cell::Text` or `Cell::Missing`.

pub mod writer;

use std::collections::HashMap;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::{Cell, Table};

pub use writer::{table_to_csv, write_table};

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed table
    pub table: Table,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .map_err(|e| CsvError::Encoding(e.to_string())),
        "iso-8859-1" | "latin-1" | "latin1" => {
            Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned())
        }
        "windows-1252" | "cp1252" => Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()),
        _ => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Detect the delimiter from the first non-blank line.
///
/// A header containing a comma is always comma-separated, whatever other
/// punctuation it carries. Otherwise the most frequent of `; TAB |` wins,
/// falling back to a comma when none appear.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");

    if first_line.contains(',') {
        return ',';
    }

    let separators = [';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// Blank lines are ignored. Short records are padded with missing cells,
/// extra fields beyond the header are dropped.
///
/// # Example
/// ```
/// use apl_etl::parser::parse_str;
///
/// let table = parse_str("Año,Empresas\n2010,3\n\n2011,\n", ',').unwrap();
/// assert_eq!(table.height(), 2);
/// assert_eq!(table.column_names(), vec!["Año", "Empresas"]);
/// ```
pub fn parse_str(content: &str, delimiter: char) -> CsvResult<Table> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let delimiter = u8::try_from(delimiter).map_err(|_| CsvError::Parse {
        line: 0,
        message: format!("delimiter '{}' is not a single byte", delimiter),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::Parse {
            line: 1,
            message: e.to_string(),
        })?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(CsvError::NoHeaders);
    }
    let headers = label_headers(headers);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| CsvError::Parse {
            line: e.position().map(|p| p.line() as usize).unwrap_or(0),
            message: e.to_string(),
        })?;

        if record.iter().all(|field| field.trim().is_empty()) && record.len() <= 1 {
            continue;
        }

        let row: Vec<Cell> = (0..headers.len())
            .map(|i| record.get(i).map(Cell::from_raw).unwrap_or_default())
            .collect();
        rows.push(row);
    }

    Table::from_rows(headers, rows).map_err(|e| CsvError::Parse {
        line: 1,
        message: e.to_string(),
    })
}

/// Give blank headers a positional label and suffix repeated ones.
///
/// `["a", "", "a"]` becomes `["a", "unnamed_1", "a.1"]`.
fn label_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    headers
        .into_iter()
        .enumerate()
        .map(|(idx, header)| {
            let base = if header.trim().is_empty() {
                format!("unnamed_{}", idx)
            } else {
                header
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let label = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            label
        })
        .collect()
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let table = parse_str(&content, delimiter)?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
    })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| CsvError::io(path, e))?;
    parse_bytes_auto(&bytes)
}
