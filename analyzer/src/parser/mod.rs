//! Spreadsheet and CSV reader with encoding and delimiter auto-detection.
//!
//! Reads the first sheet of a workbook (`.xls`, `.xlsx`, `.xlsm`, `.xlsb`,
//! `.ods`) or a CSV export into a [`RawSheet`]: a rectangular grid of
//! untyped cells. No score-specific logic here; see [`normalize`].

pub mod normalize;

use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

use crate::error::{InputError, InputResult};
use crate::models::format_score;

pub use normalize::{normalize_point_sheet, normalize_score_sheet, ScoreSheet};

/// A single cell as read from the source file.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
}

impl RawCell {
    /// Build a cell from CSV text: blank → empty, numeric → number.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            RawCell::Empty
        } else if let Some(n) = parse_finite(trimmed) {
            RawCell::Number(n)
        } else {
            RawCell::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RawCell::Empty)
    }

    /// Cell rendered as a header label or identity value.
    pub fn label(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(s) => s.clone(),
            RawCell::Number(n) => format_score(*n),
        }
    }

    /// Numeric value: `Ok(None)` for blanks, `Err(text)` for non-numeric text.
    pub fn number(&self) -> Result<Option<f64>, String> {
        match self {
            RawCell::Empty => Ok(None),
            RawCell::Number(n) => Ok(Some(*n)),
            RawCell::Text(s) => parse_finite(s.trim()).map(Some).ok_or_else(|| s.clone()),
        }
    }
}

/// Parse a number, rejecting `inf`/`nan` spellings that are really names.
fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl From<&Data> for RawCell {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty | Data::Error(_) => RawCell::Empty,
            Data::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    RawCell::Empty
                } else {
                    RawCell::Text(trimmed.to_string())
                }
            }
            Data::Float(n) => RawCell::Number(*n),
            Data::Int(n) => RawCell::Number(*n as f64),
            Data::Bool(b) => RawCell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Data::DateTime(dt) => RawCell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
        }
    }
}

/// A sheet as a grid of rows. Rows may have different lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<RawCell>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<RawCell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Cell at (row, col); out of range cells are empty.
    pub fn cell(&self, row: usize, col: usize) -> &RawCell {
        static EMPTY: RawCell = RawCell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Widest row length.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }
}

/// Read the first sheet of a workbook or a CSV file.
pub fn read_sheet<P: AsRef<Path>>(path: P) -> InputResult<RawSheet> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" | "txt" => read_csv_file(path),
        "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => read_workbook(path),
        other => Err(InputError::UnsupportedFormat(if other.is_empty() {
            path.display().to_string()
        } else {
            format!(".{}", other)
        })),
    }
}

/// Read the first sheet of a workbook.
pub fn read_workbook(path: &Path) -> InputResult<RawSheet> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| InputError::Workbook(format!("{}: {}", path.display(), e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(InputError::NoSheets)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| InputError::Workbook(format!("sheet '{}': {}", sheet_name, e)))?;

    // The range starts at the first used cell, not at A1
    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<RawCell>> = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut cells = vec![RawCell::Empty; start_col];
        cells.extend(row.iter().map(RawCell::from));
        rows.push(cells);
    }

    Ok(RawSheet::new(sheet_name, rows))
}

/// Read a CSV file with auto-detection of encoding and delimiter.
pub fn read_csv_file(path: &Path) -> InputResult<RawSheet> {
    let bytes = std::fs::read(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("csv")
        .to_string();
    parse_csv_bytes(&bytes, name)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_csv_bytes(bytes: &[u8], name: impl Into<String>) -> InputResult<RawSheet> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_csv_str(&content, delimiter, name)
}

/// Parse CSV text with an explicit delimiter.
pub fn parse_csv_str(
    content: &str,
    delimiter: char,
    name: impl Into<String>,
) -> InputResult<RawSheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(RawCell::from_text).collect());
    }

    Ok(RawSheet::new(name, rows))
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    // Valid UTF-8 wins over a statistical guess
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "gb2312" | "gbk" | "gb18030" | "cp936" => "gb18030".to_string(),
        "big5" => "big5".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoder = match encoding.to_lowercase().as_str() {
        "gb18030" | "gbk" | "gb2312" => encoding_rs::GB18030,
        "big5" => encoding_rs::BIG5,
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15,
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252,
        // UTF-8 also covers the fallback, with lossy replacement
        _ => encoding_rs::UTF_8,
    };
    decoder.decode(bytes).0.into_owned()
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
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
