//! Reads delimiter-separated offer exports with unknown encoding and a
//! drifting column layout, and hands back rows of exactly N named fields.
//!
//! Exports come in two shapes:
//! - N or more columns: extra trailing columns are dropped
//! - N-1 columns: the center name and its regime were merged into one cell
//!   on export ("IES EXAMPLE PÚBLICO"); the last word is split back out
//!
//! Anything narrower is rejected as a schema mismatch.

use std::borrow::Cow;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::{debug, warn};

use crate::error::{IngestError, Result, RowWarning};

/// Target schema of the FP offer exports.
pub const OFFER_COLUMNS: [&str; 9] = [
    "PROVINCIA",
    "LOCALIDAD",
    "CENTRO",
    "RÉGIMEN",
    "GRADO",
    "FAMILIA",
    "CICLO",
    "TURNO",
    "UNIDADES",
];

/// Position of the center column in [`OFFER_COLUMNS`]; the regime follows it.
pub const OFFER_MERGED_INDEX: usize = 2;

/// How to map raw records onto the target columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub columns: Vec<String>,
    /// Leading records (titles, headers) discarded before any data
    pub skip_rows: usize,
    pub delimiter: u8,
    /// Index of the column whose value is merged with the next one when a
    /// record comes one field short
    pub merged_index: usize,
}

impl TableLayout {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            skip_rows: 0,
            delimiter: b',',
            merged_index: 0,
        }
    }

    /// The 9-column offer schema with the given number of title rows.
    pub fn offers(skip_rows: usize) -> Self {
        Self::new(OFFER_COLUMNS)
            .skip_rows(skip_rows)
            .merged_at(OFFER_MERGED_INDEX)
    }

    pub fn skip_rows(mut self, rows: usize) -> Self {
        self.skip_rows = rows;
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn merged_at(mut self, index: usize) -> Self {
        self.merged_index = index;
        self
    }

    fn width(&self) -> usize {
        self.columns.len()
    }

    fn supports_merge(&self) -> bool {
        self.width() >= 2 && self.merged_index + 1 < self.width()
    }
}

/// Which raw shape the file turned out to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawShape {
    /// At least N columns, mapped positionally
    Direct,
    /// N-1 columns, one merged field split in two
    Merged,
}

/// Output of the normalizer: every row has exactly `columns.len()` values.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub warnings: Vec<RowWarning>,
    pub encoding: &'static str,
    /// `None` when the file held no data records at all
    pub shape: Option<RawShape>,
}

impl NormalizedTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value<'a>(&'a self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.column_index(name)
            .and_then(|idx| row.get(idx))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Decode raw bytes, UTF-8 first and Windows-1252 as fallback.
///
/// Returns the text and the name of the encoding that worked.
pub fn decode(bytes: &[u8]) -> Option<(String, &'static str)> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let candidates: [&'static Encoding; 2] = [UTF_8, WINDOWS_1252];

    candidates.into_iter().find_map(|encoding| {
        encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| (Cow::into_owned(text), encoding.name()))
    })
}

/// Read and normalize a file.
pub fn normalize_file(path: impl AsRef<Path>, layout: &TableLayout) -> Result<NormalizedTable> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| IngestError::io(path, e))?;
    let table = normalize_bytes(&bytes, layout).map_err(|e| e.with_path(path))?;

    debug!(
        file = %path.display(),
        encoding = table.encoding,
        shape = ?table.shape,
        rows = table.rows.len(),
        "normalized table"
    );
    report_warnings(&path.display().to_string(), &table.warnings);

    Ok(table)
}

/// Normalize in-memory content. Same rules as [`normalize_file`].
pub fn normalize_bytes(bytes: &[u8], layout: &TableLayout) -> Result<NormalizedTable> {
    let (text, encoding) = decode(bytes).ok_or_else(|| IngestError::encoding("<memory>"))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(layout.delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    let mut warnings = Vec::new();
    let mut raw_width: Option<usize> = None;
    let mut shape: Option<RawShape> = None;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        if idx < layout.skip_rows {
            continue;
        }

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warnings.push(RowWarning::new(line, format!("CSV parse error: {}", e)));
                continue;
            }
        };

        // The first data record fixes the raw layout for the whole file
        let width = match raw_width {
            Some(w) => w,
            None => {
                let w = record.len();
                shape = Some(detect_shape(w, layout)?);
                raw_width = Some(w);
                w
            }
        };

        if record.len() > width {
            warnings.push(RowWarning::new(
                line,
                format!("expected {} fields, found {}", width, record.len()),
            ));
            continue;
        }

        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        fields.resize(width, String::new());

        let row = match shape {
            Some(RawShape::Merged) => split_merged(fields, layout.merged_index),
            _ => {
                fields.truncate(layout.width());
                fields
            }
        };
        rows.push(row);
    }

    Ok(NormalizedTable {
        columns: layout.columns.clone(),
        rows,
        warnings,
        encoding,
        shape,
    })
}

fn detect_shape(raw_width: usize, layout: &TableLayout) -> Result<RawShape> {
    let target = layout.width();
    if raw_width >= target {
        Ok(RawShape::Direct)
    } else if raw_width + 1 == target && layout.supports_merge() {
        Ok(RawShape::Merged)
    } else {
        Err(IngestError::SchemaMismatch {
            expected: target.saturating_sub(1),
            found: raw_width,
        })
    }
}

/// Split "CENTER NAME REGIME" into ["CENTER NAME", "REGIME"] in place.
fn split_merged(mut fields: Vec<String>, index: usize) -> Vec<String> {
    let merged = std::mem::take(&mut fields[index]);
    let mut tokens: Vec<&str> = merged.split_whitespace().collect();
    let regime = tokens.pop().unwrap_or_default().to_uppercase();
    let center = tokens.join(" ");

    fields[index] = center;
    fields.insert(index + 1, regime);
    fields
}

fn report_warnings(source: &str, warnings: &[RowWarning]) {
    if warnings.is_empty() {
        return;
    }
    warn!(file = source, count = warnings.len(), "skipped malformed rows");
    for w in warnings.iter().take(5) {
        warn!(file = source, "  {}", w);
    }
    if warnings.len() > 5 {
        warn!(file = source, "  ... and {} more", warnings.len() - 5);
    }
}
