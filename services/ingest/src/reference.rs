//! Header-based reference CSVs (center catalog, comarca list).
//!
//! Column names drift between catalog exports, so each semantic role is
//! located by probing an ordered list of accepted header names.

use std::path::Path;

use crate::error::{IngestError, Result, RowWarning};
use crate::normalizer::decode;

/// A semantic column and the header names accepted for it, in priority order.
pub type Role = (&'static str, &'static [&'static str]);

pub struct ReferenceSheet {
    pub headers: Vec<String>,
    pub records: Vec<csv::StringRecord>,
    pub warnings: Vec<RowWarning>,
}

impl ReferenceSheet {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| IngestError::io(path, e))?;
        Self::from_bytes(&bytes).map_err(|e| e.with_path(path))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (text, _) = decode(bytes).ok_or_else(|| IngestError::encoding("<memory>"))?;

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

        let mut records = Vec::new();
        let mut warnings = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            match result {
                Ok(r) => records.push(r),
                // +2: 1-based, plus the header line
                Err(e) => warnings.push(RowWarning::new(idx + 2, e.to_string())),
            }
        }

        Ok(Self {
            headers,
            records,
            warnings,
        })
    }

    /// Index of the first candidate present among the headers.
    pub fn find_column(&self, candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|candidate| {
            self.headers
                .iter()
                .position(|h| h.trim().to_lowercase() == *candidate)
        })
    }

    /// Resolve every role or report all of the missing ones at once.
    pub fn resolve_roles(&self, file: &str, roles: &[Role]) -> Result<Vec<usize>> {
        let found: Vec<Option<usize>> = roles
            .iter()
            .map(|(_, candidates)| self.find_column(candidates))
            .collect();

        let missing: Vec<&'static str> = roles
            .iter()
            .zip(&found)
            .filter(|(_, idx)| idx.is_none())
            .map(|((role, _), _)| *role)
            .collect();

        if !missing.is_empty() {
            return Err(IngestError::MissingColumns {
                file: file.to_string(),
                roles: missing,
            });
        }

        Ok(found.into_iter().flatten().collect())
    }
}

/// Trimmed cell value, empty when the record is short.
pub fn field(record: &csv::StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("").trim()
}
