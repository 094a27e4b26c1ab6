use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort loading a whole file.
///
/// Per-row problems never surface here; they are collected as
/// [`RowWarning`]s next to the rows that did parse.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The file could not be opened or read
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Neither UTF-8 nor Windows-1252 could decode the content
    #[error("cannot decode {path} as UTF-8 or Windows-1252")]
    Encoding { path: PathBuf },

    /// Raw rows are too narrow to be mapped onto the target columns
    #[error("schema mismatch: expected at least {expected} columns, found {found}")]
    SchemaMismatch { expected: usize, found: usize },

    /// The CSV reader failed outside of a single record
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A reference table lacks one or more required columns
    #[error("{file}: no column found for {}", roles.join(", "))]
    MissingColumns { file: String, roles: Vec<&'static str> },
}

impl IngestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn encoding(path: impl Into<PathBuf>) -> Self {
        Self::Encoding { path: path.into() }
    }

    /// Attach a file name to errors raised by in-memory parsing.
    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::Encoding { .. } => Self::Encoding { path: path.into() },
            Self::MissingColumns { roles, .. } => Self::MissingColumns {
                file: path.into().display().to_string(),
                roles,
            },
            other => other,
        }
    }
}

/// A non-fatal problem with one input record. The record is skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct RowWarning {
    /// 1-based record number in the source, counting skipped title rows
    pub line: usize,
    pub reason: String,
}

impl RowWarning {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
