use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for library operations.
pub type CleanResult<T> = Result<T, CleanError>;

/// Failures that abort a single cleaning operation.
///
/// Dirty data never shows up here: cell-level conversion failures, invalid dtype tags and
/// unresolvable mappings are logged and recorded in reports instead.
#[derive(Debug, Error)]
pub enum CleanError {
    /// A caller referenced a column the table does not contain.
    #[error("column '{column}' does not exist in the table")]
    UnknownColumn { column: String },

    /// `from_file` was asked to read something other than delimited text.
    #[error("{path:?} is not a supported file type; only .csv and .tsv files can be read")]
    UnsupportedFileType { path: PathBuf },

    /// Columns supplied to a table constructor disagree on row count.
    #[error("column '{column}' has {found} value(s) but the table has {expected} row(s)")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("unknown encoding '{label}'")]
    UnknownEncoding { label: String },

    #[error("failed to decode input with encoding {encoding}")]
    Decode { encoding: &'static str },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
