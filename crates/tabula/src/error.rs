//! Error types for the tabula library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for tabula operations.
#[derive(Debug, Error)]
pub enum TabulaError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A column, index, table or dataset name is not a snake_case identifier.
    #[error("Invalid {kind} name '{name}': must be snake_case")]
    InvalidName { kind: &'static str, name: String },

    /// Strict mode requires a primary key and none was declared.
    #[error("Table '{table}' has no primary key")]
    PrimaryKeyMissing { table: String },

    /// The declared primary key does not identify rows uniquely.
    #[error("Primary key {columns:?} of table '{table}' is not unique ({duplicates} duplicated rows)")]
    NonUniqueIndex {
        table: String,
        columns: Vec<String>,
        duplicates: usize,
    },

    /// Lookup produced no result.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Lookup expected exactly one result and got several.
    #[error("Ambiguous match: {count} entries matched {query}")]
    AmbiguousMatch { count: usize, query: String },

    /// Reading or writing dataset files failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Malformed input, such as a metadata patch or mismatched column lengths.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Regex compilation error.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Error fetching a remote catalog.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error reading or writing Parquet files.
    #[cfg(feature = "parquet")]
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Error building Arrow record batches.
    #[cfg(feature = "parquet")]
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl TabulaError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TabulaError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for tabula operations.
pub type Result<T> = std::result::Result<T, TabulaError>;
