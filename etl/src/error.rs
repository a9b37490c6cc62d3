//! Error types for the APL ETL pipeline.
//!
//! - [`CsvError`] - CSV extraction and writing errors
//! - [`TransformError`] - Transformation step errors
//! - [`ValidationError`] - Table validation errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while reading or writing delimited text.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read or write a file.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content could not be decoded.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Malformed CSV record.
    #[error("Invalid CSV at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

impl CsvError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors raised by transformation steps and table construction.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A step requires a column the table does not have.
    #[error("Missing column: {column}")]
    MissingColumn { column: String },

    /// Two columns would share the same name.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Columns of different lengths.
    #[error("Column '{column}' has {actual} cells, expected {expected}")]
    RaggedColumns {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransformError {
    pub fn missing(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors produced by table validators.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Table has no rows.
    #[error("The table is empty")]
    EmptyFrame,

    /// Expected columns are absent.
    #[error("Missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    /// Rows do not satisfy the JSON schema.
    #[error("Schema validation failed: {errors:?}")]
    Schema { errors: Vec<String> },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// Wraps all lower-level errors and adds dataset context.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Transformation error outside a dataset chain (e.g. the summary merge).
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A step of a dataset chain failed.
    #[error("Dataset '{dataset}' failed at step {index} ({step}): {source}")]
    Step {
        dataset: String,
        index: usize,
        step: String,
        #[source]
        source: TransformError,
    },

    /// Extraction, validation or loading of a dataset failed.
    #[error("Dataset '{dataset}' failed: {source}")]
    Dataset {
        dataset: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// A downstream consumer needs a dataset that was not produced.
    #[error("Dataset result not available: {0}")]
    MissingResult(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker task panicked or was cancelled.
    #[error("Task join error: {0}")]
    Join(String),
}

impl PipelineError {
    /// Attach the dataset name to an error raised while running it.
    pub fn in_dataset(self, dataset: impl Into<String>) -> Self {
        match self {
            err @ (PipelineError::Step { .. } | PipelineError::Dataset { .. }) => err,
            other => PipelineError::Dataset {
                dataset: dataset.into(),
                source: Box::new(other),
            },
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
