//! # APL ETL - Clean Production Agreement datasets
//!
//! Turns the raw spreadsheet exports of the Clean Production Agreement (APL)
//! program into tidy CSV datasets with canonical headers, plus a yearly
//! summary combining adhesion and certification counts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Raw export │────▶│   Parser    │────▶│    Chain    │────▶│ Processed   │
//! │ (UTF8/1252) │     │  (auto-enc) │     │  (steps)    │     │ CSV         │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │ by year ×2
//!                                                                    ▼
//!                                                             ┌─────────────┐
//!                                                             │   Yearly    │
//!                                                             │   summary   │
//!                                                             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use apl_etl::{EtlConfig, EtlPipeline};
//!
//! let pipeline = EtlPipeline::new(EtlConfig::build_default(Path::new(".")));
//! let outcome = pipeline.run_with_summary();
//! println!("{} datasets processed", outcome.report.results.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, columns and tables
//! - [`parser`] - CSV reading with auto-detection, CSV writing
//! - [`transform`] - Header normalization, steps and chains
//! - [`validation`] - Table checks and embedded schemas
//! - [`pipeline`] - Dataset registry, runners and coordinator
//! - [`summary`] - Yearly summary merge
//! - [`logs`] - Log broadcasting

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Orchestration
pub mod pipeline;
pub mod summary;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError,
    TransformError,
    ValidationError,
    PipelineError,
    PipelineResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, Column, Table};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    parse_str,
    parse_bytes_auto,
    parse_csv_file_auto,
    detect_encoding,
    detect_delimiter,
    decode_content,
    table_to_csv,
    write_table,
    ParseResult,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    normalize_column_name,
    parse_number,
    coerce_integer,
    steps_description,
    Step,
    TransformationChain,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    validate_by_year,
    validate_yearly_summary,
    Check,
    Validator,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{
    DatasetDescriptor,
    DatasetResult,
    DatasetRunner,
    EtlConfig,
    EtlPipeline,
    PipelineOutcome,
    RunManifest,
    RunReport,
};

pub use summary::{build_yearly_summary, summarize_report, SummaryResult};
