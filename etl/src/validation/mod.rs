//! Table validation.
//!
//! A [`Validator`] is any function that inspects a table and may reject it.
//! Runners accept validators as injected capabilities; descriptors declare
//! them as serializable [`Check`]s.
//!
//! # Embedded Schemas
//!
//! Row schemas (JSON Schema Draft 7) are embedded at compile time from the
//! `schemas/` directory:
//! - `by-year.json` - processed adhesion/certification by year rows
//! - `yearly-summary.json` - merged yearly summary rows
//!
//! # Example
//!
//! ```rust,ignore
//! use apl_etl::validation::{non_empty, required_columns, all};
//!
//! let check = all(vec![non_empty(), required_columns(["year", "companies"])]);
//! check(&table)?;
//! ```

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ValidationError, ValidationResult};
use crate::models::Table;

/// Maximum number of row errors reported by a schema check.
const MAX_REPORTED_ERRORS: usize = 10;

/// An injectable table check.
pub type Validator = Arc<dyn Fn(&Table) -> ValidationResult<()> + Send + Sync>;

static BY_YEAR_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/by-year.json"))
        .expect("Invalid embedded schema")
});

static YEARLY_SUMMARY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/yearly-summary.json"))
        .expect("Invalid embedded schema")
});

/// Rejects tables with zero rows.
pub fn non_empty() -> Validator {
    Arc::new(|table: &Table| {
        if table.is_empty() {
            Err(ValidationError::EmptyFrame)
        } else {
            Ok(())
        }
    })
}

/// Rejects tables lacking any of the expected columns.
pub fn required_columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Validator {
    let expected: Vec<String> = columns.into_iter().map(Into::into).collect();

    Arc::new(move |table: &Table| {
        let missing: Vec<String> = expected
            .iter()
            .filter(|column| !table.has_column(column))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingColumns(missing))
        }
    })
}

/// Checks every row, as a JSON object, against a Draft 7 schema.
pub fn json_schema(schema: Value) -> Validator {
    Arc::new(move |table: &Table| {
        validate_rows(&schema, &table.to_json_rows())
            .map_err(|errors| ValidationError::Schema { errors })
    })
}

/// Runs validators in order, stopping at the first failure.
pub fn all(validators: Vec<Validator>) -> Validator {
    Arc::new(move |table: &Table| validators.iter().try_for_each(|check| check(table)))
}

/// Validate JSON rows against a schema.
///
/// # Returns
/// * `Ok(())` if every row is valid
/// * `Err(Vec<String>)` with at most ten row errors otherwise
pub fn validate_rows(schema: &Value, rows: &[Value]) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = rows
        .iter()
        .enumerate()
        .flat_map(|(idx, row)| {
            validator
                .iter_errors(row)
                .map(move |e| format!("row {}: {}", idx, e))
                .collect::<Vec<_>>()
        })
        .take(MAX_REPORTED_ERRORS)
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a processed by-year table against the embedded schema.
pub fn validate_by_year(table: &Table) -> ValidationResult<()> {
    validate_rows(&BY_YEAR_SCHEMA, &table.to_json_rows())
        .map_err(|errors| ValidationError::Schema { errors })
}

/// Validate a yearly summary table against the embedded schema.
pub fn validate_yearly_summary(table: &Table) -> ValidationResult<()> {
    validate_rows(&YEARLY_SUMMARY_SCHEMA, &table.to_json_rows())
        .map_err(|errors| ValidationError::Schema { errors })
}

// =============================================================================
// Declarative checks
// =============================================================================

/// Schemas shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddedSchema {
    ByYear,
    YearlySummary,
}

impl EmbeddedSchema {
    pub fn schema(&self) -> &'static Value {
        match self {
            EmbeddedSchema::ByYear => &BY_YEAR_SCHEMA,
            EmbeddedSchema::YearlySummary => &YEARLY_SUMMARY_SCHEMA,
        }
    }

    pub fn validator(&self) -> Validator {
        match self {
            EmbeddedSchema::ByYear => Arc::new(validate_by_year),
            EmbeddedSchema::YearlySummary => Arc::new(validate_yearly_summary),
        }
    }
}

/// Serializable description of a validator, as used in dataset descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    NonEmpty,
    RequiredColumns { columns: Vec<String> },
    Schema { schema: EmbeddedSchema },
}

impl Check {
    pub fn validator(&self) -> Validator {
        match self {
            Check::NonEmpty => non_empty(),
            Check::RequiredColumns { columns } => required_columns(columns.iter().cloned()),
            Check::Schema { schema } => schema.validator(),
        }
    }
}

/// Combine declarative checks into one validator, `None` when there are none.
pub fn compile_checks(checks: &[Check]) -> Option<Validator> {
    match checks {
        [] => None,
        [single] => Some(single.validator()),
        many => Some(all(many.iter().map(Check::validator).collect())),
    }
}
