//! Transformation steps.
//!
//! Every step is a pure `Table -> Table` function that may fail when a
//! column it needs is absent. Steps are plain data so chains can be declared
//! statically or loaded from JSON.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::columns::normalize_column_name;
use super::numeric::{coerce_integer, is_numeric};
use crate::error::TransformResult;
use crate::models::{Cell, Column, Table};

/// All available transformation steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Remove columns where every cell is missing
    DropEmptyColumns,

    /// Remove rows where every cell is missing
    DropEmptyRows,

    /// Canonicalize every header (see [`normalize_column_name`])
    StandardizeColumnNames,

    /// Relabel columns; unmapped columns and absent keys are left alone
    Rename { mapping: BTreeMap<String, String> },

    /// Keep rows whose value in `column` parses as a number
    NumericRowFilter { column: String },

    /// Cast one column to integer (unparsable or missing -> 0)
    IntegerColumn { column: String },

    /// Cast several columns to integer (unparsable or missing -> 0)
    EnforceIntegers { columns: Vec<String> },

    /// Drop rows with a missing value in any of `columns`
    NonNullFilter { columns: Vec<String> },

    /// Keep rows whose value case-insensitively matches one of `allowed`
    ValueFilter { column: String, allowed: Vec<String> },

    /// Stable sort by `column`, missing values last
    Sort {
        column: String,
        #[serde(default = "default_ascending")]
        ascending: bool,
    },
}

fn default_ascending() -> bool {
    true
}

impl Step {
    pub fn rename<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Step::Rename {
            mapping: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn numeric_row_filter(column: impl Into<String>) -> Self {
        Step::NumericRowFilter {
            column: column.into(),
        }
    }

    pub fn integer_column(column: impl Into<String>) -> Self {
        Step::IntegerColumn {
            column: column.into(),
        }
    }

    pub fn enforce_integers<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Step::EnforceIntegers {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn non_null_filter<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Step::NonNullFilter {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn value_filter<S: Into<String>>(
        column: impl Into<String>,
        allowed: impl IntoIterator<Item = S>,
    ) -> Self {
        Step::ValueFilter {
            column: column.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn sort(column: impl Into<String>, ascending: bool) -> Self {
        Step::Sort {
            column: column.into(),
            ascending,
        }
    }

    /// Short identifier, matches the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Step::DropEmptyColumns => "drop_empty_columns",
            Step::DropEmptyRows => "drop_empty_rows",
            Step::StandardizeColumnNames => "standardize_column_names",
            Step::Rename { .. } => "rename",
            Step::NumericRowFilter { .. } => "numeric_row_filter",
            Step::IntegerColumn { .. } => "integer_column",
            Step::EnforceIntegers { .. } => "enforce_integers",
            Step::NonNullFilter { .. } => "non_null_filter",
            Step::ValueFilter { .. } => "value_filter",
            Step::Sort { .. } => "sort",
        }
    }

    /// Apply this step to a table
    pub fn apply(&self, table: Table) -> TransformResult<Table> {
        match self {
            Step::DropEmptyColumns => Ok(drop_empty_columns(table)),
            Step::DropEmptyRows => Ok(drop_empty_rows(table)),
            Step::StandardizeColumnNames => table.rename_with(normalize_column_name),
            Step::Rename { mapping } => rename_columns(table, mapping),
            Step::NumericRowFilter { column } => filter_numeric_rows(table, column),
            Step::IntegerColumn { column } => {
                enforce_integer_columns(table, std::slice::from_ref(column))
            }
            Step::EnforceIntegers { columns } => enforce_integer_columns(table, columns),
            Step::NonNullFilter { columns } => filter_non_null(table, columns),
            Step::ValueFilter { column, allowed } => filter_values(table, column, allowed),
            Step::Sort { column, ascending } => sort_by_column(table, column, *ascending),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Rename { mapping } => {
                let pairs: Vec<String> = mapping
                    .iter()
                    .map(|(k, v)| format!("{} → {}", k, v))
                    .collect();
                write!(f, "rename [{}]", pairs.join(", "))
            }
            Step::NumericRowFilter { column } | Step::IntegerColumn { column } => {
                write!(f, "{} '{}'", self.name(), column)
            }
            Step::EnforceIntegers { columns } | Step::NonNullFilter { columns } => {
                write!(f, "{} [{}]", self.name(), columns.join(", "))
            }
            Step::ValueFilter { column, allowed } => {
                write!(f, "value_filter '{}' in [{}]", column, allowed.join(", "))
            }
            Step::Sort { column, ascending } => write!(
                f,
                "sort '{}' {}",
                column,
                if *ascending { "asc" } else { "desc" }
            ),
            other => f.write_str(other.name()),
        }
    }
}

// =============================================================================
// Step implementations
// =============================================================================

/// Removes columns that are entirely empty.
pub fn drop_empty_columns(table: Table) -> Table {
    table.retain_columns(|column| !column.is_all_missing())
}

/// Removes rows where all values are missing.
pub fn drop_empty_rows(table: Table) -> Table {
    let mask: Vec<bool> = table
        .rows()
        .map(|row| row.iter().any(|cell| !cell.is_missing()))
        .collect();
    table.filter_rows(&mask)
}

/// Relabels mapped columns. Keys that match nothing are ignored; a later
/// step needing the target name reports the missing column.
pub fn rename_columns(table: Table, mapping: &BTreeMap<String, String>) -> TransformResult<Table> {
    table.rename_with(|name| mapping.get(name).cloned().unwrap_or_else(|| name.to_string()))
}

/// Keeps rows where `column` can be converted to a number.
pub fn filter_numeric_rows(table: Table, column: &str) -> TransformResult<Table> {
    let mask: Vec<bool> = table.require(column)?.cells.iter().map(is_numeric).collect();
    Ok(table.filter_rows(&mask))
}

/// Casts the selected columns to integer while treating missing values as zero.
pub fn enforce_integer_columns(mut table: Table, columns: &[String]) -> TransformResult<Table> {
    for name in columns {
        table.require(name)?;
    }

    for name in columns {
        let column = table.require_mut(name)?;
        column.cells = column
            .cells
            .iter()
            .map(|cell| Cell::Int(coerce_integer(cell)))
            .collect();
    }

    Ok(table)
}

/// Drops rows containing missing values in any of the selected columns.
pub fn filter_non_null(table: Table, columns: &[String]) -> TransformResult<Table> {
    let selected: Vec<&Column> = columns
        .iter()
        .map(|name| table.require(name))
        .collect::<TransformResult<_>>()?;

    let mask: Vec<bool> = (0..table.height())
        .map(|row| selected.iter().all(|column| !column.cells[row].is_missing()))
        .collect();
    Ok(table.filter_rows(&mask))
}

/// Keeps rows whose value matches the allow-list, ignoring case. Matching
/// rows keep their original spelling.
pub fn filter_values(table: Table, column: &str, allowed: &[String]) -> TransformResult<Table> {
    let allowed: HashSet<String> = allowed.iter().map(|v| v.to_lowercase()).collect();

    let mask: Vec<bool> = table
        .require(column)?
        .cells
        .iter()
        .map(|cell| {
            cell.as_text()
                .is_some_and(|text| allowed.contains(&text.to_lowercase()))
        })
        .collect();
    Ok(table.filter_rows(&mask))
}

/// Stable sort by one column. Missing values go last in both directions so
/// ties and gaps keep their input order.
pub fn sort_by_column(table: Table, column: &str, ascending: bool) -> TransformResult<Table> {
    let keys = &table.require(column)?.cells;

    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| {
        let (left, right) = (&keys[a], &keys[b]);
        match (left.is_missing(), right.is_missing()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if ascending => left.compare(right),
            (false, false) => right.compare(left),
        }
    });

    Ok(table.take_rows(&order))
}

/// Get a description of all available steps, for the CLI.
pub fn steps_description() -> String {
    r#"Available transformation steps:

| Step | Description | Parameters |
|------|-------------|------------|
| drop_empty_columns | Remove columns with only missing cells | - |
| drop_empty_rows | Remove rows with only missing cells | - |
| standardize_column_names | snake_case, ASCII-folded headers | - |
| rename | Relabel columns, unmapped pass through | mapping: {source: target} |
| numeric_row_filter | Keep rows with a numeric value | column |
| integer_column | Cast to integer, unparsable -> 0 | column |
| enforce_integers | Cast several columns to integer | columns: [..] |
| non_null_filter | Drop rows with missing values | columns: [..] |
| value_filter | Case-insensitive allow-list | column, allowed: [..] |
| sort | Stable sort, missing last | column, ascending (default true) |

Example chain in JSON:
[
  {"type": "drop_empty_columns"},
  {"type": "drop_empty_rows"},
  {"type": "standardize_column_names"},
  {"type": "rename", "mapping": {"ano_adhesion_establecimiento": "year"}},
  {"type": "numeric_row_filter", "column": "year"},
  {"type": "integer_column", "column": "year"},
  {"type": "sort", "column": "year", "ascending": true}
]"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;

    fn table(columns: &[(&str, &[&str])]) -> Table {
        Table::new(
            columns
                .iter()
                .map(|(name, values)| {
                    Column::new(*name, values.iter().map(|v| Cell::from_raw(v)).collect())
                })
                .collect(),
        )
        .unwrap()
    }

    fn texts(table: &Table, column: &str) -> Vec<String> {
        table
            .require(column)
            .unwrap()
            .cells
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    #[test]
    fn test_drop_empty_columns_and_rows() {
        let input = table(&[
            ("a", &["1", "", "3"]),
            ("empty", &["", "", ""]),
            ("b", &["x", "", ""]),
        ]);

        let cleaned = Step::DropEmptyColumns.apply(input).unwrap();
        assert_eq!(cleaned.column_names(), vec!["a", "b"]);

        let cleaned = Step::DropEmptyRows.apply(cleaned).unwrap();
        assert_eq!(cleaned.height(), 2);
        assert_eq!(texts(&cleaned, "a"), vec!["1", "3"]);
    }

    #[test]
    fn test_structural_cleaning_never_grows() {
        let input = table(&[("a", &["", "2", ""]), ("b", &["", "", ""])]);
        let (rows, cols) = (input.height(), input.width());

        let after = Step::DropEmptyRows
            .apply(Step::DropEmptyColumns.apply(input).unwrap())
            .unwrap();
        assert!(after.height() <= rows);
        assert!(after.width() <= cols);
    }

    #[test]
    fn test_standardize_column_names() {
        let input = table(&[
            ("Año Adhesión Establecimiento", &["2010"]),
            (" Empresas Adheridas ", &["3"]),
        ]);
        let out = Step::StandardizeColumnNames.apply(input).unwrap();
        assert_eq!(out.column_names(), vec!["ano_adhesion_establecimiento", "empresas_adheridas"]);
    }

    #[test]
    fn test_standardize_collision_is_error() {
        let input = table(&[("Año", &["1"]), ("ano", &["2"])]);
        let err = Step::StandardizeColumnNames.apply(input).unwrap_err();
        assert!(matches!(err, TransformError::DuplicateColumn(name) if name == "ano"));
    }

    #[test]
    fn test_rename_passes_unmapped_and_ignores_absent_keys() {
        let input = table(&[("sector_economico", &["Agro"]), ("extra", &["x"])]);
        let step = Step::rename([("sector_economico", "sector"), ("foo", "bar")]);

        let out = step.apply(input).unwrap();
        assert_eq!(out.column_names(), vec!["sector", "extra"]);
        assert_eq!(out.height(), 1);
    }

    #[test]
    fn test_numeric_row_filter_drops_totals() {
        let input = table(&[
            ("year", &["2010", "Total", "", " 2011 ", "2012 (*)"]),
            ("installations", &["5", "5", "1", "2", "3"]),
        ]);

        let out = Step::numeric_row_filter("year").apply(input).unwrap();
        assert_eq!(texts(&out, "year"), vec!["2010", " 2011 "]);
        assert_eq!(texts(&out, "installations"), vec!["5", "2"]);
    }

    #[test]
    fn test_numeric_row_filter_missing_column() {
        let input = table(&[("installations", &["5"])]);
        let err = Step::numeric_row_filter("year").apply(input).unwrap_err();
        assert!(matches!(err, TransformError::MissingColumn { column } if column == "year"));
    }

    #[test]
    fn test_integer_coercion_is_total() {
        let input = table(&[
            ("installations", &["5", "", "abc", "7.8"]),
            ("companies", &["1", "2", "", "x"]),
        ]);

        let out = Step::enforce_integers(["installations", "companies"]).apply(input).unwrap();
        assert_eq!(out.height(), 4);
        assert_eq!(
            out.require("installations").unwrap().cells,
            vec![Cell::Int(5), Cell::Int(0), Cell::Int(0), Cell::Int(7)]
        );
        for name in ["installations", "companies"] {
            assert!(out.require(name).unwrap().cells.iter().all(|c| matches!(c, Cell::Int(_))));
        }
    }

    #[test]
    fn test_integer_column_single() {
        let input = table(&[("year", &["2010", "2011.0"]), ("other", &["a", "b"])]);
        let out = Step::integer_column("year").apply(input).unwrap();
        assert_eq!(out.require("year").unwrap().cells, vec![Cell::Int(2010), Cell::Int(2011)]);
        assert_eq!(texts(&out, "other"), vec!["a", "b"]);
    }

    #[test]
    fn test_enforce_integers_checks_all_columns_first() {
        let input = table(&[("installations", &["5"])]);
        let err = Step::enforce_integers(["installations", "companies"]).apply(input).unwrap_err();
        assert!(matches!(err, TransformError::MissingColumn { column } if column == "companies"));
    }

    #[test]
    fn test_non_null_filter() {
        let input = table(&[
            ("company_size", &["MICRO", "", "GRANDE"]),
            ("companies", &["1", "2", ""]),
        ]);
        let out = Step::non_null_filter(["company_size"]).apply(input).unwrap();
        assert_eq!(texts(&out, "company_size"), vec!["MICRO", "GRANDE"]);
    }

    #[test]
    fn test_value_filter_case_insensitive_keeps_original() {
        let input = table(&[
            ("company_size", &["PEQUEÑA", "pequeña", "otra", "", "Micro"]),
            ("companies", &["1", "2", "3", "4", "5"]),
        ]);
        let step = Step::value_filter(
            "company_size",
            ["PEQUEÑA", "MICRO", "MEDIANA", "GRANDE", "SSPP"],
        );

        let out = step.apply(input).unwrap();
        assert_eq!(texts(&out, "company_size"), vec!["PEQUEÑA", "pequeña", "Micro"]);
        assert_eq!(texts(&out, "companies"), vec!["1", "2", "5"]);
    }

    #[test]
    fn test_sort_ascending_and_descending() {
        let input = Table::new(vec![Column::new(
            "year",
            vec![Cell::Int(2012), Cell::Missing, Cell::Int(2010), Cell::Int(2011)],
        )])
        .unwrap();

        let asc = Step::sort("year", true).apply(input.clone()).unwrap();
        assert_eq!(
            asc.require("year").unwrap().cells,
            vec![Cell::Int(2010), Cell::Int(2011), Cell::Int(2012), Cell::Missing]
        );

        let desc = Step::sort("year", false).apply(input).unwrap();
        assert_eq!(
            desc.require("year").unwrap().cells,
            vec![Cell::Int(2012), Cell::Int(2011), Cell::Int(2010), Cell::Missing]
        );
    }

    #[test]
    fn test_sort_is_stable_both_directions() {
        let input = Table::new(vec![
            Column::new(
                "installations",
                vec![Cell::Int(3), Cell::Int(1), Cell::Int(3), Cell::Int(1)],
            ),
            Column::new("sector", vec!["a".into(), "b".into(), "c".into(), "d".into()]),
        ])
        .unwrap();

        let asc = Step::sort("installations", true).apply(input.clone()).unwrap();
        assert_eq!(texts(&asc, "sector"), vec!["b", "d", "a", "c"]);

        let desc = Step::sort("installations", false).apply(input).unwrap();
        assert_eq!(texts(&desc, "sector"), vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_row_preserving_steps_keep_height() {
        let input = table(&[("Sector Económico", &["A", "B"]), ("Instalaciones", &["1", "x"])]);
        let steps = [
            Step::StandardizeColumnNames,
            Step::rename([("instalaciones", "installations")]),
            Step::integer_column("installations"),
            Step::sort("installations", false),
        ];

        let mut current = input;
        for step in &steps {
            let before = current.height();
            current = step.apply(current).unwrap();
            assert_eq!(current.height(), before, "{} changed row count", step);
        }
    }

    #[test]
    fn test_serde_tagged_format() {
        let json = r#"[
            {"type": "drop_empty_columns"},
            {"type": "rename", "mapping": {"empresas": "companies"}},
            {"type": "sort", "column": "companies"},
            {"type": "value_filter", "column": "company_size", "allowed": ["MICRO"]}
        ]"#;
        let steps: Vec<Step> = serde_json::from_str(json).unwrap();

        assert_eq!(steps[0], Step::DropEmptyColumns);
        assert_eq!(steps[1], Step::rename([("empresas", "companies")]));
        assert_eq!(steps[2], Step::sort("companies", true));
        assert_eq!(steps[3].name(), "value_filter");
    }

    #[test]
    fn test_display() {
        assert_eq!(Step::sort("year", false).to_string(), "sort 'year' desc");
        assert_eq!(Step::DropEmptyRows.to_string(), "drop_empty_rows");
        assert_eq!(
            Step::enforce_integers(["a", "b"]).to_string(),
            "enforce_integers [a, b]"
        );
    }
}
