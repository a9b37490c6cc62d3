//! Yearly summary: adhesion and certification counts side by side.
//!
//! The merge is a full outer join on `year`. A year reported by only one
//! program gets zeros for the other program, never blanks, and no year
//! present in either input is dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{PipelineResult, TransformError, TransformResult};
use crate::logs::log_success;
use crate::models::{Cell, Column, Table};
use crate::parser::write_table;
use crate::pipeline::config::{ADHESION_BY_YEAR, CERTIFICATION_BY_YEAR};
use crate::pipeline::RunReport;
use crate::transform::steps::{enforce_integer_columns, sort_by_column};
use crate::validation::validate_yearly_summary;

pub const YEARLY_SUMMARY_FILE: &str = "yearly_summary.csv";

/// Column layout of the summary table.
pub const SUMMARY_COLUMNS: [&str; 5] = [
    "year",
    "installations_adhesion",
    "companies_adhesion",
    "installations_certification",
    "companies_certification",
];

const SUFFIXES: (&str, &str) = ("_adhesion", "_certification");

/// Persisted summary.
#[derive(Debug, Clone)]
pub struct SummaryResult {
    pub table: Table,
    pub destination: PathBuf,
}

/// Hashable form of a key cell. Integral floats collapse onto integers so
/// `2015` and `2015.0` match; missing keys match each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum JoinKey {
    Missing,
    Int(i64),
    Float(u64),
    Text(String),
}

impl From<&Cell> for JoinKey {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Missing => JoinKey::Missing,
            Cell::Int(v) => JoinKey::Int(*v),
            Cell::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                JoinKey::Int(*f as i64)
            }
            Cell::Float(f) => JoinKey::Float(f.to_bits()),
            Cell::Text(s) => JoinKey::Text(s.clone()),
        }
    }
}

/// Full outer join of two tables on `key`.
///
/// Rows come out in left order (each left row followed by its matches, so a
/// key repeated on both sides yields every pairing), then the right rows that
/// matched nothing. Columns are the key, the left columns, then the right
/// columns; a non-key name present on both sides gets the matching suffix.
pub fn outer_join(
    left: &Table,
    right: &Table,
    key: &str,
    suffixes: (&str, &str),
) -> TransformResult<Table> {
    let left_key = left.require(key)?;
    let right_key = right.require(key)?;

    let mut index: HashMap<JoinKey, Vec<usize>> = HashMap::new();
    for (row, cell) in right_key.cells.iter().enumerate() {
        index.entry(JoinKey::from(cell)).or_default().push(row);
    }

    let mut matched = vec![false; right.height()];
    let mut pairs: Vec<(Option<usize>, Option<usize>)> = Vec::new();
    for (row, cell) in left_key.cells.iter().enumerate() {
        match index.get(&JoinKey::from(cell)) {
            Some(rows) => {
                for &other in rows {
                    matched[other] = true;
                    pairs.push((Some(row), Some(other)));
                }
            }
            None => pairs.push((Some(row), None)),
        }
    }
    pairs.extend(
        matched
            .iter()
            .enumerate()
            .filter(|(_, seen)| !**seen)
            .map(|(row, _)| (None, Some(row))),
    );

    let key_cells = pairs
        .iter()
        .map(|pair| match pair {
            (Some(row), _) => left_key.cells[*row].clone(),
            (None, Some(row)) => right_key.cells[*row].clone(),
            (None, None) => Cell::Missing,
        })
        .collect();

    let mut columns = vec![Column::new(key, key_cells)];
    columns.extend(side_columns(left, right, key, suffixes.0, &pairs, |p| p.0));
    columns.extend(side_columns(right, left, key, suffixes.1, &pairs, |p| p.1));

    Table::new(columns)
}

fn side_columns(
    side: &Table,
    other: &Table,
    key: &str,
    suffix: &str,
    pairs: &[(Option<usize>, Option<usize>)],
    pick: impl Fn(&(Option<usize>, Option<usize>)) -> Option<usize>,
) -> Vec<Column> {
    side.columns()
        .iter()
        .filter(|column| column.name != key)
        .map(|column| {
            let name = if other.has_column(&column.name) {
                format!("{}{}", column.name, suffix)
            } else {
                column.name.clone()
            };
            let cells = pairs
                .iter()
                .map(|pair| pick(pair).map_or(Cell::Missing, |row| column.cells[row].clone()))
                .collect();
            Column::new(name, cells)
        })
        .collect()
}

/// Merge the two by-year tables into the summary layout: integer counts
/// (missing → 0) sorted by ascending year.
pub fn merge_yearly(adhesion: &Table, certification: &Table) -> TransformResult<Table> {
    let joined = outer_join(adhesion, certification, "year", SUFFIXES)?;

    let summary_columns: Vec<String> = SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut columns = enforce_integer_columns(joined, &summary_columns)?.into_columns();

    let ordered = SUMMARY_COLUMNS
        .iter()
        .map(|name| {
            columns
                .iter()
                .position(|c| c.name == *name)
                .map(|pos| columns.swap_remove(pos))
                .ok_or_else(|| TransformError::missing(*name))
        })
        .collect::<TransformResult<Vec<_>>>()?;

    sort_by_column(Table::new(ordered)?, "year", true)
}

/// Merge, validate and write the yearly summary to
/// `<output_dir>/yearly_summary.csv`.
pub fn build_yearly_summary(
    adhesion: &Table,
    certification: &Table,
    output_dir: &Path,
) -> PipelineResult<SummaryResult> {
    let table = merge_yearly(adhesion, certification)?;
    validate_yearly_summary(&table)?;

    let destination = output_dir.join(YEARLY_SUMMARY_FILE);
    write_table(&table, &destination)?;
    log_success(format!(
        "yearly summary: {} years → {}",
        table.height(),
        destination.display()
    ));

    Ok(SummaryResult { table, destination })
}

/// Build the summary from a finished run. Both by-year datasets must have
/// produced a result.
pub fn summarize_report(report: &RunReport, output_dir: &Path) -> PipelineResult<SummaryResult> {
    let adhesion = report.require(ADHESION_BY_YEAR)?;
    let certification = report.require(CERTIFICATION_BY_YEAR)?;
    build_yearly_summary(&adhesion.table, &certification.table, output_dir)
}
