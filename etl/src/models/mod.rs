//! Tabular container used by every stage of the pipeline.
//!
//! A [`Table`] is an ordered list of named [`Column`]s of equal length.
//! Cells are typed ([`Cell`]) and carry an explicit missing marker, so the
//! structural cleaning steps never have to guess what "empty" means.
//!
//! ```text
//! Table
//! ├── Column "year"          [Int(2010), Int(2011), Missing]
//! ├── Column "installations" [Text("5"), Text(""), Int(3)]
//! └── Column "companies"     [...]
//! ```

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::{TransformError, TransformResult};

// =============================================================================
// Cell
// =============================================================================

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Missing,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Build a cell from a raw CSV field. Empty or blank fields are missing.
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Cell::Missing
        } else {
            Cell::Text(raw.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Text view of the cell, `None` when missing.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Cell::Missing => None,
            Cell::Int(n) => Some(Cow::Owned(n.to_string())),
            Cell::Float(f) => Some(Cow::Owned(f.to_string())),
            Cell::Text(s) => Some(Cow::Borrowed(s)),
        }
    }

    /// JSON view of the cell (used by schema validation).
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Missing => Value::Null,
            Cell::Int(n) => Value::Number((*n).into()),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }

    /// Total order used by sorting: numbers, then text, then missing.
    ///
    /// Missing cells are not handled here; callers place them last
    /// independently of the sort direction.
    pub fn compare(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Int(a), Cell::Int(b)) => a.cmp(b),
            (Cell::Int(a), Cell::Float(b)) => (*a as f64).total_cmp(b),
            (Cell::Float(a), Cell::Int(b)) => a.total_cmp(&(*b as f64)),
            (Cell::Float(a), Cell::Float(b)) => a.total_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Int(_) | Cell::Float(_), Cell::Text(_)) => Ordering::Less,
            (Cell::Text(_), Cell::Int(_) | Cell::Float(_)) => Ordering::Greater,
            (Cell::Missing, Cell::Missing) => Ordering::Equal,
            (Cell::Missing, _) => Ordering::Greater,
            (_, Cell::Missing) => Ordering::Less,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Int(n) => write!(f, "{}", n),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::from_raw(value)
    }
}

// =============================================================================
// Column
// =============================================================================

/// A named sequence of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    pub fn is_all_missing(&self) -> bool {
        self.cells.iter().all(Cell::is_missing)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

// =============================================================================
// Table
// =============================================================================

/// Ordered, named columns of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, checking equal lengths and unique names.
    pub fn new(columns: Vec<Column>) -> TransformResult<Self> {
        let mut seen = HashSet::new();
        let expected = columns.first().map(Column::len).unwrap_or(0);

        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(TransformError::DuplicateColumn(column.name.clone()));
            }
            if column.len() != expected {
                return Err(TransformError::RaggedColumns {
                    column: column.name.clone(),
                    expected,
                    actual: column.len(),
                });
            }
        }

        Ok(Self { columns })
    }

    /// Build a table from row-major data.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> TransformResult<Self> {
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();

        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TransformError::RaggedColumns {
                    column: format!("row {}", row_idx),
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
            for (column, cell) in columns.iter_mut().zip(row) {
                column.cells.push(cell);
            }
        }

        Self::new(columns)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column lookup that fails with [`TransformError::MissingColumn`].
    pub fn require(&self, name: &str) -> TransformResult<&Column> {
        self.column(name).ok_or_else(|| TransformError::missing(name))
    }

    pub fn require_mut(&mut self, name: &str) -> TransformResult<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| TransformError::missing(name))
    }

    /// Cells of one row, in column order.
    pub fn row(&self, index: usize) -> Vec<&Cell> {
        self.columns.iter().map(|c| &c.cells[index]).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&Cell>> + '_ {
        (0..self.height()).map(move |i| self.row(i))
    }

    /// Keep only rows whose mask entry is `true`.
    pub fn filter_rows(self, mask: &[bool]) -> Self {
        let columns = self
            .columns
            .into_iter()
            .map(|column| Column {
                name: column.name,
                cells: column
                    .cells
                    .into_iter()
                    .zip(mask)
                    .filter_map(|(cell, keep)| keep.then_some(cell))
                    .collect(),
            })
            .collect();
        Self { columns }
    }

    /// Reorder rows by index. Indices must be in range.
    pub fn take_rows(self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .into_iter()
            .map(|column| Column {
                cells: indices.iter().map(|&i| column.cells[i].clone()).collect(),
                name: column.name,
            })
            .collect();
        Self { columns }
    }

    /// Keep only columns matching the predicate.
    pub fn retain_columns(mut self, keep: impl Fn(&Column) -> bool) -> Self {
        self.columns.retain(|c| keep(c));
        self
    }

    /// Relabel columns with a name function, rejecting collisions.
    pub fn rename_with(self, rename: impl Fn(&str) -> String) -> TransformResult<Self> {
        let columns = self
            .columns
            .into_iter()
            .map(|column| Column {
                name: rename(&column.name),
                cells: column.cells,
            })
            .collect();
        Self::new(columns)
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_json_rows(&self) -> Vec<Value> {
        self.rows()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, cell)| (column.name.clone(), cell.to_json()))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Cell::from_raw(v)).collect()
    }

    #[test]
    fn test_blank_fields_are_missing() {
        assert_eq!(Cell::from_raw(""), Cell::Missing);
        assert_eq!(Cell::from_raw("   "), Cell::Missing);
        assert_eq!(Cell::from_raw(" 5 "), Cell::Text(" 5 ".into()));
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = Table::new(vec![
            Column::new("a", text(&["1", "2"])),
            Column::new("b", text(&["1"])),
        ]);
        assert!(matches!(result, Err(TransformError::RaggedColumns { .. })));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let result = Table::new(vec![
            Column::new("a", text(&["1"])),
            Column::new("a", text(&["2"])),
        ]);
        assert!(matches!(result, Err(TransformError::DuplicateColumn(name)) if name == "a"));
    }

    #[test]
    fn test_from_rows_and_row_access() {
        let table = Table::from_rows(
            vec!["year".into(), "companies".into()],
            vec![text(&["2010", "3"]), text(&["2011", ""])],
        )
        .unwrap();

        assert_eq!(table.height(), 2);
        assert_eq!(table.width(), 2);
        assert_eq!(table.row(1)[1], &Cell::Missing);
        assert_eq!(table.column_names(), vec!["year", "companies"]);
    }

    #[test]
    fn test_filter_and_take_rows() {
        let table = Table::new(vec![Column::new("a", text(&["x", "y", "z"]))]).unwrap();
        let filtered = table.clone().filter_rows(&[true, false, true]);
        assert_eq!(filtered.require("a").unwrap().cells, text(&["x", "z"]));

        let reordered = table.take_rows(&[2, 0]);
        assert_eq!(reordered.require("a").unwrap().cells, text(&["z", "x"]));
    }

    #[test]
    fn test_require_missing_column() {
        let table = Table::empty();
        assert!(matches!(
            table.require("year"),
            Err(TransformError::MissingColumn { column }) if column == "year"
        ));
    }

    #[test]
    fn test_to_json_rows() {
        let table = Table::new(vec![
            Column::new("year", vec![Cell::Int(2015)]),
            Column::new("sector", vec![Cell::Text("Minería".into())]),
            Column::new("note", vec![Cell::Missing]),
        ])
        .unwrap();

        let rows = table.to_json_rows();
        assert_eq!(rows[0], serde_json::json!({"year": 2015, "sector": "Minería", "note": null}));
    }

    #[test]
    fn test_compare_orders_numbers_before_text() {
        assert_eq!(Cell::Int(2).compare(&Cell::Float(2.5)), Ordering::Less);
        assert_eq!(Cell::Int(9).compare(&Cell::Text("1".into())), Ordering::Less);
        assert_eq!(Cell::Text("b".into()).compare(&Cell::Text("a".into())), Ordering::Greater);
    }
}
