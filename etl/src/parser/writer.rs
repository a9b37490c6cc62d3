//! CSV output for processed tables.
//!
//! Header row first, then one record per row. Missing cells are written as
//! empty fields, integers without a decimal part.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::Table;

/// Serialize a table to CSV into any writer.
pub fn write_to<W: Write>(table: &Table, out: W) -> CsvResult<()> {
    let mut writer = csv::WriterBuilder::new().from_writer(out);

    let to_parse_err = |e: csv::Error| CsvError::Parse {
        line: 0,
        message: e.to_string(),
    };

    writer.write_record(table.column_names()).map_err(to_parse_err)?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|cell| cell.to_string()))
            .map_err(to_parse_err)?;
    }
    writer.flush().map_err(|e| CsvError::Parse {
        line: 0,
        message: e.to_string(),
    })?;

    Ok(())
}

/// Render a table as a CSV string.
pub fn table_to_csv(table: &Table) -> CsvResult<String> {
    let mut buf = Vec::new();
    write_to(table, &mut buf)?;
    String::from_utf8(buf).map_err(|e| CsvError::Encoding(e.to_string()))
}

/// Write a table to `path`, creating parent directories and overwriting any
/// previous file.
pub fn write_table(table: &Table, path: &Path) -> CsvResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| CsvError::io(parent, e))?;
        }
    }

    let file = fs::File::create(path).map_err(|e| CsvError::io(path, e))?;
    write_to(table, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, Column};

    fn sample() -> Table {
        Table::new(vec![
            Column::new("year", vec![Cell::Int(2010), Cell::Int(2011)]),
            Column::new(
                "sector",
                vec![Cell::Text("Agro, pesca".into()), Cell::Missing],
            ),
            Column::new("ratio", vec![Cell::Float(0.5), Cell::Float(2.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_table_to_csv() {
        let csv = table_to_csv(&sample()).unwrap();
        assert_eq!(csv, "year,sector,ratio\n2010,\"Agro, pesca\",0.5\n2011,,2\n");
    }

    #[test]
    fn test_write_table_creates_dirs_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("processed").join("out.csv");

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale content that is much longer than the output\n").unwrap();

        write_table(&sample(), &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("year,sector,ratio\n"));
        assert!(!written.contains("stale"));
    }

    #[test]
    fn test_write_reparse() {
        let csv = table_to_csv(&sample()).unwrap();
        let table = crate::parser::parse_str(&csv, ',').unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.require("sector").unwrap().cells[1], Cell::Missing);
    }
}
