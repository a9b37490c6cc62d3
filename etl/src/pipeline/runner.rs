//! Single-dataset execution: extract → transform → load.
//!
//! ```text
//! Created ──▶ Extracted ──▶ Transformed(1..n) ──▶ Loaded ──▶ Done
//! ```
//!
//! Strictly linear. Any failure aborts the dataset; nothing is retried.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::logs::{log_dataset, LogEntry};
use crate::models::Table;
use crate::parser::{parse_csv_file_auto, write_table};
use crate::transform::TransformationChain;
use crate::validation::{compile_checks, Validator};

use super::config::DatasetDescriptor;

/// Output of one dataset run.
#[derive(Debug, Clone)]
pub struct DatasetResult {
    pub dataset_name: String,
    pub table: Table,
    pub destination: PathBuf,
}

/// Runner lifecycle, reported through the log broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Extracted,
    Transformed,
    Loaded,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Created => "created",
            RunState::Extracted => "extracted",
            RunState::Transformed => "transformed",
            RunState::Loaded => "loaded",
            RunState::Done => "done",
        };
        f.write_str(label)
    }
}

/// Reads a CSV export, optionally validating the raw table.
pub struct CsvExtractor {
    source: PathBuf,
    validator: Option<Validator>,
}

impl CsvExtractor {
    pub fn new(source: impl Into<PathBuf>, validator: Option<Validator>) -> Self {
        Self {
            source: source.into(),
            validator,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn extract(&self) -> PipelineResult<Table> {
        let parsed = parse_csv_file_auto(&self.source)?;
        if let Some(validator) = &self.validator {
            validator(&parsed.table)?;
        }
        Ok(parsed.table)
    }
}

/// Writes processed tables as CSV.
pub struct CsvLoader {
    destination: PathBuf,
}

impl CsvLoader {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    pub fn load(&self, table: &Table) -> PipelineResult<()> {
        write_table(table, &self.destination)?;
        Ok(())
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Runs the ETL process for a single dataset.
pub struct DatasetRunner {
    name: String,
    extractor: CsvExtractor,
    chain: TransformationChain,
    output_validator: Option<Validator>,
    loader: CsvLoader,
}

impl DatasetRunner {
    pub fn new(
        name: impl Into<String>,
        extractor: CsvExtractor,
        chain: TransformationChain,
        loader: CsvLoader,
    ) -> Self {
        Self {
            name: name.into(),
            extractor,
            chain,
            output_validator: None,
            loader,
        }
    }

    pub fn from_descriptor(descriptor: &DatasetDescriptor) -> Self {
        let extractor = CsvExtractor::new(
            descriptor.source.clone(),
            compile_checks(&descriptor.extract_checks),
        );
        let mut runner = Self::new(
            descriptor.name.clone(),
            extractor,
            descriptor.chain.clone(),
            CsvLoader::new(descriptor.destination.clone()),
        );
        runner.output_validator = compile_checks(&descriptor.output_checks);
        runner
    }

    /// Replace the check run on the transformed table before loading.
    pub fn with_output_validator(mut self, validator: Validator) -> Self {
        self.output_validator = Some(validator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extract, transform and load.
    pub fn run(&self) -> PipelineResult<DatasetResult> {
        self.transition(RunState::Created, format!("source {}", self.extractor.source().display()));

        let table = self
            .extractor
            .extract()
            .map_err(|e| self.fail(e))?;
        self.transition(
            RunState::Extracted,
            format!("{} rows × {} columns", table.height(), table.width()),
        );

        self.finish(table)
    }

    /// Transform and load an already extracted table.
    pub fn run_table(&self, table: Table) -> PipelineResult<DatasetResult> {
        self.transition(RunState::Extracted, format!("{} rows supplied", table.height()));
        self.finish(table)
    }

    fn finish(&self, table: Table) -> PipelineResult<DatasetResult> {
        let table = self
            .chain
            .run(&self.name, table)
            .map_err(|e| self.fail(e))?;
        self.transition(
            RunState::Transformed,
            format!("{} steps applied", self.chain.len()),
        );

        if let Some(validator) = &self.output_validator {
            validator(&table).map_err(|e| self.fail(e.into()))?;
        }

        self.loader.load(&table).map_err(|e| self.fail(e))?;
        self.transition(
            RunState::Loaded,
            format!("{} rows → {}", table.height(), self.loader.destination().display()),
        );

        let result = DatasetResult {
            dataset_name: self.name.clone(),
            table,
            destination: self.loader.destination().to_path_buf(),
        };
        log_dataset(&self.name, LogEntry::success(RunState::Done.to_string()));
        Ok(result)
    }

    fn transition(&self, state: RunState, detail: String) {
        log_dataset(&self.name, LogEntry::info(format!("{}: {}", state, detail)));
    }

    fn fail(&self, err: PipelineError) -> PipelineError {
        let err = err.in_dataset(&self.name);
        log_dataset(&self.name, LogEntry::error(err.to_string()));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CsvError, TransformError, ValidationError};
    use crate::logs::LOG_BROADCASTER;
    use crate::models::{Cell, Column};
    use crate::transform::Step;
    use crate::validation::{non_empty, Check, EmbeddedSchema};
    use tokio::sync::broadcast::error::TryRecvError;

    const RAW_BY_YEAR: &str = "\
Año Adhesión Establecimiento,Instalaciones Adheridas,Empresas Adheridas,
2012,4,2,
2010,5,3,

2011,,1,
Total,9,6,
";

    fn by_year_descriptor(dir: &Path, name: &str) -> DatasetDescriptor {
        DatasetDescriptor::new(
            name,
            dir.join("raw.csv"),
            dir.join("out").join(format!("{}.csv", name)),
            TransformationChain::cleaning()
                .then(Step::rename([
                    ("ano_adhesion_establecimiento", "year"),
                    ("instalaciones_adheridas", "installations"),
                    ("empresas_adheridas", "companies"),
                ]))
                .then(Step::numeric_row_filter("year"))
                .then(Step::integer_column("year"))
                .then(Step::enforce_integers(["installations", "companies"]))
                .then(Step::sort("year", true)),
        )
        .with_extract_check(Check::NonEmpty)
        .with_output_check(Check::Schema {
            schema: EmbeddedSchema::ByYear,
        })
    }

    #[test]
    fn test_run_extracts_transforms_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("raw.csv"), RAW_BY_YEAR).unwrap();

        let descriptor = by_year_descriptor(dir.path(), "adhesion_by_year");
        let runner = DatasetRunner::from_descriptor(&descriptor);
        let result = runner.run().unwrap();

        assert_eq!(result.dataset_name, "adhesion_by_year");
        assert_eq!(
            result.table.require("year").unwrap().cells,
            vec![Cell::Int(2010), Cell::Int(2011), Cell::Int(2012)]
        );

        let written = std::fs::read_to_string(&result.destination).unwrap();
        assert_eq!(
            written,
            "year,installations,companies\n2010,5,3\n2011,0,1\n2012,4,2\n"
        );
    }

    #[test]
    fn test_negative_counts_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("raw.csv"),
            "Año Adhesión Establecimiento,Instalaciones Adheridas,Empresas Adheridas\n\
             2010,5,3\n\
             2011,-2,1\n",
        )
        .unwrap();

        let descriptor = by_year_descriptor(dir.path(), "negative_counts");
        let runner = DatasetRunner::from_descriptor(&descriptor);
        let result = runner.run().unwrap();
        assert_eq!(
            result.table.require("installations").unwrap().cells,
            vec![Cell::Int(5), Cell::Int(-2)]
        );
    }

    #[test]
    fn test_rerun_overwrites_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("raw.csv"), RAW_BY_YEAR).unwrap();
        let runner = DatasetRunner::from_descriptor(&by_year_descriptor(dir.path(), "rerun"));

        let first = runner.run().unwrap();
        let second = runner.run().unwrap();
        assert_eq!(
            std::fs::read(&first.destination).unwrap(),
            std::fs::read(&second.destination).unwrap()
        );
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = DatasetRunner::from_descriptor(&by_year_descriptor(dir.path(), "no_source"));

        match runner.run().unwrap_err() {
            PipelineError::Dataset { dataset, source } => {
                assert_eq!(dataset, "no_source");
                assert!(matches!(*source, PipelineError::Csv(CsvError::Io { .. })));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_header_only_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("raw.csv"),
            "Año Adhesión Establecimiento,Empresas\n\n",
        )
        .unwrap();
        let runner = DatasetRunner::from_descriptor(&by_year_descriptor(dir.path(), "empty_input"));

        match runner.run().unwrap_err() {
            PipelineError::Dataset { source, .. } => {
                assert!(matches!(*source, PipelineError::Validation(ValidationError::EmptyFrame)));
            }
            other => panic!("unexpected: {other}"),
        }
        assert!(!dir.path().join("out").join("empty_input.csv").exists());
    }

    #[test]
    fn test_missing_column_surfaces_at_consuming_step() {
        let dir = tempfile::tempdir().unwrap();
        let runner = DatasetRunner::new(
            "synthetic",
            CsvExtractor::new(dir.path().join("unused.csv"), None),
            TransformationChain::new(vec![
                Step::rename([("foo", "year")]),
                Step::sort("year", true),
            ]),
            CsvLoader::new(dir.path().join("synthetic.csv")),
        );
        let table = Table::new(vec![Column::new("bar", vec![Cell::Int(1)])]).unwrap();

        match runner.run_table(table).unwrap_err() {
            PipelineError::Step { index, source, .. } => {
                assert_eq!(index, 1);
                assert!(matches!(
                    source,
                    TransformError::MissingColumn { column } if column == "year"
                ));
            }
            other => panic!("unexpected: {other}"),
        }
        assert!(!dir.path().join("synthetic.csv").exists());
    }

    #[test]
    fn test_output_validator_blocks_load() {
        let dir = tempfile::tempdir().unwrap();
        let runner = DatasetRunner::new(
            "filtered_out",
            CsvExtractor::new(dir.path().join("unused.csv"), None),
            TransformationChain::new(vec![Step::value_filter("size", ["MICRO"])]),
            CsvLoader::new(dir.path().join("filtered_out.csv")),
        )
        .with_output_validator(non_empty());
        let table = Table::new(vec![Column::new("size", vec!["GRANDE".into()])]).unwrap();

        assert!(runner.run_table(table).is_err());
        assert!(!dir.path().join("filtered_out.csv").exists());
    }

    #[test]
    fn test_state_transitions_logged_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("raw.csv"), RAW_BY_YEAR).unwrap();
        let mut rx = LOG_BROADCASTER.subscribe();

        DatasetRunner::from_descriptor(&by_year_descriptor(dir.path(), "state_log_test"))
            .run()
            .unwrap();

        let mut states = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(entry)
                    if entry.dataset.as_deref() == Some("state_log_test") && entry.indent == 0 =>
                {
                    let state = entry.message.split(':').next().unwrap_or_default().to_string();
                    states.push(state);
                }
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert_eq!(states, vec!["created", "extracted", "transformed", "loaded", "done"]);
    }
}
