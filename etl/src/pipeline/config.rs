//! Dataset descriptors and the pipeline registry.
//!
//! The default registry mirrors the five APL exports. It is plain data built
//! once and handed to [`crate::pipeline::EtlPipeline`]; nothing mutates it
//! afterwards.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::transform::{Step, TransformationChain};
use crate::validation::{Check, EmbeddedSchema};

pub const ADHESION_BY_YEAR: &str = "adhesion_by_year";
pub const ADHESION_BY_SECTOR: &str = "adhesion_by_sector";
pub const ADHESION_BY_SIZE: &str = "adhesion_by_size";
pub const CERTIFICATION_BY_YEAR: &str = "certification_by_year";
pub const CERTIFICATION_BY_SECTOR: &str = "certification_by_sector";

/// Company sizes accepted by the size dataset.
pub const COMPANY_SIZES: [&str; 5] = ["PEQUEÑA", "MICRO", "MEDIANA", "GRANDE", "SSPP"];

/// Processed outputs live here, relative to the project root.
const DEFAULT_OUTPUT_DIR: &str = "data/processed";

/// How one dataset is extracted, transformed and stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Dataset identifier, also the key of its result
    pub name: String,
    /// Raw CSV export
    pub source: PathBuf,
    /// Processed CSV
    pub destination: PathBuf,
    /// Ordered transformation steps
    #[serde(default)]
    pub chain: TransformationChain,
    /// Checks run on the raw table right after extraction
    #[serde(default)]
    pub extract_checks: Vec<Check>,
    /// Checks run on the transformed table before it is written
    #[serde(default)]
    pub output_checks: Vec<Check>,
}

impl DatasetDescriptor {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        chain: TransformationChain,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            destination: destination.into(),
            chain,
            extract_checks: Vec::new(),
            output_checks: Vec::new(),
        }
    }

    pub fn with_extract_check(mut self, check: Check) -> Self {
        self.extract_checks.push(check);
        self
    }

    pub fn with_output_check(mut self, check: Check) -> Self {
        self.output_checks.push(check);
        self
    }
}

/// Global configuration for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Directory holding the raw exports
    pub base_path: PathBuf,
    /// Directory receiving processed datasets and the yearly summary
    pub output_dir: PathBuf,
    /// Registry, in run order
    pub datasets: Vec<DatasetDescriptor>,
}

/// On-disk registry format. Relative paths resolve against the project root.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    output_dir: Option<PathBuf>,
    datasets: Vec<DatasetEntry>,
}

#[derive(Debug, Deserialize)]
struct DatasetEntry {
    name: String,
    source: PathBuf,
    #[serde(default)]
    destination: Option<PathBuf>,
    #[serde(default)]
    chain: TransformationChain,
    #[serde(default)]
    extract_checks: Vec<Check>,
    #[serde(default)]
    output_checks: Vec<Check>,
}

impl EtlConfig {
    /// Build a configuration, rejecting duplicate dataset names.
    pub fn new(
        base_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        datasets: Vec<DatasetDescriptor>,
    ) -> PipelineResult<Self> {
        let mut seen = HashSet::new();
        for dataset in &datasets {
            if !seen.insert(dataset.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "dataset '{}' is declared twice",
                    dataset.name
                )));
            }
        }

        Ok(Self {
            base_path: base_path.into(),
            output_dir: output_dir.into(),
            datasets,
        })
    }

    /// The five APL datasets, reading exports from `project_root` and writing
    /// to `project_root/data/processed`.
    pub fn build_default(project_root: &Path) -> Self {
        let output_dir = project_root.join(DEFAULT_OUTPUT_DIR);
        let source = |file: &str| project_root.join(file);
        let destination = |name: &str| output_dir.join(format!("{}.csv", name));

        let datasets = vec![
            DatasetDescriptor::new(
                ADHESION_BY_YEAR,
                source("APL - Adhesión x año.csv"),
                destination(ADHESION_BY_YEAR),
                by_year_chain(
                    "ano_adhesion_establecimiento",
                    "instalaciones_adheridas",
                    "empresas_adheridas",
                ),
            )
            .with_extract_check(Check::NonEmpty)
            .with_output_check(Check::Schema {
                schema: EmbeddedSchema::ByYear,
            }),
            DatasetDescriptor::new(
                ADHESION_BY_SECTOR,
                source("APL - Adhesión x sector.csv"),
                destination(ADHESION_BY_SECTOR),
                by_sector_chain("instalaciones_adheridas_por_sector"),
            )
            .with_extract_check(Check::NonEmpty),
            DatasetDescriptor::new(
                ADHESION_BY_SIZE,
                source("APL - Adhesión x tamaño.csv"),
                destination(ADHESION_BY_SIZE),
                TransformationChain::cleaning()
                    .then(Step::rename([
                        ("tamano_empresa", "company_size"),
                        ("empresas", "companies"),
                        ("instalacion", "installations"),
                    ]))
                    .then(Step::non_null_filter(["company_size"]))
                    .then(Step::value_filter("company_size", COMPANY_SIZES))
                    .then(Step::enforce_integers(["companies", "installations"]))
                    .then(Step::sort("companies", false)),
            )
            .with_extract_check(Check::NonEmpty),
            DatasetDescriptor::new(
                CERTIFICATION_BY_YEAR,
                source("APL - Certificación x año.csv"),
                destination(CERTIFICATION_BY_YEAR),
                by_year_chain(
                    "ano_certificacion_del_establecimiento",
                    "instalaciones_certificadas",
                    "empresas_certificadas",
                ),
            )
            .with_extract_check(Check::NonEmpty)
            .with_output_check(Check::Schema {
                schema: EmbeddedSchema::ByYear,
            }),
            DatasetDescriptor::new(
                CERTIFICATION_BY_SECTOR,
                source("APL - Certificación x sector.csv"),
                destination(CERTIFICATION_BY_SECTOR),
                by_sector_chain("instalaciones_certificadas_por_sector"),
            )
            .with_extract_check(Check::NonEmpty),
        ];

        Self {
            base_path: project_root.to_path_buf(),
            output_dir,
            datasets,
        }
    }

    /// Load a registry from a JSON file.
    ///
    /// ```json
    /// {
    ///   "output_dir": "out",
    ///   "datasets": [
    ///     { "name": "adhesion_by_year", "source": "adhesion.csv",
    ///       "chain": [{"type": "drop_empty_rows"}] }
    ///   ]
    /// }
    /// ```
    ///
    /// A dataset without `destination` is written to `<output_dir>/<name>.csv`.
    pub fn from_json_file(path: &Path, project_root: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content, project_root)
    }

    pub fn from_json(content: &str, project_root: &Path) -> PipelineResult<Self> {
        let file: ConfigFile = serde_json::from_str(content)
            .map_err(|e| PipelineError::Config(format!("invalid registry: {}", e)))?;

        let output_dir = resolve(
            project_root,
            &file.output_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        );

        let datasets = file
            .datasets
            .into_iter()
            .map(|entry| DatasetDescriptor {
                source: resolve(project_root, &entry.source),
                destination: entry
                    .destination
                    .map(|d| resolve(project_root, &d))
                    .unwrap_or_else(|| output_dir.join(format!("{}.csv", entry.name))),
                name: entry.name,
                chain: entry.chain,
                extract_checks: entry.extract_checks,
                output_checks: entry.output_checks,
            })
            .collect();

        Self::new(project_root, output_dir, datasets)
    }

    /// Re-target every destination (and the summary) to `output_dir`,
    /// keeping file names.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        for dataset in &mut self.datasets {
            let file_name = dataset
                .destination
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(format!("{}.csv", dataset.name)));
            dataset.destination = output_dir.join(file_name);
        }
        self.output_dir = output_dir;
        self
    }

    pub fn get(&self, name: &str) -> Option<&DatasetDescriptor> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn dataset_names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn by_year_chain(year: &str, installations: &str, companies: &str) -> TransformationChain {
    TransformationChain::cleaning()
        .then(Step::rename([
            (year, "year"),
            (installations, "installations"),
            (companies, "companies"),
        ]))
        .then(Step::numeric_row_filter("year"))
        .then(Step::integer_column("year"))
        .then(Step::enforce_integers(["installations", "companies"]))
        .then(Step::sort("year", true))
}

fn by_sector_chain(installations: &str) -> TransformationChain {
    TransformationChain::cleaning()
        .then(Step::rename([
            ("sector_economico", "sector"),
            (installations, "installations"),
        ]))
        .then(Step::integer_column("installations"))
        .then(Step::sort("installations", false))
}
