//! Run manifest written next to the processed outputs.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::summary::SummaryResult;

use super::coordinator::RunReport;

pub const MANIFEST_FILE: &str = "run_manifest.json";

/// One dataset that produced output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDataset {
    pub name: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub destination: PathBuf,
}

/// One dataset that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFailure {
    pub name: String,
    pub error: String,
}

/// What a run produced and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunManifest {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub output_dir: PathBuf,
    pub datasets: Vec<ManifestDataset>,
    pub failures: Vec<ManifestFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<PathBuf>,
}

impl RunManifest {
    pub fn from_report(
        report: &RunReport,
        summary: Option<&SummaryResult>,
        output_dir: &Path,
        started_at: DateTime<Utc>,
    ) -> Self {
        let datasets = report
            .results
            .values()
            .map(|result| ManifestDataset {
                name: result.dataset_name.clone(),
                rows: result.table.height(),
                columns: result
                    .table
                    .column_names()
                    .into_iter()
                    .map(String::from)
                    .collect(),
                destination: result.destination.clone(),
            })
            .collect();

        let failures = report
            .failures
            .iter()
            .map(|(name, err)| ManifestFailure {
                name: name.clone(),
                error: err.to_string(),
            })
            .collect();

        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            output_dir: output_dir.to_path_buf(),
            datasets,
            failures,
            summary: summary.map(|s| s.destination.clone()),
        }
    }

    /// Write as pretty JSON to `<output_dir>/run_manifest.json`.
    pub fn write(&self) -> PipelineResult<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("manifest serialization: {}", e)))?;
        fs::write(&path, json)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("invalid manifest: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, Column, Table};
    use crate::pipeline::DatasetResult;

    fn report(dir: &Path) -> RunReport {
        let mut report = RunReport::default();
        report.results.insert(
            "adhesion_by_sector".to_string(),
            DatasetResult {
                dataset_name: "adhesion_by_sector".to_string(),
                table: Table::new(vec![
                    Column::new("sector", vec!["Pesca".into()]),
                    Column::new("installations", vec![Cell::Int(7)]),
                ])
                .unwrap(),
                destination: dir.join("adhesion_by_sector.csv"),
            },
        );
        report.failures.insert(
            "adhesion_by_year".to_string(),
            PipelineError::MissingResult("adhesion_by_year".to_string()),
        );
        report
    }

    #[test]
    fn test_manifest_written_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("processed");
        let started = Utc::now();

        let manifest = RunManifest::from_report(&report(&out), None, &out, started);
        let path = manifest.write().unwrap();
        assert_eq!(path, out.join(MANIFEST_FILE));

        let loaded = RunManifest::load(&path).unwrap();
        assert_eq!(loaded.run_id, manifest.run_id);
        assert!(loaded.finished_at >= loaded.started_at);
        assert_eq!(loaded.datasets.len(), 1);
        assert_eq!(loaded.datasets[0].rows, 1);
        assert_eq!(loaded.datasets[0].columns, vec!["sector", "installations"]);
        assert_eq!(loaded.failures[0].name, "adhesion_by_year");
        assert!(loaded.summary.is_none());
    }

    #[test]
    fn test_manifest_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = RunManifest::from_report(&report(dir.path()), None, dir.path(), Utc::now());
        let json = serde_json::to_value(&manifest).unwrap();

        assert!(json.get("runId").and_then(|v| v.as_str()).is_some());
        assert!(json.get("startedAt").is_some());
        assert!(json.get("summary").is_none());
        assert_eq!(json["failures"][0]["error"], "Dataset result not available: adhesion_by_year");
    }
}
