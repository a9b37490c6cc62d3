//! Runs every registered dataset and collects the outcome.
//!
//! Datasets never read each other's output, so they can run in any order or
//! all at once. A failing dataset is recorded and the others still run. The
//! yearly summary is the only cross-dataset step; it waits for the two by-year
//! datasets explicitly.

use std::collections::BTreeMap;
use std::path::Path;

use futures::future::join_all;
use tokio::task::{JoinError, JoinHandle};

use crate::error::{PipelineError, PipelineResult};
use crate::logs::{log_error, log_info, log_success, log_warning};
use crate::summary::{build_yearly_summary, summarize_report, SummaryResult};

use super::config::{EtlConfig, ADHESION_BY_YEAR, CERTIFICATION_BY_YEAR};
use super::runner::{DatasetResult, DatasetRunner};

/// Results and failures of one pipeline run, keyed by dataset name.
#[derive(Debug, Default)]
pub struct RunReport {
    pub results: BTreeMap<String, DatasetResult>,
    pub failures: BTreeMap<String, PipelineError>,
}

impl RunReport {
    /// Result of `name`, or `MissingResult` when it failed or never ran.
    pub fn require(&self, name: &str) -> PipelineResult<&DatasetResult> {
        self.results
            .get(name)
            .ok_or_else(|| PipelineError::MissingResult(name.to_string()))
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, name: String, outcome: PipelineResult<DatasetResult>) {
        match outcome {
            Ok(result) => {
                self.results.insert(name, result);
            }
            Err(err) => {
                self.failures.insert(name, err);
            }
        }
    }
}

/// A run plus its yearly summary.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub report: RunReport,
    pub summary: PipelineResult<SummaryResult>,
}

type DatasetHandle = (String, JoinHandle<PipelineResult<DatasetResult>>);

/// Main ETL pipeline
pub struct EtlPipeline {
    config: EtlConfig,
}

impl EtlPipeline {
    pub fn new(config: EtlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Run every dataset in registry order on the current thread.
    pub fn run(&self) -> RunReport {
        log_info(format!("Running {} datasets", self.config.datasets.len()));

        let mut report = RunReport::default();
        for descriptor in &self.config.datasets {
            let outcome = DatasetRunner::from_descriptor(descriptor).run();
            report.record(descriptor.name.clone(), outcome);
        }

        log_report(&report);
        report
    }

    /// Sequential run followed by the yearly summary.
    pub fn run_with_summary(&self) -> PipelineOutcome {
        let report = self.run();
        let summary = summarize_report(&report, self.output_dir());
        log_summary(&summary);
        PipelineOutcome { report, summary }
    }

    /// Run every dataset on the blocking pool and wait for all of them.
    pub async fn run_concurrent(&self) -> RunReport {
        log_info(format!(
            "Running {} datasets concurrently",
            self.config.datasets.len()
        ));

        let mut report = RunReport::default();
        join_into(&mut report, self.spawn_all()).await;

        log_report(&report);
        report
    }

    /// Concurrent run where the summary starts as soon as both by-year
    /// datasets are done, while the others may still be running.
    pub async fn run_concurrent_with_summary(&self) -> PipelineOutcome {
        log_info(format!(
            "Running {} datasets concurrently",
            self.config.datasets.len()
        ));

        let mut pending = self.spawn_all();
        let by_year: Vec<DatasetHandle> = [ADHESION_BY_YEAR, CERTIFICATION_BY_YEAR]
            .iter()
            .filter_map(|name| take_handle(&mut pending, name))
            .collect();

        let mut report = RunReport::default();
        join_into(&mut report, by_year).await;

        let summary = match (
            report.require(ADHESION_BY_YEAR),
            report.require(CERTIFICATION_BY_YEAR),
        ) {
            (Ok(adhesion), Ok(certification)) => {
                let adhesion = adhesion.table.clone();
                let certification = certification.table.clone();
                let output_dir = self.config.output_dir.clone();
                tokio::task::spawn_blocking(move || {
                    build_yearly_summary(&adhesion, &certification, &output_dir)
                })
                .await
                .unwrap_or_else(|e| Err(join_failure(e)))
            }
            (Err(err), _) | (_, Err(err)) => Err(err),
        };
        log_summary(&summary);

        join_into(&mut report, pending).await;
        log_report(&report);

        PipelineOutcome { report, summary }
    }

    fn spawn_all(&self) -> Vec<DatasetHandle> {
        self.config
            .datasets
            .iter()
            .map(|descriptor| {
                let runner = DatasetRunner::from_descriptor(descriptor);
                let handle = tokio::task::spawn_blocking(move || runner.run());
                (descriptor.name.clone(), handle)
            })
            .collect()
    }
}

fn take_handle(pending: &mut Vec<DatasetHandle>, name: &str) -> Option<DatasetHandle> {
    let position = pending.iter().position(|(n, _)| n == name)?;
    Some(pending.remove(position))
}

async fn join_into(report: &mut RunReport, handles: Vec<DatasetHandle>) {
    let (names, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
    let joined = join_all(handles).await;

    for (name, outcome) in names.into_iter().zip(joined) {
        let outcome = outcome.unwrap_or_else(|e| Err(join_failure(e).in_dataset(&name)));
        report.record(name, outcome);
    }
}

fn join_failure(err: JoinError) -> PipelineError {
    PipelineError::Join(err.to_string())
}

fn log_report(report: &RunReport) {
    for (name, err) in &report.failures {
        log_error(format!("{}: {}", name, err));
    }
    if report.is_success() {
        log_success(format!("{} datasets processed", report.results.len()));
    } else {
        log_warning(format!(
            "{} datasets processed, {} failed",
            report.results.len(),
            report.failures.len()
        ));
    }
}

fn log_summary(summary: &PipelineResult<SummaryResult>) {
    if let Err(err) = summary {
        log_error(format!("yearly summary not built: {}", err));
    }
}
