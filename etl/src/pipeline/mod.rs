//! Dataset registry, runners and the coordinator that drives them.

pub mod config;
pub mod coordinator;
pub mod manifest;
pub mod runner;

pub use config::{DatasetDescriptor, EtlConfig};
pub use coordinator::{EtlPipeline, PipelineOutcome, RunReport};
pub use manifest::{RunManifest, MANIFEST_FILE};
pub use runner::{CsvExtractor, CsvLoader, DatasetResult, DatasetRunner, RunState};
