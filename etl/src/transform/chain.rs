//! Ordered transformation chains.
//!
//! A chain applies its steps strictly in declaration order: later steps rely
//! on the names and rows established by earlier ones, so chains are never
//! reordered or parallelized.

use serde::{Deserialize, Serialize};

use super::steps::Step;
use crate::error::{PipelineError, PipelineResult, TransformResult};
use crate::logs::{log_dataset, LogEntry};
use crate::models::Table;

/// An ordered list of steps bound to one dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformationChain {
    steps: Vec<Step>,
}

impl TransformationChain {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Chain starting with the structural cleaning every raw export needs:
    /// empty columns, then empty rows, then canonical headers.
    pub fn cleaning() -> Self {
        Self::new(vec![
            Step::DropEmptyColumns,
            Step::DropEmptyRows,
            Step::StandardizeColumnNames,
        ])
    }

    pub fn then(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply every step in order without logging or dataset context.
    pub fn apply(&self, table: Table) -> TransformResult<Table> {
        self.steps.iter().try_fold(table, |table, step| step.apply(table))
    }

    /// Apply every step for `dataset`, logging row and column counts after
    /// each one. The first failing step aborts the chain.
    pub fn run(&self, dataset: &str, table: Table) -> PipelineResult<Table> {
        let mut current = table;

        for (index, step) in self.steps.iter().enumerate() {
            let (rows, cols) = (current.height(), current.width());

            current = step.apply(current).map_err(|source| PipelineError::Step {
                dataset: dataset.to_string(),
                index,
                step: step.name().to_string(),
                source,
            })?;

            let mut message = format!(
                "step {} {}: {} rows × {} columns",
                index + 1,
                step,
                current.height(),
                current.width()
            );
            if current.height() != rows || current.width() != cols {
                message.push_str(&format!(" (was {} × {})", rows, cols));
            }
            log_dataset(dataset, LogEntry::info(message).with_indent(1));
        }

        Ok(current)
    }

    /// Parse a chain from its JSON list form.
    pub fn from_json(json: &str) -> TransformResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> TransformResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<Vec<Step>> for TransformationChain {
    fn from(steps: Vec<Step>) -> Self {
        Self::new(steps)
    }
}
