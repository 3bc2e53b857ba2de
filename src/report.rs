//! Per-row outcomes and the JSON run report printed at the end of a run.

use serde::Serialize;
use std::path::PathBuf;

use crate::error::RowError;
use crate::pipeline::Stage;
use crate::rows::Row;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    /// The stage produced a new URL (or, for downloads, a file).
    Changed,
    /// The stage ran cleanly but had nothing to change.
    Unchanged,
    Failed { reason: String },
}

impl RowStatus {
    pub fn failed(err: &RowError) -> Self {
        Self::Failed {
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub changed: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub failures: Vec<Failure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub saved: Vec<PathBuf>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            changed: 0,
            unchanged: 0,
            failed: 0,
            failures: Vec::new(),
            saved: Vec::new(),
        }
    }

    pub fn record(&mut self, id: &str, status: RowStatus) {
        match status {
            RowStatus::Changed => self.changed += 1,
            RowStatus::Unchanged => self.unchanged += 1,
            RowStatus::Failed { reason } => {
                self.failed += 1;
                self.failures.push(Failure {
                    id: id.to_string(),
                    reason,
                });
            }
        }
    }

    pub fn total(&self) -> usize {
        self.changed + self.unchanged + self.failed
    }
}

/// Rows emitted by a URL-rewriting stage, one per input row and in input
/// order, plus what happened to each.
#[derive(Debug)]
pub struct StageOutput {
    pub rows: Vec<Row>,
    pub report: StageReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            started_at: now(),
            finished_at: None,
            stages: Vec::new(),
        }
    }

    pub fn push(&mut self, stage: StageReport) {
        self.stages.push(stage);
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(now());
        self
    }

    #[cfg(test)]
    pub(crate) fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

fn now() -> String {
    chrono::Local::now().to_rfc3339()
}
