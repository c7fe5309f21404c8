//! Run bookkeeping: stages, outcomes, failures and the final summary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Dedup,
    Fetch,
    Normalize,
    Embed,
    Validate,
    Upsert,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::Dedup => "dedup",
            Stage::Fetch => "fetch",
            Stage::Normalize => "normalize",
            Stage::Embed => "embed",
            Stage::Validate => "validate",
            Stage::Upsert => "upsert",
            Stage::Report => "report",
        };
        write!(f, "{}", name)
    }
}

/// Terminal outcome of a run that did not abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    #[default]
    Success,
    PartialSuccess,
    SuccessNoNewData,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success => write!(f, "SUCCESS"),
            RunOutcome::PartialSuccess => write!(f, "PARTIAL_SUCCESS"),
            RunOutcome::SuccessNoNewData => write!(f, "SUCCESS_NO_NEW_DATA"),
        }
    }
}

/// Where a record was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Validation,
    Upsert,
}

/// A record that did not make it into the vector store. Never retried
/// within the same run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub id: String,
    pub reason: String,
    pub kind: FailureKind,
}

/// The sole artifact of a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Candidates fetched from the analytical store.
    pub total: u64,
    pub inserted: u64,
    pub failed: u64,
    /// Candidates whose searchable text was too short. Not failures.
    pub skipped: u64,
    pub failed_records: Vec<FailedRecord>,
    pub outcome: RunOutcome,
    pub stages: Vec<Stage>,
    pub interrupted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_total: Option<u64>,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: u64,
}

impl RunSummary {
    /// Fetched candidates that produced searchable text.
    pub fn eligible(&self) -> u64 {
        self.total.saturating_sub(self.skipped)
    }

    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.inserted as f64 / self.total as f64 * 100.0)
    }

    pub fn validation_failures(&self) -> usize {
        self.failed_records
            .iter()
            .filter(|r| r.kind == FailureKind::Validation)
            .count()
    }

    pub fn upsert_failures(&self) -> usize {
        self.failed_records
            .iter()
            .filter(|r| r.kind == FailureKind::Upsert)
            .count()
    }
}
