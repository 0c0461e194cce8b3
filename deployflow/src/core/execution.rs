//! Per-stage execution records.

use super::{ArtifactRef, StageId, StageStatus};
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One run of one stage.
///
/// A record is created when the sequencer advances to the stage and is
/// terminal once the stage completes or fails. Records never exist for
/// stages the run did not reach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageExecution {
    /// Unique identity of this execution.
    pub id: Uuid,

    /// The stage this execution belongs to.
    pub stage: StageId,

    /// The stage's 1-based position in the pipeline.
    pub ordinal: u8,

    /// Current status.
    pub status: StageStatus,

    /// Pointers to the artifacts this execution consumed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed: Vec<ArtifactRef>,

    /// Pointers to the artifacts this execution produced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produced: Vec<ArtifactRef>,

    /// When the execution started.
    pub started_at: Timestamp,

    /// When the execution reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,

    /// Error message, for failed executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageExecution {
    /// Creates a running execution record for a stage.
    #[must_use]
    pub fn started(stage: StageId, consumed: Vec<ArtifactRef>) -> Self {
        Self {
            id: crate::utils::generate_uuid(),
            stage,
            ordinal: stage.ordinal(),
            status: StageStatus::Running,
            consumed,
            produced: Vec::new(),
            started_at: crate::utils::timestamps::now(),
            finished_at: None,
            error: None,
        }
    }

    /// Marks the execution as succeeded with the artifacts it produced.
    pub fn succeed(&mut self, produced: Vec<ArtifactRef>) {
        self.status = StageStatus::Succeeded;
        self.produced = produced;
        self.finished_at = Some(crate::utils::timestamps::now());
    }

    /// Marks the execution as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StageStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(crate::utils::timestamps::now());
    }

    /// Returns the execution duration in milliseconds, if terminal.
    #[must_use]
    pub fn duration_ms(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64)
    }

    /// Returns true if the execution reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
