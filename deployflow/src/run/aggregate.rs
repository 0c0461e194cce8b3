//! The pipeline run aggregate.

use super::RunIdentity;
use crate::core::{
    ArtifactRef, ImageReference, RunState, SourceArtifact, StageExecution, StageId,
};
use crate::errors::TransitionError;
use crate::ports::CommitEvent;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};

/// The durable record of one pipeline run: state plus the ordered stage
/// execution records for one trigger.
///
/// Invariants, enforced at append time:
/// - records appear in strictly increasing ordinal order;
/// - a record is only created once its predecessor is terminal and
///   successful;
/// - a record is never created for a stage after the run went terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Identity of the run.
    pub identity: RunIdentity,

    /// The trigger event.
    pub commit: CommitEvent,

    /// Current sequencer state.
    pub state: RunState,

    /// Stage execution records, in execution order.
    #[serde(default)]
    pub records: Vec<StageExecution>,

    /// The source artifact, once the source stage produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_artifact: Option<SourceArtifact>,

    /// The image reference, once the build stage produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageReference>,

    /// Terminal failure description, if the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    /// When the run reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
}

impl PipelineRun {
    /// Creates a run for a trigger, in the not-started state.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, commit: CommitEvent) -> Self {
        let identity = RunIdentity::new(pipeline, commit.commit_id.clone());
        Self {
            identity,
            commit,
            state: RunState::NotStarted,
            records: Vec::new(),
            source_artifact: None,
            image: None,
            failure: None,
            finished_at: None,
        }
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> uuid::Uuid {
        self.identity.run_id
    }

    /// Opens a running execution record for a stage.
    ///
    /// # Errors
    ///
    /// Returns a transition error if the run is terminal, if the previous
    /// record is still open or failed, or if the stage is out of order.
    pub fn begin_stage(
        &mut self,
        stage: StageId,
        consumed: Vec<ArtifactRef>,
    ) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError::new(
                self.state,
                format!("begin_stage({stage})"),
            ));
        }
        if let Some(last) = self.records.last() {
            if !last.is_terminal() || !last.status.is_success() {
                return Err(TransitionError::new(
                    self.state,
                    format!("begin_stage({stage}) before '{}' succeeded", last.stage),
                ));
            }
            if stage.ordinal() != last.ordinal + 1 {
                return Err(TransitionError::new(
                    self.state,
                    format!("begin_stage({stage}) out of order after '{}'", last.stage),
                ));
            }
        } else if stage != StageId::Source {
            return Err(TransitionError::new(
                self.state,
                format!("begin_stage({stage}) before source"),
            ));
        }

        self.records.push(StageExecution::started(stage, consumed));
        self.state = RunState::StageRunning(stage);
        Ok(())
    }

    /// Marks the open record as succeeded with the artifacts it produced.
    pub fn complete_stage(&mut self, produced: Vec<ArtifactRef>) {
        if let Some(record) = self.records.last_mut() {
            record.succeed(produced);
        }
    }

    /// Marks the open record and the run as failed.
    pub fn fail_stage(&mut self, error: impl Into<String>) {
        let error = error.into();
        if let Some(record) = self.records.last_mut() {
            record.fail(error.clone());
        }
        self.fail_run(error);
    }

    /// Marks the run as failed without touching the records.
    ///
    /// Used for failures with no open record: a rejected or expired
    /// approval fails the gate record separately, a superseded run fails
    /// between records.
    pub fn fail_run(&mut self, error: impl Into<String>) {
        self.state = RunState::Failed;
        self.failure = Some(error.into());
        self.finished_at = Some(crate::utils::timestamps::now());
    }

    /// Marks the run as succeeded.
    pub fn succeed(&mut self) {
        self.state = RunState::Succeeded;
        self.finished_at = Some(crate::utils::timestamps::now());
    }

    /// Marks the run as suspended at the manual gate.
    pub fn block_on_approval(&mut self) {
        self.state = RunState::AwaitingApproval;
    }

    /// Returns the record for a stage, if the run reached it.
    #[must_use]
    pub fn record_for(&self, stage: StageId) -> Option<&StageExecution> {
        self.records.iter().find(|r| r.stage == stage)
    }

    /// Returns true if the run reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
