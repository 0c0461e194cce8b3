//! Stage identity and run/stage status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five stages of the delivery pipeline, in declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Fetch new commits as a source artifact.
    Source,
    /// Produce a container image and publish it to the registry.
    Build,
    /// Apply the image to the primary cluster.
    DeployPrimary,
    /// Hold the run pending a human decision.
    Approve,
    /// Apply the image to the staging environment.
    DeployStaging,
}

impl StageId {
    /// All stages in execution order.
    pub const ALL: [Self; 5] = [
        Self::Source,
        Self::Build,
        Self::DeployPrimary,
        Self::Approve,
        Self::DeployStaging,
    ];

    /// Returns the 1-based ordinal position of the stage.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Source => 1,
            Self::Build => 2,
            Self::DeployPrimary => 3,
            Self::Approve => 4,
            Self::DeployStaging => 5,
        }
    }

    /// Returns the stage that follows this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Source => Some(Self::Build),
            Self::Build => Some(Self::DeployPrimary),
            Self::DeployPrimary => Some(Self::Approve),
            Self::Approve => Some(Self::DeployStaging),
            Self::DeployStaging => None,
        }
    }

    /// Returns true for the manual approval gate.
    #[must_use]
    pub const fn is_gate(self) -> bool {
        matches!(self, Self::Approve)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Build => write!(f, "build"),
            Self::DeployPrimary => write!(f, "deploy_primary"),
            Self::Approve => write!(f, "approve"),
            Self::DeployStaging => write!(f, "deploy_staging"),
        }
    }
}

/// The execution status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started.
    Pending,
    /// Stage is currently running (or, for the gate, blocked).
    Running,
    /// Stage completed successfully.
    Succeeded,
    /// Stage failed.
    Failed,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// The state of a pipeline run as seen by the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No stage has started yet.
    NotStarted,
    /// The named stage is active. At most one stage is active per run.
    StageRunning(StageId),
    /// The run is suspended at the manual gate.
    AwaitingApproval,
    /// All stages completed successfully.
    Succeeded,
    /// A stage failed, an approval was rejected, or the run was superseded.
    Failed,
}

impl RunState {
    /// Returns true if the run has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the run is suspended at the manual gate.
    #[must_use]
    pub const fn is_blocked(self) -> bool {
        matches!(self, Self::AwaitingApproval)
    }

    /// Returns the active stage, if a stage is running.
    #[must_use]
    pub const fn active_stage(self) -> Option<StageId> {
        match self {
            Self::StageRunning(stage) => Some(stage),
            _ => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::StageRunning(stage) => write!(f, "running:{stage}"),
            Self::AwaitingApproval => write!(f, "awaiting_approval"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_declared_order() {
        let ordinals: Vec<u8> = StageId::ALL.iter().map(|s| s.ordinal()).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_stage_next_chains_to_end() {
        assert_eq!(StageId::Source.next(), Some(StageId::Build));
        assert_eq!(StageId::Approve.next(), Some(StageId::DeployStaging));
        assert_eq!(StageId::DeployStaging.next(), None);
    }

    #[test]
    fn test_only_approve_is_gate() {
        for stage in StageId::ALL {
            assert_eq!(stage.is_gate(), stage == StageId::Approve);
        }
    }

    #[test]
    fn test_stage_id_display() {
        assert_eq!(StageId::Source.to_string(), "source");
        assert_eq!(StageId::DeployPrimary.to_string(), "deploy_primary");
        assert_eq!(StageId::DeployStaging.to_string(), "deploy_staging");
    }

    #[test]
    fn test_stage_status_terminal() {
        assert!(StageStatus::Succeeded.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_run_state_helpers() {
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::AwaitingApproval.is_blocked());
        assert_eq!(
            RunState::StageRunning(StageId::Build).active_stage(),
            Some(StageId::Build)
        );
        assert_eq!(RunState::NotStarted.active_stage(), None);
    }

    #[test]
    fn test_run_state_display() {
        assert_eq!(
            RunState::StageRunning(StageId::Build).to_string(),
            "running:build"
        );
        assert_eq!(RunState::AwaitingApproval.to_string(), "awaiting_approval");
    }

    #[test]
    fn test_stage_id_serialize() {
        let json = serde_json::to_string(&StageId::DeployPrimary).unwrap();
        assert_eq!(json, r#""deploy_primary""#);
    }
}
