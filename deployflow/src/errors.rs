//! Error types for the deployflow engine.

use crate::core::RunState;
use thiserror::Error;
use uuid::Uuid;

/// A failure that terminates a pipeline run at a particular stage.
///
/// External collaborators emit arbitrary errors; the engine keeps them as
/// opaque causes so the chain survives into logs and run records. No
/// failure is retried and nothing is rolled back.
#[derive(Debug, Error)]
pub enum StageFailure {
    /// The source stage could not fetch a snapshot.
    #[error("source fetch failed for repository '{repository}': {cause}")]
    SourceFetch {
        /// The repository that was being fetched.
        repository: String,
        /// The underlying cause reported by the source host.
        cause: anyhow::Error,
    },

    /// The build stage could not produce or publish an image.
    #[error("build failed for image repository '{image_repository}': {cause}")]
    Build {
        /// The image repository URI the build was publishing to.
        image_repository: String,
        /// The underlying cause reported by the build service.
        cause: anyhow::Error,
    },

    /// A deploy stage could not apply the image to its target.
    #[error("deploy to '{target}' failed: {cause}")]
    Deploy {
        /// The target cluster/environment identifier.
        target: String,
        /// The underlying cause reported by the deployment driver.
        cause: anyhow::Error,
    },

    /// The manual gate recorded a rejection.
    #[error("approval rejected by '{actor}'")]
    ApprovalRejected {
        /// Who rejected the run.
        actor: String,
    },

    /// The manual gate expired before a decision was recorded.
    #[error("approval timed out after {waited_secs:.0}s")]
    ApprovalTimedOut {
        /// How long the gate waited, in seconds.
        waited_secs: f64,
    },

    /// The run was cancelled in favor of a newer trigger.
    #[error("run superseded: {reason}")]
    Superseded {
        /// Why the run was cancelled.
        reason: String,
    },
}

/// Error raised when the sequencer receives an event that is not legal in
/// the current state.
#[derive(Debug, Clone, Error)]
#[error("illegal transition: event '{event}' in state '{state}'")]
pub struct TransitionError {
    /// The state the sequencer was in.
    pub state: RunState,
    /// A description of the rejected event.
    pub event: String,
}

impl TransitionError {
    /// Creates a new transition error.
    #[must_use]
    pub fn new(state: RunState, event: impl Into<String>) -> Self {
        Self {
            state,
            event: event.into(),
        }
    }
}

/// Error raised when pipeline configuration is invalid or unreadable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration failed validation.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// What was wrong.
        message: String,
    },

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a validation error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// The main error type for deployflow operations.
#[derive(Debug, Error)]
pub enum DeployflowError {
    /// A configuration error occurred.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The sequencer rejected an event.
    #[error("{0}")]
    Transition(#[from] TransitionError),

    /// The referenced run does not exist.
    #[error("unknown run: {run_id}")]
    UnknownRun {
        /// The run that was looked up.
        run_id: Uuid,
    },

    /// An approval decision was addressed to a run that is not blocked.
    #[error("no approval pending for run {run_id}")]
    NoPendingApproval {
        /// The run the decision was addressed to.
        run_id: Uuid,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failure_display() {
        let failure = StageFailure::Build {
            image_repository: "ecr/petclinic".to_string(),
            cause: anyhow::anyhow!("docker build exited 1"),
        };

        let msg = failure.to_string();
        assert!(msg.contains("ecr/petclinic"));
        assert!(msg.contains("docker build exited 1"));
    }

    #[test]
    fn test_approval_failures_display() {
        let rejected = StageFailure::ApprovalRejected {
            actor: "ops".to_string(),
        };
        assert_eq!(rejected.to_string(), "approval rejected by 'ops'");

        let expired = StageFailure::ApprovalTimedOut { waited_secs: 30.0 };
        assert!(expired.to_string().contains("timed out after 30s"));
    }

    #[test]
    fn test_transition_error_display() {
        let err = TransitionError::new(RunState::AwaitingApproval, "stage_succeeded(build)");
        assert!(err.to_string().contains("awaiting_approval"));
        assert!(err.to_string().contains("stage_succeeded(build)"));
    }

    #[test]
    fn test_config_error_invalid() {
        let err = ConfigError::invalid("primary and staging targets are identical");
        assert!(err.to_string().contains("identical"));
    }

    #[test]
    fn test_unknown_run_display() {
        let run_id = crate::utils::generate_uuid();
        let err = DeployflowError::UnknownRun { run_id };
        assert!(err.to_string().contains(&run_id.to_string()));
    }
}
