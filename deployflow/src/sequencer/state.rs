//! The run state machine.
//!
//! Guarantees: at most one stage is active per run; stages advance in
//! declared order; the manual gate resolves only through a decision,
//! an expiry, or a supersede; terminal states accept no further events.

use crate::core::{RunState, StageId};
use crate::errors::TransitionError;
use std::fmt;

/// An event the sequencer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerEvent {
    /// A source event triggered the run.
    Triggered,
    /// The named stage reported success.
    StageSucceeded(StageId),
    /// The named stage reported failure.
    StageFailed(StageId),
    /// The run entered the manual gate.
    GateEntered,
    /// An external actor approved the blocked run.
    DecisionApproved,
    /// An external actor rejected the blocked run.
    DecisionRejected,
    /// The gate's policy-defined expiry elapsed.
    GateExpired,
    /// The run was cancelled in favor of a newer trigger.
    Superseded,
}

impl fmt::Display for SequencerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Triggered => write!(f, "triggered"),
            Self::StageSucceeded(stage) => write!(f, "stage_succeeded({stage})"),
            Self::StageFailed(stage) => write!(f, "stage_failed({stage})"),
            Self::GateEntered => write!(f, "gate_entered"),
            Self::DecisionApproved => write!(f, "decision_approved"),
            Self::DecisionRejected => write!(f, "decision_rejected"),
            Self::GateExpired => write!(f, "gate_expired"),
            Self::Superseded => write!(f, "superseded"),
        }
    }
}

/// Computes the successor state for an event, or rejects the event.
///
/// # Errors
///
/// Returns a [`TransitionError`] for any event that is not legal in the
/// given state; illegal events are surfaced, never silently applied.
pub fn advance(state: RunState, event: SequencerEvent) -> Result<RunState, TransitionError> {
    let illegal = || TransitionError::new(state, event.to_string());

    if state.is_terminal() {
        return Err(illegal());
    }
    if event == SequencerEvent::Superseded {
        return Ok(RunState::Failed);
    }

    match state {
        RunState::NotStarted => match event {
            SequencerEvent::Triggered => Ok(RunState::StageRunning(StageId::Source)),
            _ => Err(illegal()),
        },
        RunState::StageRunning(active) => match event {
            SequencerEvent::StageSucceeded(stage) if stage == active => {
                // The gate never "succeeds" on its own; it resolves through
                // a decision once the run is blocked.
                if active.is_gate() {
                    return Err(illegal());
                }
                Ok(active
                    .next()
                    .map_or(RunState::Succeeded, RunState::StageRunning))
            }
            SequencerEvent::StageFailed(stage) if stage == active && !active.is_gate() => {
                Ok(RunState::Failed)
            }
            SequencerEvent::GateEntered if active.is_gate() => Ok(RunState::AwaitingApproval),
            _ => Err(illegal()),
        },
        RunState::AwaitingApproval => match event {
            SequencerEvent::DecisionApproved => {
                Ok(RunState::StageRunning(StageId::DeployStaging))
            }
            SequencerEvent::DecisionRejected | SequencerEvent::GateExpired => {
                Ok(RunState::Failed)
            }
            _ => Err(illegal()),
        },
        // Terminal states were rejected above.
        RunState::Succeeded | RunState::Failed => Err(illegal()),
    }
}

/// A sequencer holding the current state of one run.
#[derive(Debug, Clone, Copy)]
pub struct Sequencer {
    state: RunState,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    /// Creates a sequencer in the not-started state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: RunState::NotStarted,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Applies an event, advancing the state.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] if the event is not legal in the
    /// current state; the state is left unchanged.
    pub fn apply(&mut self, event: SequencerEvent) -> Result<RunState, TransitionError> {
        self.state = advance(self.state, event)?;
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_trigger_starts_source() {
        let mut seq = Sequencer::new();
        assert_eq!(
            seq.apply(SequencerEvent::Triggered).unwrap(),
            RunState::StageRunning(StageId::Source)
        );
    }

    #[test]
    fn test_success_chain_reaches_succeeded() {
        let mut seq = Sequencer::new();
        seq.apply(SequencerEvent::Triggered).unwrap();
        seq.apply(SequencerEvent::StageSucceeded(StageId::Source))
            .unwrap();
        seq.apply(SequencerEvent::StageSucceeded(StageId::Build))
            .unwrap();
        seq.apply(SequencerEvent::StageSucceeded(StageId::DeployPrimary))
            .unwrap();
        assert_eq!(seq.state(), RunState::StageRunning(StageId::Approve));

        seq.apply(SequencerEvent::GateEntered).unwrap();
        assert_eq!(seq.state(), RunState::AwaitingApproval);

        seq.apply(SequencerEvent::DecisionApproved).unwrap();
        assert_eq!(seq.state(), RunState::StageRunning(StageId::DeployStaging));

        seq.apply(SequencerEvent::StageSucceeded(StageId::DeployStaging))
            .unwrap();
        assert_eq!(seq.state(), RunState::Succeeded);
    }

    #[test]
    fn test_failure_halts_run() {
        let mut seq = Sequencer::new();
        seq.apply(SequencerEvent::Triggered).unwrap();
        seq.apply(SequencerEvent::StageSucceeded(StageId::Source))
            .unwrap();
        seq.apply(SequencerEvent::StageFailed(StageId::Build)).unwrap();

        assert_eq!(seq.state(), RunState::Failed);
        assert!(seq
            .apply(SequencerEvent::StageSucceeded(StageId::DeployPrimary))
            .is_err());
    }

    #[test]
    fn test_success_for_wrong_stage_is_rejected() {
        let mut seq = Sequencer::new();
        seq.apply(SequencerEvent::Triggered).unwrap();

        let err = seq
            .apply(SequencerEvent::StageSucceeded(StageId::Build))
            .unwrap_err();
        assert_eq!(err.state, RunState::StageRunning(StageId::Source));
        assert_eq!(seq.state(), RunState::StageRunning(StageId::Source));
    }

    #[test]
    fn test_gate_does_not_succeed_directly() {
        let mut state = RunState::StageRunning(StageId::Approve);
        assert!(advance(state, SequencerEvent::StageSucceeded(StageId::Approve)).is_err());
        assert!(advance(state, SequencerEvent::StageFailed(StageId::Approve)).is_err());

        state = advance(state, SequencerEvent::GateEntered).unwrap();
        assert_eq!(state, RunState::AwaitingApproval);
    }

    #[test]
    fn test_blocked_run_only_resolves_through_decision_expiry_or_supersede() {
        let state = RunState::AwaitingApproval;

        assert_eq!(
            advance(state, SequencerEvent::DecisionApproved).unwrap(),
            RunState::StageRunning(StageId::DeployStaging)
        );
        assert_eq!(
            advance(state, SequencerEvent::DecisionRejected).unwrap(),
            RunState::Failed
        );
        assert_eq!(
            advance(state, SequencerEvent::GateExpired).unwrap(),
            RunState::Failed
        );
        assert_eq!(
            advance(state, SequencerEvent::Superseded).unwrap(),
            RunState::Failed
        );

        for stage in StageId::ALL {
            assert!(advance(state, SequencerEvent::StageSucceeded(stage)).is_err());
            assert!(advance(state, SequencerEvent::StageFailed(stage)).is_err());
        }
        assert!(advance(state, SequencerEvent::Triggered).is_err());
        assert!(advance(state, SequencerEvent::GateEntered).is_err());
    }

    #[test]
    fn test_gate_entry_only_from_approve_stage() {
        assert!(advance(
            RunState::StageRunning(StageId::Build),
            SequencerEvent::GateEntered
        )
        .is_err());
        assert!(advance(RunState::NotStarted, SequencerEvent::GateEntered).is_err());
    }

    #[test]
    fn test_supersede_from_any_non_terminal_state() {
        for state in [
            RunState::NotStarted,
            RunState::StageRunning(StageId::Source),
            RunState::StageRunning(StageId::DeployPrimary),
            RunState::AwaitingApproval,
        ] {
            assert_eq!(
                advance(state, SequencerEvent::Superseded).unwrap(),
                RunState::Failed
            );
        }
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for state in [RunState::Succeeded, RunState::Failed] {
            assert!(advance(state, SequencerEvent::Triggered).is_err());
            assert!(advance(state, SequencerEvent::Superseded).is_err());
            assert!(advance(state, SequencerEvent::DecisionApproved).is_err());
        }
    }
}
