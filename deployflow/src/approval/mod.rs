//! The manual approval gate.
//!
//! A blocked run suspends on a oneshot channel until an external actor
//! records a decision; there is no polling loop. The gate is keyed by run
//! id so a decision is always addressed to one specific blocked run.

use crate::errors::DeployflowError;
use crate::utils::Timestamp;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use uuid::Uuid;

/// A recorded approval decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// Whether the run may proceed.
    pub approved: bool,

    /// The authenticated actor who decided.
    pub actor: String,

    /// When the decision was recorded.
    pub decided_at: Timestamp,
}

impl ApprovalDecision {
    /// Creates an approving decision.
    #[must_use]
    pub fn approve(actor: impl Into<String>) -> Self {
        Self {
            approved: true,
            actor: actor.into(),
            decided_at: crate::utils::timestamps::now(),
        }
    }

    /// Creates a rejecting decision.
    #[must_use]
    pub fn reject(actor: impl Into<String>) -> Self {
        Self {
            approved: false,
            actor: actor.into(),
            decided_at: crate::utils::timestamps::now(),
        }
    }
}

/// How a wait at the gate ended.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// A decision was recorded.
    Decided(ApprovalDecision),
    /// The configured expiry elapsed with no decision.
    TimedOut {
        /// How long the gate waited, in seconds.
        waited_secs: f64,
    },
    /// The wait was cancelled (run superseded or shut down).
    Cancelled,
}

/// Manages blocked runs awaiting a decision.
#[derive(Default)]
pub struct ApprovalGate {
    pending: RwLock<HashMap<Uuid, oneshot::Sender<ApprovalDecision>>>,
}

impl ApprovalGate {
    /// Creates a new gate with no blocked runs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until a decision is recorded for the run.
    ///
    /// With `expiry = None` the wait is indefinite. A cancelled
    /// registration (see [`ApprovalGate::cancel`]) resolves as
    /// [`GateOutcome::Cancelled`].
    pub async fn wait_for_decision(
        &self,
        run_id: Uuid,
        expiry: Option<Duration>,
    ) -> GateOutcome {
        let (tx, rx) = oneshot::channel();
        self.pending.write().insert(run_id, tx);

        let waited = Instant::now();
        let outcome = match expiry {
            None => match rx.await {
                Ok(decision) => GateOutcome::Decided(decision),
                Err(_) => GateOutcome::Cancelled,
            },
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(Ok(decision)) => GateOutcome::Decided(decision),
                Ok(Err(_)) => GateOutcome::Cancelled,
                Err(_) => GateOutcome::TimedOut {
                    waited_secs: waited.elapsed().as_secs_f64(),
                },
            },
        };

        self.pending.write().remove(&run_id);
        outcome
    }

    /// Records an approval for a blocked run.
    ///
    /// # Errors
    ///
    /// Returns an error if no approval is pending for the run.
    pub fn approve(
        &self,
        run_id: Uuid,
        actor: impl Into<String>,
    ) -> Result<(), DeployflowError> {
        self.decide(run_id, ApprovalDecision::approve(actor))
    }

    /// Records a rejection for a blocked run.
    ///
    /// # Errors
    ///
    /// Returns an error if no approval is pending for the run.
    pub fn reject(
        &self,
        run_id: Uuid,
        actor: impl Into<String>,
    ) -> Result<(), DeployflowError> {
        self.decide(run_id, ApprovalDecision::reject(actor))
    }

    /// Cancels a pending wait, resolving it as [`GateOutcome::Cancelled`].
    ///
    /// Returns true if a wait was pending.
    pub fn cancel(&self, run_id: Uuid) -> bool {
        self.pending.write().remove(&run_id).is_some()
    }

    /// Returns the number of blocked runs.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }

    /// Lists the blocked run ids.
    #[must_use]
    pub fn pending_runs(&self) -> Vec<Uuid> {
        self.pending.read().keys().copied().collect()
    }

    fn decide(
        &self,
        run_id: Uuid,
        decision: ApprovalDecision,
    ) -> Result<(), DeployflowError> {
        let tx = self
            .pending
            .write()
            .remove(&run_id)
            .ok_or(DeployflowError::NoPendingApproval { run_id })?;

        // A dropped receiver means the waiter already gave up (timeout
        // raced the decision); treat it the same as no pending approval.
        tx.send(decision)
            .map_err(|_| DeployflowError::NoPendingApproval { run_id })
    }
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}
