//! Run identity for tracking pipeline executions.

use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one pipeline run.
///
/// Run identity is explicit and queryable; there is no hidden singleton
/// pipeline state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique id of this run.
    pub run_id: Uuid,

    /// The pipeline this run belongs to.
    pub pipeline: String,

    /// The commit that triggered the run.
    pub commit_id: String,

    /// When the trigger was accepted.
    pub triggered_at: Timestamp,
}

impl RunIdentity {
    /// Creates a new identity with a generated run id.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, commit_id: impl Into<String>) -> Self {
        Self {
            run_id: crate::utils::generate_uuid(),
            pipeline: pipeline.into(),
            commit_id: commit_id.into(),
            triggered_at: crate::utils::timestamps::now(),
        }
    }
}
