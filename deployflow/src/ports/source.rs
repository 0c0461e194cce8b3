//! Source hosting port and the trigger event.

use crate::core::SourceArtifact;
use crate::utils::Timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A push/commit event on the watched repository.
///
/// The sole input that starts a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEvent {
    /// The commit that landed.
    pub commit_id: String,

    /// The branch it landed on.
    pub branch: String,

    /// Who pushed it, if the host reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// When the host observed the push.
    pub pushed_at: Timestamp,
}

impl CommitEvent {
    /// Creates a new commit event on the given branch.
    #[must_use]
    pub fn new(commit_id: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            commit_id: commit_id.into(),
            branch: branch.into(),
            author: None,
            pushed_at: crate::utils::timestamps::now(),
        }
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Port to the source-control hosting service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceProvider: Send + Sync + Debug {
    /// Fetches a snapshot of the repository at the given commit.
    ///
    /// # Errors
    ///
    /// Returns whatever the hosting service reported; the engine wraps it
    /// into a source-fetch stage failure.
    async fn fetch(
        &self,
        repository: &str,
        event: &CommitEvent,
    ) -> anyhow::Result<SourceArtifact>;
}
