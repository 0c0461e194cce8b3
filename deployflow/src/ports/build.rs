//! Image build port.

use crate::config::ImageRepository;
use crate::core::{ImageReference, SourceArtifact};
use async_trait::async_trait;
use std::fmt::Debug;

/// Port to the build-execution service.
///
/// Given a source snapshot and a target image repository, the service
/// produces a container image, publishes it, and reports the reference.
/// The reference must be unique per invocation; implementations derive the
/// tag from the commit.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageBuilder: Send + Sync + Debug {
    /// Builds and publishes an image from the source snapshot.
    ///
    /// # Errors
    ///
    /// Returns whatever the build service reported; the engine wraps it
    /// into a build stage failure.
    async fn build(
        &self,
        source: &SourceArtifact,
        image_repository: &ImageRepository,
    ) -> anyhow::Result<ImageReference>;
}
