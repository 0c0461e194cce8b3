//! Deployment driver port.

use crate::config::DeployTarget;
use crate::core::{ImageReference, SourceArtifact};
use async_trait::async_trait;
use std::fmt::Debug;

/// Port to the deployment driver.
///
/// Applies a built image to a target cluster/environment. The source
/// snapshot rides along as deploy context (manifests, kustomizations);
/// reconciliation is the target cluster's responsibility.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeployDriver: Send + Sync + Debug {
    /// Applies the image to the target.
    ///
    /// # Errors
    ///
    /// Returns whatever the driver reported; the engine wraps it into a
    /// deploy stage failure for the target.
    async fn deploy(
        &self,
        image: &ImageReference,
        source: &SourceArtifact,
        target: &DeployTarget,
    ) -> anyhow::Result<()>;
}
