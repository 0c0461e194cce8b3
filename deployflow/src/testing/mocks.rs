//! In-memory stand-ins for the external collaborators.

use crate::config::{DeployTarget, ImageRepository};
use crate::core::{ImageReference, SourceArtifact};
use crate::ports::{CommitEvent, DeployDriver, ImageBuilder, SourceProvider};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

fn short_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

/// An in-memory source host.
///
/// Produces snapshots whose ids derive from the repository and commit, so
/// repeated fetches of one commit are stable. Failure is injectable.
#[derive(Debug, Default)]
pub struct InMemorySourceHost {
    fail_with: Mutex<Option<String>>,
    fetch_count: Mutex<usize>,
}

impl InMemorySourceHost {
    /// Creates a host that serves every fetch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent fetches fail with the given message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.fail_with.lock() = Some(message.into());
    }

    /// Returns how many fetches were attempted.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        *self.fetch_count.lock()
    }
}

#[async_trait]
impl SourceProvider for InMemorySourceHost {
    async fn fetch(
        &self,
        repository: &str,
        event: &CommitEvent,
    ) -> anyhow::Result<SourceArtifact> {
        *self.fetch_count.lock() += 1;
        if let Some(message) = self.fail_with.lock().clone() {
            anyhow::bail!(message);
        }

        let snapshot_id = format!("snap-{}", short_digest(&format!("{repository}@{}", event.commit_id)));
        Ok(
            SourceArtifact::new(event.commit_id.clone(), repository, snapshot_id)
                .with_branch(event.branch.clone()),
        )
    }
}

/// An in-memory build service.
///
/// Tags images with the commit id, so every build invocation yields a
/// unique reference, and reports a content digest derived from the
/// snapshot. Failure is injectable.
#[derive(Debug, Default)]
pub struct InMemoryImageBuilder {
    fail_with: Mutex<Option<String>>,
    built: Mutex<Vec<ImageReference>>,
}

impl InMemoryImageBuilder {
    /// Creates a builder that succeeds for every invocation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent builds fail with the given message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.fail_with.lock() = Some(message.into());
    }

    /// Returns every image this builder published.
    #[must_use]
    pub fn built(&self) -> Vec<ImageReference> {
        self.built.lock().clone()
    }
}

#[async_trait]
impl ImageBuilder for InMemoryImageBuilder {
    async fn build(
        &self,
        source: &SourceArtifact,
        image_repository: &ImageRepository,
    ) -> anyhow::Result<ImageReference> {
        if let Some(message) = self.fail_with.lock().clone() {
            anyhow::bail!(message);
        }

        let image = ImageReference::new(
            image_repository.registry.clone(),
            image_repository.repository.clone(),
            source.commit_id.clone(),
        )
        .with_digest(format!("sha256:{}", short_digest(&source.snapshot_id)));

        self.built.lock().push(image.clone());
        Ok(image)
    }
}

/// An in-memory deployment driver with per-target failure injection.
#[derive(Debug, Default)]
pub struct ScriptedDeployDriver {
    fail_targets: Mutex<HashMap<String, String>>,
    deployments: Mutex<Vec<(String, String)>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedDeployDriver {
    /// Creates a driver that applies every deploy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes deploys to the target (by lock key) fail with the message.
    pub fn fail_target(&self, lock_key: impl Into<String>, message: impl Into<String>) {
        self.fail_targets
            .lock()
            .insert(lock_key.into(), message.into());
    }

    /// Adds a fixed delay to every deploy, to let tests create overlap.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Returns `(target, image uri)` pairs in application order.
    #[must_use]
    pub fn deployments(&self) -> Vec<(String, String)> {
        self.deployments.lock().clone()
    }
}

#[async_trait]
impl DeployDriver for ScriptedDeployDriver {
    async fn deploy(
        &self,
        image: &ImageReference,
        _source: &SourceArtifact,
        target: &DeployTarget,
    ) -> anyhow::Result<()> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.fail_targets.lock().get(&target.lock_key()).cloned() {
            anyhow::bail!(message);
        }

        self.deployments
            .lock()
            .push((target.to_string(), image.uri()));
        Ok(())
    }
}
