//! Pipeline configuration.
//!
//! The configuration is the only surface the engine exposes at setup time:
//! which repository triggers the pipeline, which image repository builds
//! publish to, the two deploy targets, and the approval/overlap policies.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// The source repository the pipeline watches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Base repository name.
    pub name: String,

    /// Durable clone URL, exported as part of the pipeline identity.
    pub clone_url: String,

    /// Branch whose commits trigger runs.
    #[serde(default = "RepositoryConfig::default_branch")]
    pub branch: String,
}

impl RepositoryConfig {
    fn default_branch() -> String {
        "main".to_string()
    }

    /// Creates a new repository configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, clone_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clone_url: clone_url.into(),
            branch: Self::default_branch(),
        }
    }

    /// Sets the trigger branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Returns the per-region repository name, `<name>-<region>`.
    #[must_use]
    pub fn regional_name(&self, region: &str) -> String {
        format!("{}-{}", self.name, region)
    }
}

/// The image repository builds publish to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRepository {
    /// Registry host.
    pub registry: String,

    /// Repository within the registry.
    pub repository: String,
}

impl ImageRepository {
    /// Creates a new image repository reference.
    #[must_use]
    pub fn new(registry: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
        }
    }

    /// Returns the repository URI without a tag.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }
}

impl fmt::Display for ImageRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}

/// A cluster/environment a deploy stage applies images to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeployTarget {
    /// Cluster name.
    pub cluster: String,

    /// Region the cluster lives in.
    pub region: String,

    /// Environment label (e.g., "production", "staging").
    pub environment: String,
}

impl DeployTarget {
    /// Creates a new deploy target.
    #[must_use]
    pub fn new(
        cluster: impl Into<String>,
        region: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            region: region.into(),
            environment: environment.into(),
        }
    }

    /// Returns the mutual-exclusion key for this target.
    ///
    /// Two runs never deploy concurrently to targets sharing this key.
    #[must_use]
    pub fn lock_key(&self) -> String {
        format!("{}/{}", self.region, self.cluster)
    }
}

impl fmt::Display for DeployTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.environment, self.region, self.cluster)
    }
}

/// Policy for the manual approval gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    /// Seconds until a pending approval expires. `None` blocks forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ApprovalPolicy {
    /// A policy that blocks indefinitely.
    #[must_use]
    pub const fn indefinite() -> Self {
        Self { timeout_secs: None }
    }

    /// A policy that expires after the given number of seconds.
    #[must_use]
    pub const fn expiring(secs: u64) -> Self {
        Self {
            timeout_secs: Some(secs),
        }
    }

    /// Returns the expiry as a [`Duration`], if one is configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// What happens when a trigger arrives while a run is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// New runs wait their turn; one run in flight at a time.
    Queue,
    /// A new trigger cancels the in-flight run at its next stage boundary.
    Supersede,
}

impl Default for OverlapPolicy {
    fn default() -> Self {
        Self::Queue
    }
}

/// Complete configuration for one delivery pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name.
    pub name: String,

    /// The watched source repository.
    pub repository: RepositoryConfig,

    /// Where builds publish images.
    pub image_repository: ImageRepository,

    /// The primary deploy target (stage 3).
    pub primary: DeployTarget,

    /// The staging deploy target (stage 5).
    pub staging: DeployTarget,

    /// Approval gate policy.
    #[serde(default)]
    pub approval: ApprovalPolicy,

    /// Overlapping-trigger policy.
    #[serde(default)]
    pub overlap: OverlapPolicy,
}

impl PipelineConfig {
    /// Creates a new configuration with default policies.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        repository: RepositoryConfig,
        image_repository: ImageRepository,
        primary: DeployTarget,
        staging: DeployTarget,
    ) -> Self {
        Self {
            name: name.into(),
            repository,
            image_repository,
            primary,
            staging,
            approval: ApprovalPolicy::default(),
            overlap: OverlapPolicy::default(),
        }
    }

    /// Sets the approval policy.
    #[must_use]
    pub fn with_approval(mut self, approval: ApprovalPolicy) -> Self {
        self.approval = approval;
        self
    }

    /// Sets the overlap policy.
    #[must_use]
    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    /// Parses a configuration from a JSON string and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or validation fails.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, malformed, or invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for empty names, identical deploy targets, or a
    /// zero-length approval timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("pipeline name cannot be empty"));
        }
        if self.repository.name.trim().is_empty() {
            return Err(ConfigError::invalid("repository name cannot be empty"));
        }
        if self.repository.clone_url.trim().is_empty() {
            return Err(ConfigError::invalid("repository clone_url cannot be empty"));
        }
        if self.image_repository.registry.trim().is_empty()
            || self.image_repository.repository.trim().is_empty()
        {
            return Err(ConfigError::invalid(
                "image repository registry and repository cannot be empty",
            ));
        }
        if self.primary == self.staging {
            return Err(ConfigError::invalid(
                "primary and staging deploy targets must differ",
            ));
        }
        if self.approval.timeout_secs == Some(0) {
            return Err(ConfigError::invalid(
                "approval timeout must be at least one second",
            ));
        }
        Ok(())
    }
}
