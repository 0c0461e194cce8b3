//! Artifact types passed between stages.

use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque handle to a snapshot of the source tree at a commit.
///
/// Produced by the source stage and threaded unchanged into the build
/// stage and both deploy stages. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceArtifact {
    /// The commit this snapshot was taken at.
    pub commit_id: String,

    /// The repository the snapshot came from.
    pub repository: String,

    /// Opaque identifier of the stored snapshot.
    pub snapshot_id: String,

    /// The branch the commit landed on, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// When the snapshot was fetched.
    pub fetched_at: Timestamp,
}

impl SourceArtifact {
    /// Creates a new source artifact.
    #[must_use]
    pub fn new(
        commit_id: impl Into<String>,
        repository: impl Into<String>,
        snapshot_id: impl Into<String>,
    ) -> Self {
        Self {
            commit_id: commit_id.into(),
            repository: repository.into(),
            snapshot_id: snapshot_id.into(),
            branch: None,
            fetched_at: crate::utils::timestamps::now(),
        }
    }

    /// Sets the branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Returns a reference pointer to this artifact.
    #[must_use]
    pub fn as_ref_pointer(&self) -> ArtifactRef {
        ArtifactRef::Source {
            commit_id: self.commit_id.clone(),
        }
    }
}

/// Identifies a built container image.
///
/// Produced by the build stage, unique per build invocation (the tag
/// derives from the commit), and consumed by reference by both deploy
/// stages. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// The registry host.
    pub registry: String,

    /// The repository within the registry.
    pub repository: String,

    /// The image tag.
    pub tag: String,

    /// The content digest, if the registry reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ImageReference {
    /// Creates a new image reference.
    #[must_use]
    pub fn new(
        registry: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
            tag: tag.into(),
            digest: None,
        }
    }

    /// Sets the content digest.
    #[must_use]
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /// Returns the pullable URI, `registry/repository:tag`.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("{}/{}:{}", self.registry, self.repository, self.tag)
    }

    /// Returns a reference pointer to this artifact.
    #[must_use]
    pub fn as_ref_pointer(&self) -> ArtifactRef {
        ArtifactRef::Image { uri: self.uri() }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}

/// A pointer to an artifact recorded on a stage execution.
///
/// Records carry pointers, not payloads; artifact contents live with the
/// external services that own them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ArtifactRef {
    /// Points at a source snapshot.
    Source {
        /// The commit the snapshot was taken at.
        commit_id: String,
    },
    /// Points at a built image.
    Image {
        /// The pullable image URI.
        uri: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_artifact_creation() {
        let artifact = SourceArtifact::new("c1f3", "pet-clinic-us-west-2", "snap-1")
            .with_branch("main");

        assert_eq!(artifact.commit_id, "c1f3");
        assert_eq!(artifact.repository, "pet-clinic-us-west-2");
        assert_eq!(artifact.branch, Some("main".to_string()));
    }

    #[test]
    fn test_image_reference_uri() {
        let image = ImageReference::new("ecr", "petclinic", "C1");
        assert_eq!(image.uri(), "ecr/petclinic:C1");
        assert_eq!(image.to_string(), "ecr/petclinic:C1");
    }

    #[test]
    fn test_image_reference_with_digest() {
        let image = ImageReference::new("ecr", "petclinic", "C1").with_digest("sha256:abcd");
        assert_eq!(image.digest, Some("sha256:abcd".to_string()));
    }

    #[test]
    fn test_artifact_ref_pointers() {
        let source = SourceArtifact::new("c2", "repo", "snap-2");
        let image = ImageReference::new("ecr", "petclinic", "c2");

        assert_eq!(
            source.as_ref_pointer(),
            ArtifactRef::Source {
                commit_id: "c2".to_string()
            }
        );
        assert_eq!(
            image.as_ref_pointer(),
            ArtifactRef::Image {
                uri: "ecr/petclinic:c2".to_string()
            }
        );
    }

    #[test]
    fn test_artifact_serialization() {
        let image = ImageReference::new("ecr", "petclinic", "C1").with_digest("sha256:ff");
        let json = serde_json::to_string(&image).unwrap();
        let deserialized: ImageReference = serde_json::from_str(&json).unwrap();

        assert_eq!(image, deserialized);
    }

    #[test]
    fn test_artifact_ref_serialization_tag() {
        let r = ArtifactRef::Image {
            uri: "ecr/petclinic:C1".to_string(),
        };
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains(r#""kind":"image""#));
    }
}
