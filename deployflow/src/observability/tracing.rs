//! Structured tracing for pipeline runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

/// Initializes a tracing subscriber with env-filter support.
///
/// Safe to call more than once; later calls are no-ops. Intended for
/// binaries and tests embedding the engine.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Span attributes attached to run-scoped spans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSpanAttributes {
    /// Pipeline name.
    pub pipeline: Option<String>,
    /// Run id.
    pub run_id: Option<String>,
    /// Trigger commit.
    pub commit_id: Option<String>,
    /// Active stage.
    pub stage: Option<String>,
    /// Deploy target, for deploy stages.
    pub target: Option<String>,
}

impl RunSpanAttributes {
    /// Creates empty attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pipeline name.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    /// Sets the run id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Sets the trigger commit.
    #[must_use]
    pub fn with_commit_id(mut self, commit_id: impl Into<String>) -> Self {
        self.commit_id = Some(commit_id.into());
        self
    }

    /// Sets the active stage.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Sets the deploy target.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Flattens the attributes into dotted keys for span fields.
    #[must_use]
    pub fn to_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        if let Some(ref v) = self.pipeline {
            attrs.insert("pipeline.name".to_string(), v.clone());
        }
        if let Some(ref v) = self.run_id {
            attrs.insert("pipeline.run_id".to_string(), v.clone());
        }
        if let Some(ref v) = self.commit_id {
            attrs.insert("pipeline.commit_id".to_string(), v.clone());
        }
        if let Some(ref v) = self.stage {
            attrs.insert("pipeline.stage".to_string(), v.clone());
        }
        if let Some(ref v) = self.target {
            attrs.insert("pipeline.target".to_string(), v.clone());
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }

    #[test]
    fn test_attributes_flatten() {
        let attrs = RunSpanAttributes::new()
            .with_pipeline("pet-clinic-delivery")
            .with_stage("deploy_primary")
            .with_target("production@us-west-2/eks-main")
            .to_attributes();

        assert_eq!(
            attrs.get("pipeline.name"),
            Some(&"pet-clinic-delivery".to_string())
        );
        assert_eq!(attrs.get("pipeline.stage"), Some(&"deploy_primary".to_string()));
        assert_eq!(attrs.len(), 3);
    }
}
