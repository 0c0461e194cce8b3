//! Pipeline lifecycle events.

use super::StageId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// An event emitted during a pipeline run.
///
/// Events are consumed by event sinks for logging, monitoring, or test
/// assertions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The event type (e.g., "stage.started", "run.blocked").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl PipelineEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Creates a "run.started" event.
    #[must_use]
    pub fn run_started(run_id: Uuid, commit_id: &str) -> Self {
        Self::new("run.started")
            .add_data("run_id", serde_json::json!(run_id.to_string()))
            .add_data("commit_id", serde_json::json!(commit_id))
    }

    /// Creates a "stage.started" event.
    #[must_use]
    pub fn stage_started(stage: StageId) -> Self {
        Self::new("stage.started").add_data("stage", serde_json::json!(stage.to_string()))
    }

    /// Creates a "stage.completed" event.
    #[must_use]
    pub fn stage_completed(stage: StageId, duration_ms: f64) -> Self {
        Self::new("stage.completed")
            .add_data("stage", serde_json::json!(stage.to_string()))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates a "stage.failed" event.
    #[must_use]
    pub fn stage_failed(stage: StageId, error: &str) -> Self {
        Self::new("stage.failed")
            .add_data("stage", serde_json::json!(stage.to_string()))
            .add_data("error", serde_json::json!(error))
    }

    /// Creates a "run.blocked" event, emitted on entry to the manual gate.
    #[must_use]
    pub fn run_blocked(run_id: Uuid) -> Self {
        Self::new("run.blocked").add_data("run_id", serde_json::json!(run_id.to_string()))
    }

    /// Creates an "approval.recorded" event.
    #[must_use]
    pub fn approval_recorded(run_id: Uuid, approved: bool, actor: &str) -> Self {
        Self::new("approval.recorded")
            .add_data("run_id", serde_json::json!(run_id.to_string()))
            .add_data("approved", serde_json::json!(approved))
            .add_data("actor", serde_json::json!(actor))
    }

    /// Creates a "run.succeeded" event.
    #[must_use]
    pub fn run_succeeded(run_id: Uuid) -> Self {
        Self::new("run.succeeded").add_data("run_id", serde_json::json!(run_id.to_string()))
    }

    /// Creates a "run.failed" event.
    #[must_use]
    pub fn run_failed(run_id: Uuid, stage: StageId, error: &str) -> Self {
        Self::new("run.failed")
            .add_data("run_id", serde_json::json!(run_id.to_string()))
            .add_data("stage", serde_json::json!(stage.to_string()))
            .add_data("error", serde_json::json!(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = PipelineEvent::new("test.event");
        assert_eq!(event.event_type, "test.event");
        assert!(event.data.is_empty());
    }

    #[test]
    fn test_stage_started_event() {
        let event = PipelineEvent::stage_started(StageId::Build);
        assert_eq!(event.event_type, "stage.started");
        assert_eq!(event.data.get("stage"), Some(&serde_json::json!("build")));
    }

    #[test]
    fn test_run_failed_event() {
        let run_id = crate::utils::generate_uuid();
        let event = PipelineEvent::run_failed(run_id, StageId::Build, "image build failed");

        assert_eq!(event.event_type, "run.failed");
        assert_eq!(event.data.get("stage"), Some(&serde_json::json!("build")));
        assert_eq!(
            event.data.get("error"),
            Some(&serde_json::json!("image build failed"))
        );
    }

    #[test]
    fn test_approval_recorded_event() {
        let run_id = crate::utils::generate_uuid();
        let event = PipelineEvent::approval_recorded(run_id, false, "release-manager");

        assert_eq!(event.data.get("approved"), Some(&serde_json::json!(false)));
        assert_eq!(
            event.data.get("actor"),
            Some(&serde_json::json!("release-manager"))
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::new("test").add_data("x", serde_json::json!(1));
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: PipelineEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.event_type, deserialized.event_type);
    }
}
