//! Mutable execution context for one in-flight run.

use super::RunIdentity;
use crate::core::PipelineEvent;
use crate::events::{get_event_sink, EventSink};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Execution-time state for a run: event emission and cancellation.
///
/// The durable record lives in [`super::PipelineRun`]; this context exists
/// only while the run is in flight.
pub struct RunContext {
    identity: RunIdentity,
    event_sink: Arc<dyn EventSink>,
    cancelled: AtomicBool,
    cancel_reason: RwLock<Option<String>>,
}

impl RunContext {
    /// Creates a new context using the global event sink.
    #[must_use]
    pub fn new(identity: RunIdentity) -> Self {
        Self {
            identity,
            event_sink: get_event_sink(),
            cancelled: AtomicBool::new(false),
            cancel_reason: RwLock::new(None),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.identity.run_id
    }

    /// Marks the run as cancelled with a reason.
    ///
    /// The runner observes this at the next stage boundary; the stage in
    /// flight is never interrupted mid-execution.
    pub fn mark_cancelled(&self, reason: impl Into<String>) {
        *self.cancel_reason.write() = Some(reason.into());
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancel reason, if any.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<String> {
        self.cancel_reason.read().clone()
    }

    /// Emits a lifecycle event enriched with the run identity.
    pub fn try_emit(&self, event: &PipelineEvent) {
        let mut data = serde_json::Map::new();
        for (key, value) in &event.data {
            data.insert(key.clone(), value.clone());
        }
        data.insert(
            "run_id".to_string(),
            serde_json::json!(self.identity.run_id.to_string()),
        );
        data.insert(
            "pipeline".to_string(),
            serde_json::json!(&self.identity.pipeline),
        );
        data.insert(
            "commit_id".to_string(),
            serde_json::json!(&self.identity.commit_id),
        );

        self.event_sink
            .try_emit(&event.event_type, Some(serde_json::Value::Object(data)));
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.identity.run_id)
            .field("pipeline", &self.identity.pipeline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;

    #[test]
    fn test_cancellation() {
        let ctx = RunContext::new(RunIdentity::new("p", "c1"));
        assert!(!ctx.is_cancelled());

        ctx.mark_cancelled("superseded by a newer trigger");
        assert!(ctx.is_cancelled());
        assert_eq!(
            ctx.cancel_reason(),
            Some("superseded by a newer trigger".to_string())
        );
    }

    #[test]
    fn test_emitted_events_carry_run_identity() {
        let sink = Arc::new(CollectingEventSink::new());
        let identity = RunIdentity::new("pet-clinic-delivery", "c1");
        let run_id = identity.run_id;
        let ctx = RunContext::new(identity).with_event_sink(sink.clone());

        ctx.try_emit(&PipelineEvent::new("stage.started"));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let data = events[0].1.as_ref().unwrap();
        assert_eq!(data["run_id"], serde_json::json!(run_id.to_string()));
        assert_eq!(data["pipeline"], serde_json::json!("pet-clinic-delivery"));
        assert_eq!(data["commit_id"], serde_json::json!("c1"));
    }
}
