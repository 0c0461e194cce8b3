//! The delivery pipeline facade.
//!
//! Owns the configuration, the approval gate, the run registry, and the
//! overlap policy. Embedders construct one [`DeliveryPipeline`] per
//! watched repository and feed it commit events.

mod locks;

pub use locks::TargetLocks;

use crate::approval::ApprovalGate;
use crate::config::{OverlapPolicy, PipelineConfig};
use crate::core::RunState;
use crate::errors::{ConfigError, DeployflowError};
use crate::events::EventSink;
use crate::ports::{CommitEvent, DeployDriver, ImageBuilder, SourceProvider};
use crate::run::{PipelineRun, RunContext};
use crate::sequencer::PipelineRunner;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// The durable, externally queryable identity of a pipeline.
///
/// This is the only configuration surface the engine exports at setup
/// time; everything else is owned by the external services.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PipelineInfo {
    /// Pipeline name.
    pub name: String,

    /// Clone URL of the watched repository.
    pub clone_url: String,

    /// Branch whose commits trigger runs.
    pub branch: String,

    /// URI of the image repository builds publish to.
    pub image_repository: String,

    /// The primary deploy target.
    pub primary: String,

    /// The staging deploy target.
    pub staging: String,
}

/// A configured delivery pipeline.
///
/// Runs are explicit, identified by UUID, and queryable at any time;
/// there is no hidden singleton pipeline state.
pub struct DeliveryPipeline {
    config: Arc<PipelineConfig>,
    gate: Arc<ApprovalGate>,
    runner: PipelineRunner,
    runs: DashMap<Uuid, Arc<RwLock<PipelineRun>>>,
    contexts: DashMap<Uuid, Arc<RunContext>>,
    handles: DashMap<Uuid, JoinHandle<()>>,
    run_slot: Arc<tokio::sync::Mutex<()>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl DeliveryPipeline {
    /// Creates a pipeline over the given configuration and ports.
    ///
    /// Logs the exported clone URL once, the way the pipeline identity is
    /// surfaced at setup time.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn SourceProvider>,
        builder: Arc<dyn ImageBuilder>,
        deployer: Arc<dyn DeployDriver>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = Arc::new(config);
        let gate = Arc::new(ApprovalGate::new());
        let locks = Arc::new(TargetLocks::new());
        let runner = PipelineRunner::new(
            config.clone(),
            source,
            builder,
            deployer,
            gate.clone(),
            locks,
        );

        info!(
            pipeline = %config.name,
            clone_url = %config.repository.clone_url,
            image_repository = %config.image_repository,
            "pipeline configured"
        );

        Ok(Self {
            config,
            gate,
            runner,
            runs: DashMap::new(),
            contexts: DashMap::new(),
            handles: DashMap::new(),
            run_slot: Arc::new(tokio::sync::Mutex::new(())),
            event_sink: None,
        })
    }

    /// Sets the event sink for all subsequent runs.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Returns the exported pipeline identity.
    #[must_use]
    pub fn info(&self) -> PipelineInfo {
        PipelineInfo {
            name: self.config.name.clone(),
            clone_url: self.config.repository.clone_url.clone(),
            branch: self.config.repository.branch.clone(),
            image_repository: self.config.image_repository.uri(),
            primary: self.config.primary.to_string(),
            staging: self.config.staging.to_string(),
        }
    }

    /// Returns the pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Accepts a commit event and starts a run for it.
    ///
    /// Returns the new run id, or `None` if the commit is not on the
    /// watched branch. Under the queue policy the run waits for the slot;
    /// under the supersede policy every in-flight run is cancelled at its
    /// next stage boundary. Must be called within a tokio runtime.
    pub fn trigger(self: &Arc<Self>, event: CommitEvent) -> Option<Uuid> {
        if event.branch != self.config.repository.branch {
            debug!(
                pipeline = %self.config.name,
                branch = %event.branch,
                commit = %event.commit_id,
                "ignoring commit off the watched branch"
            );
            return None;
        }

        let run = PipelineRun::new(self.config.name.clone(), event.clone());
        let run_id = run.run_id();
        let mut ctx = RunContext::new(run.identity.clone());
        if let Some(ref sink) = self.event_sink {
            ctx = ctx.with_event_sink(sink.clone());
        }
        let ctx = Arc::new(ctx);
        let run = Arc::new(RwLock::new(run));

        if self.config.overlap == OverlapPolicy::Supersede {
            self.supersede_in_flight(run_id, &event.commit_id);
        }

        self.runs.insert(run_id, run.clone());
        self.contexts.insert(run_id, ctx.clone());

        let this = self.clone();
        let queued = self.config.overlap == OverlapPolicy::Queue;
        let handle = tokio::spawn(async move {
            let _slot = if queued {
                Some(this.run_slot.lock().await)
            } else {
                None
            };
            this.runner.execute(&run, &ctx).await;
            this.contexts.remove(&run_id);
        });
        self.handles.insert(run_id, handle);

        Some(run_id)
    }

    /// Records an approval for a blocked run.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is unknown or not blocked.
    pub fn approve(&self, run_id: Uuid, actor: impl Into<String>) -> Result<(), DeployflowError> {
        self.ensure_known(run_id)?;
        self.gate.approve(run_id, actor)
    }

    /// Records a rejection for a blocked run.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is unknown or not blocked.
    pub fn reject(&self, run_id: Uuid, actor: impl Into<String>) -> Result<(), DeployflowError> {
        self.ensure_known(run_id)?;
        self.gate.reject(run_id, actor)
    }

    /// Returns the run ids currently blocked at the gate.
    #[must_use]
    pub fn pending_approvals(&self) -> Vec<Uuid> {
        self.gate.pending_runs()
    }

    /// Returns a snapshot of a run's current records and state.
    #[must_use]
    pub fn run_snapshot(&self, run_id: Uuid) -> Option<PipelineRun> {
        self.runs.get(&run_id).map(|run| run.read().clone())
    }

    /// Returns a run's sequencer state.
    #[must_use]
    pub fn run_state(&self, run_id: Uuid) -> Option<RunState> {
        self.runs.get(&run_id).map(|run| run.read().state)
    }

    /// Returns snapshots of every run this pipeline has accepted.
    #[must_use]
    pub fn runs(&self) -> Vec<PipelineRun> {
        let mut snapshots: Vec<PipelineRun> =
            self.runs.iter().map(|run| run.read().clone()).collect();
        snapshots.sort_by_key(|run| run.identity.triggered_at);
        snapshots
    }

    /// Waits for a run's task to finish.
    pub async fn wait(&self, run_id: Uuid) {
        if let Some((_, handle)) = self.handles.remove(&run_id) {
            let _ = handle.await;
        }
    }

    /// Waits for every in-flight run to finish.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let ids: Vec<Uuid> = self.handles.iter().map(|entry| *entry.key()).collect();
            ids.into_iter()
                .filter_map(|id| self.handles.remove(&id).map(|(_, handle)| handle))
                .collect()
        };
        join_all(handles).await;
    }

    fn supersede_in_flight(&self, new_run_id: Uuid, commit_id: &str) {
        let in_flight: Vec<Uuid> = self.contexts.iter().map(|entry| *entry.key()).collect();
        for run_id in in_flight {
            if run_id == new_run_id {
                continue;
            }
            if let Some(ctx) = self.contexts.get(&run_id) {
                ctx.mark_cancelled(format!(
                    "superseded by run {new_run_id} for commit {commit_id}"
                ));
            }
            // A run blocked at the gate resolves immediately; one mid-stage
            // observes the flag at its next boundary.
            self.gate.cancel(run_id);
        }
    }

    fn ensure_known(&self, run_id: Uuid) -> Result<(), DeployflowError> {
        if self.runs.contains_key(&run_id) {
            Ok(())
        } else {
            Err(DeployflowError::UnknownRun { run_id })
        }
    }
}

impl std::fmt::Debug for DeliveryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryPipeline")
            .field("name", &self.config.name)
            .field("runs", &self.runs.len())
            .field("pending_approvals", &self.gate.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pet_clinic_config, pet_clinic_ports};

    fn pipeline() -> Arc<DeliveryPipeline> {
        let ports = pet_clinic_ports();
        Arc::new(
            DeliveryPipeline::new(
                pet_clinic_config(),
                ports.source,
                ports.builder,
                ports.deployer,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let ports = pet_clinic_ports();
        let mut config = pet_clinic_config();
        config.staging = config.primary.clone();

        assert!(DeliveryPipeline::new(
            config,
            ports.source,
            ports.builder,
            ports.deployer
        )
        .is_err());
    }

    #[test]
    fn test_info_exports_clone_url() {
        let ports = pet_clinic_ports();
        let pipeline = DeliveryPipeline::new(
            pet_clinic_config(),
            ports.source,
            ports.builder,
            ports.deployer,
        )
        .unwrap();

        let info = pipeline.info();
        assert_eq!(info.clone_url, "https://git.example.com/pet-clinic.git");
        assert_eq!(info.image_repository, "ecr/petclinic");
        assert_eq!(info.branch, "main");
    }

    #[tokio::test]
    async fn test_off_branch_commit_is_ignored() {
        let pipeline = pipeline();
        let run_id = pipeline.trigger(CommitEvent::new("c9", "feature/wip"));

        assert_eq!(run_id, None);
        assert!(pipeline.runs().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_run_is_rejected() {
        let pipeline = pipeline();
        let missing = crate::utils::generate_uuid();

        assert!(matches!(
            pipeline.approve(missing, "ops"),
            Err(DeployflowError::UnknownRun { .. })
        ));
    }
}
