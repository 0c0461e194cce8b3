//! Drives a single pipeline run through the five stages.

use super::state::{Sequencer, SequencerEvent};
use crate::approval::{ApprovalGate, GateOutcome};
use crate::config::{DeployTarget, PipelineConfig};
use crate::core::{ArtifactRef, ImageReference, PipelineEvent, SourceArtifact, StageId};
use crate::errors::{StageFailure, TransitionError};
use crate::pipeline::TargetLocks;
use crate::ports::{DeployDriver, ImageBuilder, SourceProvider};
use crate::run::{PipelineRun, RunContext};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Executes one run end to end against the configured ports.
///
/// Stages run strictly sequentially; a stage's side effects are complete
/// before the next stage begins. No stage is retried and nothing is
/// rolled back. Cancellation (the supersede policy) is observed at stage
/// boundaries and at the gate.
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    config: Arc<PipelineConfig>,
    source: Arc<dyn SourceProvider>,
    builder: Arc<dyn ImageBuilder>,
    deployer: Arc<dyn DeployDriver>,
    gate: Arc<ApprovalGate>,
    locks: Arc<TargetLocks>,
}

impl PipelineRunner {
    /// Creates a runner over the given configuration and ports.
    #[must_use]
    pub fn new(
        config: Arc<PipelineConfig>,
        source: Arc<dyn SourceProvider>,
        builder: Arc<dyn ImageBuilder>,
        deployer: Arc<dyn DeployDriver>,
        gate: Arc<ApprovalGate>,
        locks: Arc<TargetLocks>,
    ) -> Self {
        Self {
            config,
            source,
            builder,
            deployer,
            gate,
            locks,
        }
    }

    /// Executes the run to a terminal state.
    ///
    /// The run aggregate is updated in place; the runner never returns an
    /// error to the caller — failures terminate the run and are surfaced
    /// through its records and the event sink.
    pub async fn execute(&self, run: &Arc<RwLock<PipelineRun>>, ctx: &RunContext) {
        if let Err(err) = self.drive(run, ctx).await {
            // A rejected transition is an engine defect, not a stage
            // failure; fail the run loudly rather than wedging it.
            let msg = err.to_string();
            error!(run_id = %ctx.run_id(), error = %msg, "sequencer rejected an event");
            run.write().fail_run(msg.clone());
            ctx.try_emit(
                &PipelineEvent::new("run.failed").add_data("error", serde_json::json!(msg)),
            );
        }
    }

    async fn drive(
        &self,
        run: &Arc<RwLock<PipelineRun>>,
        ctx: &RunContext,
    ) -> Result<(), TransitionError> {
        let run_id = ctx.run_id();
        let commit = run.read().commit.clone();
        let mut seq = Sequencer::new();

        ctx.try_emit(&PipelineEvent::run_started(run_id, &commit.commit_id));
        seq.apply(SequencerEvent::Triggered)?;

        // Stage 1: fetch the source snapshot.
        if self.halt_if_superseded(run, ctx, &mut seq, StageId::Source)? {
            return Ok(());
        }
        self.begin(run, ctx, StageId::Source, Vec::new())?;
        let repository = self
            .config
            .repository
            .regional_name(&self.config.primary.region);
        let started = Instant::now();
        let source = match self.source.fetch(&repository, &commit).await {
            Ok(artifact) => artifact,
            Err(cause) => {
                seq.apply(SequencerEvent::StageFailed(StageId::Source))?;
                let failure = StageFailure::SourceFetch { repository, cause };
                self.fail_stage(run, ctx, StageId::Source, &failure.to_string());
                return Ok(());
            }
        };
        self.complete(run, ctx, StageId::Source, vec![source.as_ref_pointer()], started);
        run.write().source_artifact = Some(source.clone());
        seq.apply(SequencerEvent::StageSucceeded(StageId::Source))?;

        // Stage 2: build and publish the image.
        if self.halt_if_superseded(run, ctx, &mut seq, StageId::Build)? {
            return Ok(());
        }
        self.begin(run, ctx, StageId::Build, vec![source.as_ref_pointer()])?;
        let started = Instant::now();
        let image = match self
            .builder
            .build(&source, &self.config.image_repository)
            .await
        {
            Ok(image) => image,
            Err(cause) => {
                seq.apply(SequencerEvent::StageFailed(StageId::Build))?;
                let failure = StageFailure::Build {
                    image_repository: self.config.image_repository.uri(),
                    cause,
                };
                self.fail_stage(run, ctx, StageId::Build, &failure.to_string());
                return Ok(());
            }
        };
        debug!(run_id = %run_id, image = %image, "image published");
        self.complete(run, ctx, StageId::Build, vec![image.as_ref_pointer()], started);
        run.write().image = Some(image.clone());
        seq.apply(SequencerEvent::StageSucceeded(StageId::Build))?;

        // Stage 3: apply to the primary cluster.
        if self.halt_if_superseded(run, ctx, &mut seq, StageId::DeployPrimary)? {
            return Ok(());
        }
        let primary = self.config.primary.clone();
        if !self
            .deploy_stage(run, ctx, &mut seq, StageId::DeployPrimary, &image, &source, &primary)
            .await?
        {
            return Ok(());
        }

        // Stage 4: the manual gate.
        if self.halt_if_superseded(run, ctx, &mut seq, StageId::Approve)? {
            return Ok(());
        }
        self.begin(run, ctx, StageId::Approve, vec![image.as_ref_pointer()])?;
        seq.apply(SequencerEvent::GateEntered)?;
        run.write().block_on_approval();
        ctx.try_emit(&PipelineEvent::run_blocked(run_id));
        let started = Instant::now();
        match self
            .gate
            .wait_for_decision(run_id, self.config.approval.timeout())
            .await
        {
            GateOutcome::Decided(decision) => {
                ctx.try_emit(&PipelineEvent::approval_recorded(
                    run_id,
                    decision.approved,
                    &decision.actor,
                ));
                if decision.approved {
                    seq.apply(SequencerEvent::DecisionApproved)?;
                    self.complete(run, ctx, StageId::Approve, Vec::new(), started);
                } else {
                    seq.apply(SequencerEvent::DecisionRejected)?;
                    let failure = StageFailure::ApprovalRejected {
                        actor: decision.actor,
                    };
                    self.fail_stage(run, ctx, StageId::Approve, &failure.to_string());
                    return Ok(());
                }
            }
            GateOutcome::TimedOut { waited_secs } => {
                seq.apply(SequencerEvent::GateExpired)?;
                let failure = StageFailure::ApprovalTimedOut { waited_secs };
                self.fail_stage(run, ctx, StageId::Approve, &failure.to_string());
                return Ok(());
            }
            GateOutcome::Cancelled => {
                seq.apply(SequencerEvent::Superseded)?;
                let failure = StageFailure::Superseded {
                    reason: ctx
                        .cancel_reason()
                        .unwrap_or_else(|| "run cancelled".to_string()),
                };
                self.fail_stage(run, ctx, StageId::Approve, &failure.to_string());
                return Ok(());
            }
        }

        // Stage 5: apply to staging.
        if self.halt_if_superseded(run, ctx, &mut seq, StageId::DeployStaging)? {
            return Ok(());
        }
        let staging = self.config.staging.clone();
        if !self
            .deploy_stage(run, ctx, &mut seq, StageId::DeployStaging, &image, &source, &staging)
            .await?
        {
            return Ok(());
        }

        run.write().succeed();
        ctx.try_emit(&PipelineEvent::run_succeeded(run_id));
        Ok(())
    }

    /// Runs one deploy stage. Returns false if the stage failed and the
    /// run was terminated.
    #[allow(clippy::too_many_arguments)]
    async fn deploy_stage(
        &self,
        run: &Arc<RwLock<PipelineRun>>,
        ctx: &RunContext,
        seq: &mut Sequencer,
        stage: StageId,
        image: &ImageReference,
        source: &SourceArtifact,
        target: &DeployTarget,
    ) -> Result<bool, TransitionError> {
        self.begin(
            run,
            ctx,
            stage,
            vec![image.as_ref_pointer(), source.as_ref_pointer()],
        )?;
        let started = Instant::now();

        let lock = self.locks.lock_for(&target.lock_key());
        let result = {
            let _guard = lock.lock().await;
            self.deployer.deploy(image, source, target).await
        };

        match result {
            Ok(()) => {
                self.complete(run, ctx, stage, Vec::new(), started);
                seq.apply(SequencerEvent::StageSucceeded(stage))?;
                Ok(true)
            }
            Err(cause) => {
                seq.apply(SequencerEvent::StageFailed(stage))?;
                let failure = StageFailure::Deploy {
                    target: target.to_string(),
                    cause,
                };
                self.fail_stage(run, ctx, stage, &failure.to_string());
                Ok(false)
            }
        }
    }

    fn begin(
        &self,
        run: &Arc<RwLock<PipelineRun>>,
        ctx: &RunContext,
        stage: StageId,
        consumed: Vec<ArtifactRef>,
    ) -> Result<(), TransitionError> {
        run.write().begin_stage(stage, consumed)?;
        ctx.try_emit(&PipelineEvent::stage_started(stage));
        Ok(())
    }

    fn complete(
        &self,
        run: &Arc<RwLock<PipelineRun>>,
        ctx: &RunContext,
        stage: StageId,
        produced: Vec<ArtifactRef>,
        started: Instant,
    ) {
        run.write().complete_stage(produced);
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        ctx.try_emit(&PipelineEvent::stage_completed(stage, duration_ms));
    }

    fn fail_stage(
        &self,
        run: &Arc<RwLock<PipelineRun>>,
        ctx: &RunContext,
        stage: StageId,
        error: &str,
    ) {
        run.write().fail_stage(error);
        ctx.try_emit(&PipelineEvent::stage_failed(stage, error));
        ctx.try_emit(&PipelineEvent::run_failed(ctx.run_id(), stage, error));
        warn!(run_id = %ctx.run_id(), stage = %stage, error = %error, "run failed");
    }

    /// Terminates the run if cancellation was requested before `next`.
    fn halt_if_superseded(
        &self,
        run: &Arc<RwLock<PipelineRun>>,
        ctx: &RunContext,
        seq: &mut Sequencer,
        next: StageId,
    ) -> Result<bool, TransitionError> {
        if !ctx.is_cancelled() {
            return Ok(false);
        }
        seq.apply(SequencerEvent::Superseded)?;
        let failure = StageFailure::Superseded {
            reason: ctx
                .cancel_reason()
                .unwrap_or_else(|| "run cancelled".to_string()),
        };
        let msg = failure.to_string();
        run.write().fail_run(msg.clone());
        ctx.try_emit(&PipelineEvent::run_failed(ctx.run_id(), next, &msg));
        warn!(run_id = %ctx.run_id(), before = %next, "run superseded");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunState;
    use crate::ports::{CommitEvent, MockDeployDriver, MockImageBuilder, MockSourceProvider};
    use crate::testing::pet_clinic_config;
    use std::time::Duration;

    fn harness(
        source: MockSourceProvider,
        builder: MockImageBuilder,
        deployer: MockDeployDriver,
    ) -> (PipelineRunner, Arc<ApprovalGate>) {
        let gate = Arc::new(ApprovalGate::new());
        let runner = PipelineRunner::new(
            Arc::new(pet_clinic_config()),
            Arc::new(source),
            Arc::new(builder),
            Arc::new(deployer),
            gate.clone(),
            Arc::new(TargetLocks::new()),
        );
        (runner, gate)
    }

    fn new_run(commit: &str) -> (Arc<RwLock<PipelineRun>>, Arc<RunContext>) {
        let run = PipelineRun::new("pet-clinic-delivery", CommitEvent::new(commit, "main"));
        let ctx = Arc::new(RunContext::new(run.identity.clone()));
        (Arc::new(RwLock::new(run)), ctx)
    }

    #[tokio::test]
    async fn test_ports_receive_threaded_artifacts() {
        let mut source = MockSourceProvider::new();
        source
            .expect_fetch()
            .times(1)
            .withf(|repository, event| {
                repository == "pet-clinic-us-west-2" && event.commit_id == "c42"
            })
            .returning(|repository, event| {
                Ok(SourceArtifact::new(
                    event.commit_id.clone(),
                    repository,
                    "snap-x",
                ))
            });

        let mut builder = MockImageBuilder::new();
        builder
            .expect_build()
            .times(1)
            .withf(|src, repo| src.snapshot_id == "snap-x" && repo.uri() == "ecr/petclinic")
            .returning(|src, repo| {
                Ok(ImageReference::new(
                    repo.registry.clone(),
                    repo.repository.clone(),
                    src.commit_id.clone(),
                ))
            });

        let mut deployer = MockDeployDriver::new();
        deployer
            .expect_deploy()
            .times(2)
            .withf(|image, src, _target| {
                image.uri() == "ecr/petclinic:c42" && src.snapshot_id == "snap-x"
            })
            .returning(|_, _, _| Ok(()));

        let (runner, gate) = harness(source, builder, deployer);
        let (run, ctx) = new_run("c42");
        let run_id = ctx.run_id();

        let task = tokio::spawn({
            let runner = runner.clone();
            let run = run.clone();
            let ctx = ctx.clone();
            async move { runner.execute(&run, &ctx).await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while gate.pending_runs().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        gate.approve(run_id, "release-manager").unwrap();
        task.await.unwrap();

        assert_eq!(run.read().state, RunState::Succeeded);
    }

    #[tokio::test]
    async fn test_primary_deploy_failure_stops_before_gate() {
        let mut source = MockSourceProvider::new();
        source.expect_fetch().returning(|repository, event| {
            Ok(SourceArtifact::new(
                event.commit_id.clone(),
                repository,
                "snap-y",
            ))
        });

        let mut builder = MockImageBuilder::new();
        builder.expect_build().returning(|src, repo| {
            Ok(ImageReference::new(
                repo.registry.clone(),
                repo.repository.clone(),
                src.commit_id.clone(),
            ))
        });

        let mut deployer = MockDeployDriver::new();
        deployer
            .expect_deploy()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("rollout stuck")));

        let (runner, gate) = harness(source, builder, deployer);
        let (run, ctx) = new_run("c43");

        runner.execute(&run, &ctx).await;

        let run = run.read();
        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.records.len(), 3);
        assert!(run.failure.as_deref().unwrap().contains("rollout stuck"));
        assert_eq!(gate.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_before_first_stage() {
        let mut source = MockSourceProvider::new();
        source.expect_fetch().times(0);
        let mut builder = MockImageBuilder::new();
        builder.expect_build().times(0);
        let mut deployer = MockDeployDriver::new();
        deployer.expect_deploy().times(0);

        let (runner, _gate) = harness(source, builder, deployer);
        let (run, ctx) = new_run("c44");
        ctx.mark_cancelled("superseded by a newer trigger");

        runner.execute(&run, &ctx).await;

        let run = run.read();
        assert_eq!(run.state, RunState::Failed);
        assert!(run.records.is_empty());
        assert!(run.failure.as_deref().unwrap().contains("superseded"));
    }
}
