//! # Deployflow
//!
//! A self-hosted continuous-delivery pipeline engine.
//!
//! Deployflow models the delivery of a container application as a fixed
//! five-stage pipeline — source, build, deploy to the primary cluster, a
//! manual approval gate, deploy to staging — and owns exactly the parts a
//! managed pipeline service would otherwise provide:
//!
//! - **Stage sequencing**: strictly ordered execution with an explicit,
//!   testable state machine
//! - **Artifact handoff**: the source snapshot and the built image are
//!   threaded by reference between stages
//! - **Manual gating**: a blocked run suspends on a channel until an
//!   external actor decides
//! - **Run records**: per-stage execution records, queryable per run
//!
//! Everything with real side effects — source hosting, image builds,
//! deployment — is delegated through ports.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deployflow::prelude::*;
//!
//! let pipeline = Arc::new(DeliveryPipeline::new(config, source, builder, deployer)?);
//!
//! let run_id = pipeline.trigger(CommitEvent::new("4be2a1", "main")).unwrap();
//! // ... the run blocks at the gate ...
//! pipeline.approve(run_id, "release-manager")?;
//! pipeline.wait(run_id).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod approval;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod ports;
pub mod run;
pub mod sequencer;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::approval::{ApprovalDecision, ApprovalGate, GateOutcome};
    pub use crate::config::{
        ApprovalPolicy, DeployTarget, ImageRepository, OverlapPolicy, PipelineConfig,
        RepositoryConfig,
    };
    pub use crate::core::{
        ArtifactRef, ImageReference, PipelineEvent, RunState, SourceArtifact,
        StageExecution, StageId, StageStatus,
    };
    pub use crate::errors::{
        ConfigError, DeployflowError, StageFailure, TransitionError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{DeliveryPipeline, PipelineInfo, TargetLocks};
    pub use crate::ports::{CommitEvent, DeployDriver, ImageBuilder, SourceProvider};
    pub use crate::run::{PipelineRun, RunContext, RunIdentity};
    pub use crate::sequencer::{PipelineRunner, Sequencer, SequencerEvent};
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}

#[cfg(test)]
mod tests {
    #[test]
    fn library_compiles() {
        assert!(true);
    }
}
