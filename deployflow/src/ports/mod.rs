//! Ports to the external services the pipeline delegates to.
//!
//! The engine owns sequencing, records, and the gate; everything with real
//! side effects — source hosting, image builds, deployment — lives behind
//! these traits. Success or failure is the only observable output of the
//! build and deploy contracts.

mod build;
mod deploy;
mod source;

pub use build::ImageBuilder;
pub use deploy::DeployDriver;
pub use source::{CommitEvent, SourceProvider};

#[cfg(test)]
pub use build::MockImageBuilder;
#[cfg(test)]
pub use deploy::MockDeployDriver;
#[cfg(test)]
pub use source::MockSourceProvider;
