//! Configuration and port fixtures.

use super::{InMemoryImageBuilder, InMemorySourceHost, ScriptedDeployDriver};
use crate::config::{DeployTarget, ImageRepository, PipelineConfig, RepositoryConfig};
use std::sync::Arc;

/// The pet-clinic demo configuration: one primary production target and a
/// staging environment on the same cluster, images in `ecr/petclinic`.
#[must_use]
pub fn pet_clinic_config() -> PipelineConfig {
    PipelineConfig::new(
        "pet-clinic-delivery",
        RepositoryConfig::new("pet-clinic", "https://git.example.com/pet-clinic.git"),
        ImageRepository::new("ecr", "petclinic"),
        DeployTarget::new("eks-main", "us-west-2", "production"),
        DeployTarget::new("eks-main", "us-west-2", "staging"),
    )
}

/// The three in-memory collaborators, shared so tests can script failures
/// and inspect calls after wiring them into a pipeline.
#[derive(Debug, Clone)]
pub struct TestPorts {
    /// The in-memory source host.
    pub source: Arc<InMemorySourceHost>,
    /// The in-memory build service.
    pub builder: Arc<InMemoryImageBuilder>,
    /// The in-memory deployment driver.
    pub deployer: Arc<ScriptedDeployDriver>,
}

/// Creates a fresh set of in-memory collaborators.
#[must_use]
pub fn pet_clinic_ports() -> TestPorts {
    TestPorts {
        source: Arc::new(InMemorySourceHost::new()),
        builder: Arc::new(InMemoryImageBuilder::new()),
        deployer: Arc::new(ScriptedDeployDriver::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_config_is_valid() {
        assert!(pet_clinic_config().validate().is_ok());
    }

    #[test]
    fn test_ports_are_independent_per_call() {
        let a = pet_clinic_ports();
        let b = pet_clinic_ports();
        assert!(!Arc::ptr_eq(&a.source, &b.source));
    }
}
