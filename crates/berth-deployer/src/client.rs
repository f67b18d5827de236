//! The orchestrator control plane as seen by the deployer.

use async_trait::async_trait;
use thiserror::Error;

use berth_core::{DeploymentSpec, ServiceSpec};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// An object with this name already exists in the namespace.
    #[error("already exists")]
    AlreadyExists,

    #[error("namespace {0} not found")]
    NamespaceNotFound(String),

    /// RBAC or authentication denial.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The API server refused the object as invalid.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("{0}")]
    Transient(String),
}

/// Create-and-read access to deployments and services in a namespace.
///
/// `get_*` return the live object translated back into Berth's spec
/// shape so it can be compared field by field with the requested one.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    async fn create_deployment(&self, spec: &DeploymentSpec) -> Result<(), OrchestratorError>;

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeploymentSpec>, OrchestratorError>;

    async fn create_service(&self, spec: &ServiceSpec) -> Result<(), OrchestratorError>;

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceSpec>, OrchestratorError>;
}
