//! Client selection.
//!
//! `memory` backends start empty on every invocation and are meant for
//! trying out a command end to end without credentials.

use std::sync::Arc;

use clap::ValueEnum;
use serde::Serialize;

use berth_deployer::{InMemoryOrchestrator, OrchestratorClient};
use berth_registry::{InMemoryRegistry, RegistryClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryBackend {
    Memory,
    /// Amazon ECR, credentials from the standard AWS provider chain.
    #[default]
    Ecr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorBackend {
    Memory,
    /// Kubernetes, via kubeconfig or the in-cluster service account.
    #[default]
    Kube,
}

pub async fn registry_client(backend: RegistryBackend) -> anyhow::Result<Arc<dyn RegistryClient>> {
    match backend {
        RegistryBackend::Memory => Ok(Arc::new(InMemoryRegistry::new())),
        RegistryBackend::Ecr => ecr_client().await,
    }
}

/// `namespace` is created up front in the memory backend so a fresh
/// in-process cluster accepts the deploy.
pub async fn orchestrator_client(
    backend: OrchestratorBackend,
    namespace: &str,
) -> anyhow::Result<Arc<dyn OrchestratorClient>> {
    match backend {
        OrchestratorBackend::Memory => {
            Ok(Arc::new(InMemoryOrchestrator::new().with_namespace(namespace)))
        }
        OrchestratorBackend::Kube => kube_client().await,
    }
}

#[cfg(feature = "ecr")]
async fn ecr_client() -> anyhow::Result<Arc<dyn RegistryClient>> {
    Ok(Arc::new(berth_registry::EcrRegistry::from_env().await))
}

#[cfg(not(feature = "ecr"))]
async fn ecr_client() -> anyhow::Result<Arc<dyn RegistryClient>> {
    anyhow::bail!("berth was built without the `ecr` feature; use --registry-backend memory")
}

#[cfg(feature = "kube")]
async fn kube_client() -> anyhow::Result<Arc<dyn OrchestratorClient>> {
    use anyhow::Context;

    let client = berth_deployer::KubeOrchestrator::from_env()
        .await
        .context("connecting to the Kubernetes API server")?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "kube"))]
async fn kube_client() -> anyhow::Result<Arc<dyn OrchestratorClient>> {
    anyhow::bail!("berth was built without the `kube` feature; use --orchestrator-backend memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backends_start_empty() {
        let registry = registry_client(RegistryBackend::Memory).await.unwrap();
        assert_eq!(
            registry.describe_repository("my-app").await,
            Err(berth_registry::RegistryError::NotFound)
        );

        let cluster = orchestrator_client(OrchestratorBackend::Memory, "staging")
            .await
            .unwrap();
        assert_eq!(cluster.get_deployment("staging", "api").await, Ok(None));
    }

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!(
            RegistryBackend::from_str("ECR", true),
            Ok(RegistryBackend::Ecr)
        );
        assert_eq!(
            OrchestratorBackend::from_str("memory", true),
            Ok(OrchestratorBackend::Memory)
        );
    }
}
