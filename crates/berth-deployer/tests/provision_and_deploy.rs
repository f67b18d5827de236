//! End-to-end: provision a repository, then deploy an image from it.

use std::sync::Arc;
use std::time::Duration;

use berth_core::{ErrorKind, ImageReference, LATEST_TAG};
use berth_deployer::{
    DeployRequest, InMemoryOrchestrator, OrchestratorError, StepOutcome, WorkloadDeployer,
};
use berth_registry::{InMemoryRegistry, RegistryProvisioner};

const TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    registry: Arc<InMemoryRegistry>,
    cluster: Arc<InMemoryOrchestrator>,
    provisioner: RegistryProvisioner,
    deployer: WorkloadDeployer,
}

fn harness() -> Harness {
    let registry = Arc::new(InMemoryRegistry::new());
    let cluster = Arc::new(InMemoryOrchestrator::new());
    Harness {
        provisioner: RegistryProvisioner::new(registry.clone(), TIMEOUT),
        deployer: WorkloadDeployer::new(cluster.clone(), TIMEOUT),
        registry,
        cluster,
    }
}

fn request(image: ImageReference) -> DeployRequest {
    DeployRequest {
        namespace: "default".to_string(),
        deployment_name: "my-app-dep".to_string(),
        service_name: "my-app-svc".to_string(),
        container_name: None,
        image,
        replicas: 1,
        container_port: 5000,
        service_port: None,
    }
}

#[tokio::test]
async fn provision_then_deploy() {
    let h = harness();

    let repo = h.provisioner.ensure_repository("my-app").await.unwrap();
    assert_eq!(repo.uri, "registry.example/my-app");

    let image = ImageReference::in_repository(&repo, LATEST_TAG);
    let result = h.deployer.deploy(&request(image)).await.unwrap();

    assert_eq!(result.deployment, StepOutcome::Created);
    assert_eq!(result.service, StepOutcome::Created);

    let live = h.cluster.deployment("default", "my-app-dep").unwrap();
    assert_eq!(live.image.to_string(), "registry.example/my-app:latest");
    assert_eq!(live.replicas, 1);

    let svc = h.cluster.service("default", "my-app-svc").unwrap();
    assert_eq!(svc.selector_labels, live.selector_labels);
    assert_eq!(svc.target_port, 5000);
}

#[tokio::test]
async fn full_run_is_idempotent() {
    let h = harness();

    let first = h.provisioner.ensure_repository("my-app").await.unwrap();
    let image = ImageReference::in_repository(&first, "v1");
    h.deployer.deploy(&request(image.clone())).await.unwrap();

    let second = h.provisioner.ensure_repository("my-app").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.registry.create_calls(), 2);
    assert_eq!(h.registry.describe_calls(), 1);

    let again = h.deployer.deploy(&request(image)).await.unwrap();
    assert_eq!(again.deployment, StepOutcome::Unchanged);
    assert_eq!(again.service, StepOutcome::Unchanged);
    assert!(again.into_result().is_ok());
    assert_eq!(h.cluster.deployment_creates(), 2);
}

#[tokio::test]
async fn partial_failure_recovers_on_resubmit() {
    let h = harness();
    let repo = h.provisioner.ensure_repository("my-app").await.unwrap();
    let req = request(ImageReference::in_repository(&repo, "v1"));

    h.cluster
        .fail_next_service(OrchestratorError::Transient("etcd leader election".to_string()));
    let first = h.deployer.deploy(&req).await.unwrap();
    assert!(first.is_partial());
    assert!(first.is_retryable());
    assert_eq!(
        first.clone().into_result().unwrap_err().kind(),
        ErrorKind::PartialDeployment
    );

    let second = h.deployer.deploy(&req).await.unwrap();
    assert_eq!(second.deployment, StepOutcome::Unchanged);
    assert_eq!(second.service, StepOutcome::Created);

    let merged = second.deployment.clone().after(&first.deployment);
    assert_eq!(merged, StepOutcome::Created);
}

#[tokio::test]
async fn redeploy_with_new_tag_conflicts() {
    let h = harness();
    let repo = h.provisioner.ensure_repository("my-app").await.unwrap();

    h.deployer
        .deploy(&request(ImageReference::in_repository(&repo, "v1")))
        .await
        .unwrap();
    let result = h
        .deployer
        .deploy(&request(ImageReference::in_repository(&repo, "v2")))
        .await
        .unwrap();

    let err = result.deployment.error().unwrap();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("image"));
    assert_eq!(result.service, StepOutcome::Unchanged);

    let live = h.cluster.deployment("default", "my-app-dep").unwrap();
    assert_eq!(live.image.tag, "v1");
}
