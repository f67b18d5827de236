//! Kubernetes adapter.
//!
//! Translates Berth specs into `apps/v1 Deployment` and `v1 Service`
//! objects and back. The client comes from the ambient kubeconfig or the
//! in-cluster service account.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec as KubeDeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort,
    ServiceSpec as KubeServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::Client;
use kube::api::{Api, PostParams};
use tracing::debug;

use berth_core::{DeploymentSpec, ImageReference, ServiceSpec};

use crate::client::{OrchestratorClient, OrchestratorError};

/// Replica count the API server fills in when none is given.
const DEFAULT_REPLICAS: i32 = 1;

pub struct KubeOrchestrator {
    client: Client,
}

impl KubeOrchestrator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect with the ambient kubeconfig or in-cluster configuration.
    pub async fn from_env() -> Result<Self, OrchestratorError> {
        let client = Client::try_default().await.map_err(|e| {
            OrchestratorError::Forbidden(format!("no usable cluster credentials: {e}"))
        })?;
        Ok(Self::new(client))
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl OrchestratorClient for KubeOrchestrator {
    async fn create_deployment(&self, spec: &DeploymentSpec) -> Result<(), OrchestratorError> {
        self.deployments(&spec.namespace)
            .create(&PostParams::default(), &to_kube_deployment(spec))
            .await
            .map_err(|e| classify(e, &spec.namespace))?;
        debug!(deployment = %spec.key(), "deployment accepted by api server");
        Ok(())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeploymentSpec>, OrchestratorError> {
        let live = self
            .deployments(namespace)
            .get_opt(name)
            .await
            .map_err(|e| classify(e, namespace))?;
        Ok(live.map(|d| from_kube_deployment(&d, namespace, name)))
    }

    async fn create_service(&self, spec: &ServiceSpec) -> Result<(), OrchestratorError> {
        self.services(&spec.namespace)
            .create(&PostParams::default(), &to_kube_service(spec))
            .await
            .map_err(|e| classify(e, &spec.namespace))?;
        debug!(service = %spec.key(), "service accepted by api server");
        Ok(())
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceSpec>, OrchestratorError> {
        let live = self
            .services(namespace)
            .get_opt(name)
            .await
            .map_err(|e| classify(e, namespace))?;
        Ok(live.map(|s| from_kube_service(&s, namespace, name)))
    }
}

// ── Translation ────────────────────────────────────────────────────

pub fn to_kube_deployment(spec: &DeploymentSpec) -> Deployment {
    let labels = spec.selector_labels.clone();
    Deployment {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(spec.namespace.clone()),
            ..Default::default()
        },
        spec: Some(KubeDeploymentSpec {
            replicas: Some(spec.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: spec.container_name.clone(),
                        image: Some(spec.image.to_string()),
                        ports: Some(vec![ContainerPort {
                            container_port: i32::from(spec.container_port),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn to_kube_service(spec: &ServiceSpec) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(spec.namespace.clone()),
            ..Default::default()
        },
        spec: Some(KubeServiceSpec {
            selector: Some(spec.selector_labels.clone()),
            ports: Some(vec![ServicePort {
                port: i32::from(spec.port),
                target_port: Some(IntOrString::Int(i32::from(spec.target_port))),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Read a live deployment back into Berth's shape. Fields Berth does not
/// set are ignored; fields it cannot interpret come back empty so the
/// comparison reports them as different.
pub fn from_kube_deployment(live: &Deployment, namespace: &str, name: &str) -> DeploymentSpec {
    let spec = live.spec.clone().unwrap_or_default();
    let selector_labels = spec
        .template
        .metadata
        .and_then(|m| m.labels)
        .unwrap_or_default();
    let container = spec
        .template
        .spec
        .and_then(|p| p.containers.into_iter().next())
        .unwrap_or_default();
    let image = container
        .image
        .as_deref()
        .and_then(ImageReference::parse)
        .unwrap_or_else(|| ImageReference::new(container.image.clone().unwrap_or_default(), ""));
    let container_port = container
        .ports
        .and_then(|ports| ports.into_iter().next())
        .and_then(|p| u16::try_from(p.container_port).ok())
        .unwrap_or(0);

    DeploymentSpec {
        name: name.to_string(),
        namespace: namespace.to_string(),
        replicas: spec.replicas.unwrap_or(DEFAULT_REPLICAS),
        selector_labels,
        container_name: container.name,
        image,
        container_port,
    }
}

pub fn from_kube_service(live: &Service, namespace: &str, name: &str) -> ServiceSpec {
    let spec = live.spec.clone().unwrap_or_default();
    let port = spec.ports.and_then(|ports| ports.into_iter().next());
    let (port, target_port) = match port {
        Some(p) => {
            let target = match p.target_port {
                Some(IntOrString::Int(t)) => u16::try_from(t).unwrap_or(0),
                // Named ports cannot be compared with a number.
                Some(IntOrString::String(_)) => 0,
                None => u16::try_from(p.port).unwrap_or(0),
            };
            (u16::try_from(p.port).unwrap_or(0), target)
        }
        None => (0, 0),
    };

    ServiceSpec {
        name: name.to_string(),
        namespace: namespace.to_string(),
        selector_labels: spec.selector.unwrap_or_default(),
        port,
        target_port,
    }
}

// ── Errors ─────────────────────────────────────────────────────────

fn classify(err: kube::Error, namespace: &str) -> OrchestratorError {
    match err {
        kube::Error::Api(resp) => {
            classify_status(resp.code, &resp.reason, resp.message, namespace)
        }
        // Connection, TLS, and decode failures.
        other => OrchestratorError::Transient(other.to_string()),
    }
}

fn classify_status(
    code: u16,
    reason: &str,
    message: String,
    namespace: &str,
) -> OrchestratorError {
    match code {
        409 if reason == "AlreadyExists" => OrchestratorError::AlreadyExists,
        404 => OrchestratorError::NamespaceNotFound(namespace.to_string()),
        401 | 403 => OrchestratorError::Forbidden(message),
        400 | 422 => OrchestratorError::Rejected(message),
        409 | 429 | 500..=599 => OrchestratorError::Transient(message),
        _ => OrchestratorError::Rejected(message),
    }
}
