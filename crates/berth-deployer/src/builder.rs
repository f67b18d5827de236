//! Construct and validate deployment/service specs.
//!
//! Nothing in this module touches the network. [`DeployRequest::plan`]
//! runs both stages and is what the deployer calls before submitting.

use serde::{Deserialize, Serialize};
use tracing::warn;

use berth_core::validate::{
    validate_container_name, validate_deployment_name, validate_label_value, validate_namespace,
    validate_port, validate_replicas, validate_service_name, validate_tag,
};
use berth_core::{DeploymentSpec, Error, ImageReference, Labels, Result, ServiceSpec};

use crate::deployer::DeployRequest;

/// Label key selecting a deployment's pods.
pub const APP_LABEL: &str = "app";

/// A validated pair of specs, ready to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployPlan {
    pub deployment: DeploymentSpec,
    pub service: ServiceSpec,
}

/// Selector labels for a deployment. Depends only on the name, so repeated
/// deploys under one name yield identical labels.
pub fn selector_labels(deployment_name: &str) -> Labels {
    Labels::from([(APP_LABEL.to_string(), deployment_name.to_string())])
}

// ── Construct ──────────────────────────────────────────────────────

pub fn build_deployment_spec(
    namespace: &str,
    name: &str,
    container_name: &str,
    image: ImageReference,
    replicas: i32,
    container_port: u16,
) -> DeploymentSpec {
    DeploymentSpec {
        name: name.to_string(),
        namespace: namespace.to_string(),
        replicas,
        selector_labels: selector_labels(name),
        container_name: container_name.to_string(),
        image,
        container_port,
    }
}

/// Service selecting `deployment`'s pods, forwarding `port` to the
/// deployment's container port.
pub fn build_service_spec(deployment: &DeploymentSpec, name: &str, port: u16) -> ServiceSpec {
    ServiceSpec {
        name: name.to_string(),
        namespace: deployment.namespace.clone(),
        selector_labels: deployment.selector_labels.clone(),
        port,
        target_port: deployment.container_port,
    }
}

// ── Validate ───────────────────────────────────────────────────────

pub fn validate_deployment_spec(spec: &DeploymentSpec) -> Result<()> {
    validate_namespace(&spec.namespace)?;
    validate_deployment_name(&spec.name)?;
    validate_container_name(&spec.container_name)?;
    validate_replicas(spec.replicas)?;
    validate_port("container port", u32::from(spec.container_port))?;
    validate_image(&spec.image)?;
    validate_labels(&spec.selector_labels)
}

pub fn validate_service_spec(spec: &ServiceSpec) -> Result<()> {
    validate_namespace(&spec.namespace)?;
    validate_service_name(&spec.name)?;
    validate_port("service port", u32::from(spec.port))?;
    validate_port("target port", u32::from(spec.target_port))?;
    validate_labels(&spec.selector_labels)
}

/// The service must select exactly the deployment's pods, in the same
/// namespace, on the port the container listens on.
pub fn check_consistency(deployment: &DeploymentSpec, service: &ServiceSpec) -> Result<()> {
    if deployment.namespace != service.namespace {
        return Err(Error::validation(
            "service namespace",
            &service.namespace,
            format!("must match deployment namespace {}", deployment.namespace),
        ));
    }
    if deployment.selector_labels != service.selector_labels {
        return Err(Error::validation(
            "service selector",
            &format!("{:?}", service.selector_labels),
            "must equal the deployment's pod labels",
        ));
    }
    if service.target_port != deployment.container_port {
        return Err(Error::validation(
            "target port",
            &service.target_port.to_string(),
            format!("must equal container port {}", deployment.container_port),
        ));
    }
    Ok(())
}

fn validate_image(image: &ImageReference) -> Result<()> {
    if image.repository_uri.trim().is_empty() {
        return Err(Error::validation(
            "repository uri",
            &image.repository_uri,
            "must not be empty",
        ));
    }
    validate_tag(&image.tag)
}

fn validate_labels(labels: &Labels) -> Result<()> {
    if labels.is_empty() {
        return Err(Error::validation("selector", "{}", "must not be empty"));
    }
    labels.values().try_for_each(|v| validate_label_value(v))
}

// ── Plan ───────────────────────────────────────────────────────────

impl DeployRequest {
    /// Validate the raw inputs, build both specs, and validate the result.
    pub fn plan(&self) -> Result<DeployPlan> {
        validate_namespace(&self.namespace)?;
        validate_deployment_name(&self.deployment_name)?;
        validate_service_name(&self.service_name)?;
        validate_replicas(self.replicas)?;
        let container_port = validate_port("container port", self.container_port)?;
        let service_port = match self.service_port {
            Some(port) => validate_port("service port", port)?,
            None => container_port,
        };
        validate_image(&self.image)?;

        if self.image.is_mutable_tag() {
            warn!(
                image = %self.image,
                "mutable tag; redeploys may run a different image"
            );
        }

        let container_name = self
            .container_name
            .as_deref()
            .unwrap_or(&self.deployment_name);
        let deployment = build_deployment_spec(
            &self.namespace,
            &self.deployment_name,
            container_name,
            self.image.clone(),
            self.replicas,
            container_port,
        );
        let service = build_service_spec(&deployment, &self.service_name, service_port);

        validate_deployment_spec(&deployment)?;
        validate_service_spec(&service)?;
        check_consistency(&deployment, &service)?;

        Ok(DeployPlan {
            deployment,
            service,
        })
    }
}
