//! WorkloadDeployer — submit a planned deployment and service.
//!
//! The two creates are independent and run concurrently. Both outcomes are
//! always collected: a deployment that went through next to a service that
//! did not is reported as exactly that, never folded into one bit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use berth_core::{
    DeploymentSpec, Error, ErrorKind, ImageReference, Result, ServiceSpec, Step, bounded,
};

use crate::builder::DeployPlan;
use crate::client::{OrchestratorClient, OrchestratorError};

/// Inputs to [`WorkloadDeployer::deploy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    /// Must already exist in the cluster.
    pub namespace: String,
    pub deployment_name: String,
    pub service_name: String,
    /// Defaults to the deployment name.
    pub container_name: Option<String>,
    pub image: ImageReference,
    pub replicas: i32,
    pub container_port: u32,
    /// Defaults to the container port.
    pub service_port: Option<u32>,
}

/// What happened to one object.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The orchestrator accepted a new object.
    Created,
    /// An identical object was already there; nothing was sent beyond the
    /// rejected create.
    Unchanged,
    Failed(Error),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, StepOutcome::Failed(_))
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            StepOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Created => "created",
            StepOutcome::Unchanged => "unchanged",
            StepOutcome::Failed(_) => "failed",
        }
    }

    /// Fold an earlier attempt's outcome into a retry's. Once a step has
    /// succeeded the object exists, so the earlier success stands no matter
    /// what the retry saw. Only a failed step takes the retry's outcome.
    pub fn after(self, earlier: &StepOutcome) -> StepOutcome {
        match earlier {
            StepOutcome::Failed(_) => self,
            success => success.clone(),
        }
    }
}

/// Per-object outcome of a deploy.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployResult {
    pub plan: DeployPlan,
    pub deployment: StepOutcome,
    pub service: StepOutcome,
}

impl DeployResult {
    pub fn is_success(&self) -> bool {
        self.deployment.is_success() && self.service.is_success()
    }

    /// Exactly one of the two objects failed.
    pub fn is_partial(&self) -> bool {
        self.deployment.is_success() != self.service.is_success()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Error> {
        self.deployment.error().into_iter().chain(self.service.error())
    }

    /// Whether re-submitting could help: something failed and every
    /// failure is transient.
    pub fn is_retryable(&self) -> bool {
        !self.is_success() && self.failures().all(Error::is_retryable)
    }

    /// Collapse into a single `Result` for callers that only need one
    /// error. A one-sided failure becomes [`Error::PartialDeployment`];
    /// when both fail the deployment's error is returned.
    pub fn into_result(self) -> Result<DeployResult> {
        if self.is_success() {
            return Ok(self);
        }
        let cause = match (&self.deployment, &self.service) {
            (StepOutcome::Failed(err), StepOutcome::Failed(_)) => return Err(err.clone()),
            (StepOutcome::Failed(err), _) | (_, StepOutcome::Failed(err)) => err.clone(),
            _ => unreachable!("is_success() covers the no-failure case"),
        };
        Err(Error::PartialDeployment {
            namespace: self.plan.deployment.namespace.clone(),
            deployment: self.plan.deployment.name.clone(),
            service: self.plan.service.name.clone(),
            deployment_status: self.deployment.label().to_string(),
            service_status: self.service.label().to_string(),
            cause: Box::new(cause),
        })
    }
}

/// Submits deployments and services through an injected
/// [`OrchestratorClient`].
pub struct WorkloadDeployer {
    client: Arc<dyn OrchestratorClient>,
    /// Bound on each orchestrator call.
    timeout: Duration,
}

impl WorkloadDeployer {
    pub fn new(client: Arc<dyn OrchestratorClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Plan and submit. Invalid input fails before any call is made; after
    /// that the result carries one outcome per object.
    pub async fn deploy(&self, request: &DeployRequest) -> Result<DeployResult> {
        self.deploy_cancellable(request, &CancellationToken::new())
            .await
    }

    pub async fn deploy_cancellable(
        &self,
        request: &DeployRequest,
        cancel: &CancellationToken,
    ) -> Result<DeployResult> {
        let plan = request.plan()?;
        Ok(self.submit(plan, cancel).await)
    }

    /// Submit an already validated plan. Safe to call again after a
    /// partial failure: objects that made it are found unchanged.
    pub async fn submit(&self, plan: DeployPlan, cancel: &CancellationToken) -> DeployResult {
        let (deployment, service) = tokio::join!(
            self.submit_deployment(&plan.deployment, cancel),
            self.submit_service(&plan.service, cancel),
        );

        info!(
            namespace = %plan.deployment.namespace,
            deployment = %plan.deployment.name,
            deployment_outcome = deployment.label(),
            service = %plan.service.name,
            service_outcome = service.label(),
            "deploy submitted"
        );

        let conflicted = deployment.error().map(Error::kind) == Some(ErrorKind::Conflict);
        if conflicted && service == StepOutcome::Created {
            warn!(
                service = %plan.service.key(),
                deployment = %plan.deployment.key(),
                "service created while the deployment conflicts; it selects the live deployment's pods"
            );
        }

        DeployResult {
            plan,
            deployment,
            service,
        }
    }

    async fn submit_deployment(
        &self,
        spec: &DeploymentSpec,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        let target = format!("deployment {}", spec.key());
        self.submit_object(
            Step::Deployment,
            &target,
            cancel,
            self.client.create_deployment(spec),
            self.client.get_deployment(&spec.namespace, &spec.name),
            |live: &DeploymentSpec| spec.differing_fields(live),
        )
        .await
    }

    async fn submit_service(&self, spec: &ServiceSpec, cancel: &CancellationToken) -> StepOutcome {
        let target = format!("service {}", spec.key());
        self.submit_object(
            Step::Service,
            &target,
            cancel,
            self.client.create_service(spec),
            self.client.get_service(&spec.namespace, &spec.name),
            |live: &ServiceSpec| spec.differing_fields(live),
        )
        .await
    }

    /// Create; on a name clash read the live object and compare.
    ///
    /// `get` is only polled when `create` reports the name as taken.
    async fn submit_object<T, C, G, D>(
        &self,
        step: Step,
        target: &str,
        cancel: &CancellationToken,
        create: C,
        get: G,
        diff: D,
    ) -> StepOutcome
    where
        C: Future<Output = std::result::Result<(), OrchestratorError>>,
        G: Future<Output = std::result::Result<Option<T>, OrchestratorError>>,
        D: FnOnce(&T) -> Vec<String>,
    {
        let created = match bounded(self.timeout, cancel, create).await {
            Ok(res) => res,
            Err(interrupted) => return StepOutcome::Failed(interrupted.into_error(step, target)),
        };

        match created {
            Ok(()) => {
                info!(%target, "created");
                StepOutcome::Created
            }
            Err(OrchestratorError::AlreadyExists) => {
                debug!(%target, "name taken, comparing with live object");
                let live = match bounded(self.timeout, cancel, get).await {
                    Ok(Ok(Some(live))) => live,
                    Ok(Ok(None)) => {
                        return StepOutcome::Failed(Error::Transient {
                            step,
                            target: target.to_string(),
                            message: "reported as existing but could not be read back"
                                .to_string(),
                        });
                    }
                    Ok(Err(err)) => {
                        return StepOutcome::Failed(map_orchestrator_error(step, target, err));
                    }
                    Err(interrupted) => {
                        return StepOutcome::Failed(interrupted.into_error(step, target));
                    }
                };

                let fields = diff(&live);
                if fields.is_empty() {
                    info!(%target, "already present with identical spec");
                    StepOutcome::Unchanged
                } else {
                    warn!(%target, ?fields, "name bound to a different spec, leaving it untouched");
                    StepOutcome::Failed(Error::Conflict {
                        step,
                        target: target.to_string(),
                        fields,
                    })
                }
            }
            Err(err) => StepOutcome::Failed(map_orchestrator_error(step, target, err)),
        }
    }
}

fn map_orchestrator_error(step: Step, target: &str, err: OrchestratorError) -> Error {
    let target = target.to_string();
    match err {
        OrchestratorError::NamespaceNotFound(namespace) => Error::NotFound {
            step,
            target,
            message: format!("namespace {namespace} does not exist"),
        },
        OrchestratorError::Forbidden(message) => Error::Auth {
            step,
            target,
            message,
        },
        OrchestratorError::Rejected(reason) => Error::Validation {
            field: step.as_str(),
            value: target,
            reason,
        },
        OrchestratorError::AlreadyExists => Error::Transient {
            step,
            target,
            message: "read reported an unexpected already-exists".to_string(),
        },
        OrchestratorError::Transient(message) => Error::Transient {
            step,
            target,
            message,
        },
    }
}
