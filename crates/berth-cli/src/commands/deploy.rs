//! `berth deploy`: ensure the repository, then submit deployment and service.

use tokio_util::sync::CancellationToken;
use tracing::info;

use berth_core::validate::validate_repository_name;
use berth_core::{BerthConfig, ImageReference, Step};
use berth_deployer::{DeployPlan, WorkloadDeployer};
use berth_registry::RegistryProvisioner;

use super::{ClientArgs, Settings, WorkloadArgs, emit};
use crate::backend;
use crate::report::{OutputFormat, RunReport, StepReport};

pub async fn run(
    repository: &str,
    workload: &WorkloadArgs,
    client: &ClientArgs,
    config: &BerthConfig,
    output: OutputFormat,
    cancel: &CancellationToken,
) -> anyhow::Result<u8> {
    let settings = Settings::resolve(client, config)?;

    let mut plan = match preflight(repository, workload, config) {
        Ok(plan) => plan,
        Err(err) => return emit(&RunReport::new(Vec::new()).with_error(&err), output),
    };

    let registry = backend::registry_client(settings.registry_backend).await?;
    let orchestrator =
        backend::orchestrator_client(settings.orchestrator_backend, &plan.deployment.namespace)
            .await?;

    // ── Repository ─────────────────────────────────────────────────

    let provisioner = RegistryProvisioner::new(registry, settings.timeout);
    let repo_target = format!("repository {repository}");
    let ensured = settings
        .retry
        .run(Step::Repository, &repo_target, cancel, || {
            provisioner.ensure_repository_cancellable(repository, cancel)
        })
        .await;
    let repo = match ensured {
        Ok(repo) => repo,
        Err(err) => {
            let report = RunReport::new(vec![
                StepReport::failed(Step::Repository, repo_target, &err),
                StepReport::skipped(
                    Step::Deployment,
                    format!("deployment {}", plan.deployment.key()),
                ),
                StepReport::skipped(Step::Service, format!("service {}", plan.service.key())),
            ])
            .with_error(&err);
            return emit(&report, output);
        }
    };

    plan.deployment.image = ImageReference::in_repository(&repo, workload.tag.clone());
    info!(image = %plan.deployment.image, "image resolved");

    // ── Deployment + service ───────────────────────────────────────

    let deployer = WorkloadDeployer::new(orchestrator, settings.timeout);
    let result = settings.retry.submit(&deployer, plan, cancel).await;

    let report = RunReport::new(vec![StepReport::repository_ready(&repo)]).with_deploy(&result);
    emit(&report, output)
}

/// Check every input before any remote call. The image is validated under
/// the bare repository name; the real URI replaces it once the registry
/// has answered.
fn preflight(
    repository: &str,
    workload: &WorkloadArgs,
    config: &BerthConfig,
) -> berth_core::Result<DeployPlan> {
    validate_repository_name(repository)?;
    workload.request(repository, config).plan()
}
