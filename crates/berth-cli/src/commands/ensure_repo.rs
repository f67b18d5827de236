//! `berth ensure-repo`: create or reuse a repository and print its URI.

use tokio_util::sync::CancellationToken;

use berth_core::{BerthConfig, Step};
use berth_registry::RegistryProvisioner;

use super::{ClientArgs, Settings, emit};
use crate::backend;
use crate::report::{OutputFormat, RunReport, StepReport};

pub async fn run(
    repository: &str,
    client: &ClientArgs,
    config: &BerthConfig,
    output: OutputFormat,
    cancel: &CancellationToken,
) -> anyhow::Result<u8> {
    let settings = Settings::resolve(client, config)?;
    let registry = backend::registry_client(settings.registry_backend).await?;
    let provisioner = RegistryProvisioner::new(registry, settings.timeout);

    let target = format!("repository {repository}");
    let ensured = settings
        .retry
        .run(Step::Repository, &target, cancel, || {
            provisioner.ensure_repository_cancellable(repository, cancel)
        })
        .await;

    let report = match ensured {
        Ok(repo) => RunReport::new(vec![StepReport::repository_ready(&repo)]),
        Err(err) => RunReport::new(vec![StepReport::failed(Step::Repository, target, &err)])
            .with_error(&err),
    };
    emit(&report, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RegistryBackend;

    fn memory() -> ClientArgs {
        ClientArgs {
            registry_backend: Some(RegistryBackend::Memory),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn memory_registry_yields_uri() {
        let code = run(
            "team/my-app",
            &memory(),
            &BerthConfig::default(),
            OutputFormat::Text,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn too_short_name_is_validation_error() {
        let code = run(
            "a",
            &memory(),
            &BerthConfig::default(),
            OutputFormat::Json,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(code, 2);
    }
}
