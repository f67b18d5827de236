pub mod deploy;
pub mod ensure_repo;
pub mod render;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, ValueEnum};

use berth_core::config::parse_duration;
use berth_core::{BerthConfig, ImageReference};
use berth_deployer::DeployRequest;

use crate::backend::{OrchestratorBackend, RegistryBackend};
use crate::report::{OutputFormat, RunReport};
use crate::retry::RetryPolicy;

const CONFIG_FILE: &str = "berth.toml";
const DEFAULT_NAMESPACE: &str = "default";

/// What to run and how to expose it.
#[derive(Args, Debug, Clone)]
pub struct WorkloadArgs {
    /// Image tag. `latest` is accepted but discouraged.
    #[arg(long)]
    pub tag: String,

    /// Target namespace (must already exist).
    #[arg(short, long)]
    pub namespace: Option<String>,

    #[arg(long)]
    pub deployment: String,

    #[arg(long)]
    pub service: String,

    /// Container name (default: the deployment name).
    #[arg(long)]
    pub container_name: Option<String>,

    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub replicas: i32,

    #[arg(long)]
    pub container_port: u32,

    /// Port the service listens on (default: the container port).
    #[arg(long)]
    pub service_port: Option<u32>,
}

/// How to reach the registry and the orchestrator.
#[derive(Args, Debug, Clone, Default)]
pub struct ClientArgs {
    /// Bound on each remote call, e.g. "30s".
    #[arg(long, value_parser = duration_arg)]
    pub timeout: Option<Duration>,

    /// Attempts per step for transient failures, including the first.
    #[arg(long)]
    pub retry_attempts: Option<u32>,

    #[arg(long, value_parser = duration_arg)]
    pub retry_base_backoff: Option<Duration>,

    #[arg(long, value_parser = duration_arg)]
    pub retry_max_backoff: Option<Duration>,

    #[arg(long, value_enum)]
    pub registry_backend: Option<RegistryBackend>,

    #[arg(long, value_enum)]
    pub orchestrator_backend: Option<OrchestratorBackend>,
}

/// Flags layered over berth.toml layered over built-in defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub registry_backend: RegistryBackend,
    pub orchestrator_backend: OrchestratorBackend,
}

impl Settings {
    pub fn resolve(args: &ClientArgs, config: &BerthConfig) -> anyhow::Result<Self> {
        let timeout = match args.timeout {
            Some(t) => t,
            None => config.request_timeout()?,
        };
        let base_backoff = match args.retry_base_backoff {
            Some(b) => b,
            None => config.base_backoff()?,
        };
        let max_backoff = match args.retry_max_backoff {
            Some(m) => m,
            None => config.max_backoff()?,
        };
        let retry = RetryPolicy {
            attempts: args
                .retry_attempts
                .unwrap_or_else(|| config.retry_attempts())
                .max(1),
            base_backoff,
            max_backoff: max_backoff.max(base_backoff),
        };

        let registry_backend = match args.registry_backend {
            Some(b) => b,
            None => config
                .registry_backend()
                .map(|s| from_config::<RegistryBackend>("registry_backend", s))
                .transpose()?
                .unwrap_or_default(),
        };
        let orchestrator_backend = match args.orchestrator_backend {
            Some(b) => b,
            None => config
                .orchestrator_backend()
                .map(|s| from_config::<OrchestratorBackend>("orchestrator_backend", s))
                .transpose()?
                .unwrap_or_default(),
        };

        Ok(Self {
            timeout,
            retry,
            registry_backend,
            orchestrator_backend,
        })
    }
}

impl WorkloadArgs {
    pub fn namespace<'a>(&'a self, config: &'a BerthConfig) -> &'a str {
        self.namespace
            .as_deref()
            .or(config.default_namespace())
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn request(&self, repository_uri: &str, config: &BerthConfig) -> DeployRequest {
        DeployRequest {
            namespace: self.namespace(config).to_string(),
            deployment_name: self.deployment.clone(),
            service_name: self.service.clone(),
            container_name: self.container_name.clone(),
            image: ImageReference::new(repository_uri, self.tag.clone()),
            replicas: self.replicas,
            container_port: self.container_port,
            service_port: self.service_port,
        }
    }
}

/// Load `path`, or `./berth.toml` when it exists, or nothing.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<BerthConfig> {
    match path {
        Some(path) => BerthConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None if Path::new(CONFIG_FILE).exists() => {
            BerthConfig::from_file(Path::new(CONFIG_FILE))
                .with_context(|| format!("loading {CONFIG_FILE}"))
        }
        None => Ok(BerthConfig::default()),
    }
}

/// Print `report` on stdout and return the exit status it implies.
pub fn emit(report: &RunReport, output: OutputFormat) -> anyhow::Result<u8> {
    println!("{}", report.render(output)?);
    Ok(report.exit_code())
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s)
        .ok_or_else(|| format!("invalid duration {s:?} (expected e.g. 30s, 500ms, 2m, 1h)"))
}

fn from_config<T: ValueEnum>(key: &str, value: &str) -> anyhow::Result<T> {
    T::from_str(value, true)
        .map_err(|e| anyhow::anyhow!("invalid {key} {value:?} in config: {e}"))
}
