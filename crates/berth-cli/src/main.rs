//! berth — provision an image repository and deploy a workload from it.
//!
//! # Usage
//!
//! ```text
//! berth deploy --repository my-app --tag v1 \
//!     --deployment my-app-dep --service my-app-svc --container-port 5000
//! berth ensure-repo --repository my-app
//! berth render --repository-uri registry.example/my-app --tag v1 \
//!     --deployment my-app-dep --service my-app-svc --container-port 5000
//! ```
//!
//! Exit status is 0 on success (including a run that found everything
//! already in place) and one code per failure kind otherwise; see
//! [`report::exit_code`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod backend;
mod commands;
mod report;
mod retry;

use commands::{ClientArgs, WorkloadArgs};
use report::OutputFormat;

#[derive(Parser)]
#[command(
    name = "berth",
    about = "Berth — register an image repository and deploy from it",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to berth.toml (default: ./berth.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Result format on stdout.
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ensure the repository exists, then deploy the image and expose it.
    Deploy {
        /// Registry repository to create or reuse.
        #[arg(long)]
        repository: String,
        #[command(flatten)]
        workload: WorkloadArgs,
        #[command(flatten)]
        client: ClientArgs,
    },
    /// Ensure the repository exists and print its URI.
    EnsureRepo {
        #[arg(long)]
        repository: String,
        #[command(flatten)]
        client: ClientArgs,
    },
    /// Build and validate the deployment and service, print them as JSON,
    /// and exit without contacting anything.
    Render {
        /// Repository URI the image lives under.
        #[arg(long)]
        repository_uri: String,
        #[command(flatten)]
        workload: WorkloadArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let config = commands::load_config(cli.config.as_deref())?;

    // Ctrl-C stops waiting on in-flight calls; objects already sent stay.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, abandoning remaining steps");
            on_interrupt.cancel();
        }
    });

    let code = match cli.command {
        Command::Deploy {
            repository,
            workload,
            client,
        } => {
            commands::deploy::run(&repository, &workload, &client, &config, cli.output, &cancel)
                .await?
        }
        Command::EnsureRepo { repository, client } => {
            commands::ensure_repo::run(&repository, &client, &config, cli.output, &cancel).await?
        }
        Command::Render {
            repository_uri,
            workload,
        } => commands::render::run(&repository_uri, &workload, &config)?,
    };

    Ok(ExitCode::from(code))
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,berth=debug"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn deploy_parses_full_flag_set() {
        let cli = Cli::try_parse_from([
            "berth",
            "--output",
            "json",
            "deploy",
            "--repository",
            "my-app",
            "--tag",
            "v1",
            "--namespace",
            "staging",
            "--deployment",
            "my-app-dep",
            "--service",
            "my-app-svc",
            "--replicas",
            "3",
            "--container-port",
            "5000",
            "--service-port",
            "80",
            "--timeout",
            "10s",
            "--retry-attempts",
            "5",
            "--registry-backend",
            "memory",
            "--orchestrator-backend",
            "memory",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        let Command::Deploy {
            repository,
            workload,
            client,
        } = cli.command
        else {
            panic!("expected deploy");
        };
        assert_eq!(repository, "my-app");
        assert_eq!(workload.replicas, 3);
        assert_eq!(workload.service_port, Some(80));
        assert_eq!(workload.namespace.as_deref(), Some("staging"));
        assert_eq!(client.timeout, Some(std::time::Duration::from_secs(10)));
        assert_eq!(client.retry_attempts, Some(5));
    }

    #[test]
    fn malformed_timeout_rejected() {
        let res = Cli::try_parse_from([
            "berth",
            "ensure-repo",
            "--repository",
            "my-app",
            "--timeout",
            "soon",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn negative_replicas_reach_validation() {
        let cli = Cli::try_parse_from([
            "berth",
            "render",
            "--repository-uri",
            "registry.example/my-app",
            "--tag",
            "v1",
            "--deployment",
            "d",
            "--service",
            "s",
            "--container-port",
            "5000",
            "--replicas",
            "-1",
        ])
        .unwrap();
        let Command::Render { workload, .. } = cli.command else {
            panic!("expected render");
        };
        assert_eq!(workload.replicas, -1);
    }
}
