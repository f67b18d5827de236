//! Run report: what each step did, printed as text or JSON.

use clap::ValueEnum;
use serde::Serialize;

use berth_core::{Error, ErrorKind, RepositoryIdentity, Step};
use berth_deployer::{DeployResult, StepOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Process exit status for a failure of `kind`.
pub fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Validation => 2,
        ErrorKind::Auth => 3,
        ErrorKind::NotFound => 4,
        ErrorKind::Conflict => 5,
        ErrorKind::Transient => 6,
        ErrorKind::PartialDeployment => 7,
        ErrorKind::Cancelled => 130,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The repository exists (freshly created or reused).
    Ready,
    Created,
    Unchanged,
    Failed,
    /// Not attempted because an earlier step failed.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: Step,
    /// `repository my-app`, `deployment default/my-app-dep`, ...
    pub target: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub steps: Vec<StepReport>,
    /// Overall outcome; absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorSummary {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for ErrorSummary {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl StepReport {
    pub fn repository_ready(repo: &RepositoryIdentity) -> Self {
        Self {
            step: Step::Repository,
            target: format!("repository {}", repo.name),
            status: Status::Ready,
            detail: Some(repo.uri.clone()),
            error_kind: None,
        }
    }

    pub fn failed(step: Step, target: String, err: &Error) -> Self {
        Self {
            step,
            target,
            status: Status::Failed,
            detail: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }

    pub fn skipped(step: Step, target: String) -> Self {
        Self {
            step,
            target,
            status: Status::Skipped,
            detail: None,
            error_kind: None,
        }
    }

    fn from_outcome(step: Step, target: String, outcome: &StepOutcome) -> Self {
        match outcome {
            StepOutcome::Created => Self::plain(step, target, Status::Created),
            StepOutcome::Unchanged => Self::plain(step, target, Status::Unchanged),
            StepOutcome::Failed(err) => Self::failed(step, target, err),
        }
    }

    fn plain(step: Step, target: String, status: Status) -> Self {
        Self {
            step,
            target,
            status,
            detail: None,
            error_kind: None,
        }
    }
}

impl RunReport {
    pub fn new(steps: Vec<StepReport>) -> Self {
        Self {
            image: None,
            steps,
            error: None,
        }
    }

    /// Append the deployment and service outcomes and set the overall
    /// error from them.
    pub fn with_deploy(mut self, result: &DeployResult) -> Self {
        self.image = Some(result.plan.deployment.image.to_string());
        self.steps.push(StepReport::from_outcome(
            Step::Deployment,
            format!("deployment {}", result.plan.deployment.key()),
            &result.deployment,
        ));
        self.steps.push(StepReport::from_outcome(
            Step::Service,
            format!("service {}", result.plan.service.key()),
            &result.service,
        ));
        self.error = result
            .clone()
            .into_result()
            .err()
            .map(|e| ErrorSummary::from(&e));
        self
    }

    pub fn with_error(mut self, err: &Error) -> Self {
        self.error = Some(err.into());
        self
    }

    /// Exit status for the whole run. A conflicting step wins over the
    /// overall kind: a deploy whose deployment conflicts while its service
    /// is created exits 5, not 7.
    pub fn exit_code(&self) -> u8 {
        let conflict = self
            .steps
            .iter()
            .any(|s| s.error_kind == Some(ErrorKind::Conflict));
        match &self.error {
            None => 0,
            Some(_) if conflict => exit_code(ErrorKind::Conflict),
            Some(e) => exit_code(e.kind),
        }
    }

    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        Ok(match format {
            OutputFormat::Json => serde_json::to_string_pretty(self)?,
            OutputFormat::Text => self.to_text(),
        })
    }

    fn to_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(image) = &self.image {
            lines.push(format!("image: {image}"));
        }
        for step in &self.steps {
            let mut line = format!(
                "{:<10} {:<40} {}",
                step.step.as_str(),
                step.target,
                step.status.label()
            );
            if let Some(detail) = &step.detail {
                line.push_str(&format!("  {detail}"));
            }
            lines.push(line);
        }
        if let Some(err) = &self.error {
            lines.push(format!("error ({}): {}", err.kind, err.message));
        }
        lines.join("\n")
    }
}

impl Status {
    fn label(&self) -> &'static str {
        match self {
            Status::Ready => "ready",
            Status::Created => "created",
            Status::Unchanged => "unchanged",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_core::ImageReference;
    use berth_deployer::DeployRequest;

    fn result(deployment: StepOutcome, service: StepOutcome) -> DeployResult {
        let plan = DeployRequest {
            namespace: "default".to_string(),
            deployment_name: "my-app-dep".to_string(),
            service_name: "my-app-svc".to_string(),
            container_name: None,
            image: ImageReference::new("registry.example/my-app", "v1"),
            replicas: 1,
            container_port: 5000,
            service_port: None,
        }
        .plan()
        .unwrap();
        DeployResult {
            plan,
            deployment,
            service,
        }
    }

    fn repo() -> RepositoryIdentity {
        RepositoryIdentity {
            name: "my-app".to_string(),
            uri: "registry.example/my-app".to_string(),
        }
    }

    #[test]
    fn exit_codes_are_distinct() {
        let kinds = [
            ErrorKind::Validation,
            ErrorKind::Auth,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::Transient,
            ErrorKind::PartialDeployment,
            ErrorKind::Cancelled,
        ];
        let mut codes: Vec<u8> = kinds.iter().map(|k| exit_code(*k)).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn noop_run_exits_zero() {
        let report = RunReport::new(vec![StepReport::repository_ready(&repo())])
            .with_deploy(&result(StepOutcome::Unchanged, StepOutcome::Unchanged));
        assert_eq!(report.exit_code(), 0);

        let text = report.render(OutputFormat::Text).unwrap();
        assert!(text.contains("image: registry.example/my-app:v1"));
        assert!(text.contains("unchanged"));
        assert!(!text.contains("error"));
    }

    #[test]
    fn partial_run_exits_with_partial_code() {
        let err = Error::Transient {
            step: Step::Service,
            target: "service default/my-app-svc".to_string(),
            message: "timed out after 30s".to_string(),
        };
        let report = RunReport::new(vec![StepReport::repository_ready(&repo())])
            .with_deploy(&result(StepOutcome::Created, StepOutcome::Failed(err)));
        assert_eq!(report.exit_code(), 7);

        let json: serde_json::Value =
            serde_json::from_str(&report.render(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["steps"][1]["status"], "created");
        assert_eq!(json["steps"][2]["status"], "failed");
        assert_eq!(json["steps"][2]["error_kind"], "transient");
        assert_eq!(json["error"]["kind"], "partial_deployment");
    }

    #[test]
    fn conflict_beside_created_step_exits_with_conflict_code() {
        let err = Error::Conflict {
            step: Step::Deployment,
            target: "deployment default/my-app-dep".to_string(),
            fields: vec!["replicas".to_string()],
        };
        let report = RunReport::new(vec![StepReport::repository_ready(&repo())])
            .with_deploy(&result(StepOutcome::Failed(err), StepOutcome::Created));
        assert_eq!(report.exit_code(), 5);

        let json: serde_json::Value =
            serde_json::from_str(&report.render(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["steps"][1]["error_kind"], "conflict");
        assert_eq!(json["steps"][2]["status"], "created");
        assert_eq!(json["error"]["kind"], "partial_deployment");
    }

    #[test]
    fn repository_failure_skips_the_rest() {
        let err = Error::Auth {
            step: Step::Repository,
            target: "repository my-app".to_string(),
            message: "expired token".to_string(),
        };
        let report = RunReport::new(vec![
            StepReport::failed(Step::Repository, "repository my-app".to_string(), &err),
            StepReport::skipped(Step::Deployment, "deployment default/my-app-dep".to_string()),
            StepReport::skipped(Step::Service, "service default/my-app-svc".to_string()),
        ])
        .with_error(&err);
        assert_eq!(report.exit_code(), 3);
        assert!(report.render(OutputFormat::Text).unwrap().contains("skipped"));
    }
}
