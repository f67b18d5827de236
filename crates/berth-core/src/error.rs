//! Error taxonomy shared by the registry provisioner, the workload deployer,
//! and the CLI.
//!
//! Every failure carries the step it happened in and the identifiers needed
//! to inspect the remote side by hand (repository name, `namespace/name`).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Berth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The step of the provision/deploy workflow an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Repository,
    Deployment,
    Service,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Repository => "repository",
            Step::Deployment => "deployment",
            Step::Service => "service",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of an [`Error`], used by callers to pick a
/// retry policy and by the CLI to pick an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input, rejected before any network call (or by the remote API).
    Validation,
    /// Authentication or authorization denied. Never retried.
    Auth,
    /// A namespace or described repository is missing.
    NotFound,
    /// A name is already bound to a different spec.
    Conflict,
    /// Network, timeout, throttling, or server-side error.
    Transient,
    /// One of deployment/service succeeded and the other did not.
    PartialDeployment,
    /// The caller aborted the workflow.
    Cancelled,
}

impl ErrorKind {
    /// Whether a caller may retry the same request after a backoff.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transient => "transient",
            ErrorKind::PartialDeployment => "partial_deployment",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failure of one workflow step.
///
/// `target` fields are human-readable object identifiers such as
/// `repository my-app` or `deployment default/my-app-dep`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid {field} {value:?}: {reason}")]
    Validation {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{step} step denied for {target}: {message}")]
    Auth {
        step: Step,
        target: String,
        message: String,
    },

    #[error("{step} step: {target} not found: {message}")]
    NotFound {
        step: Step,
        target: String,
        message: String,
    },

    #[error("{step} step: {target} already exists with a different spec (differs in: {})", .fields.join(", "))]
    Conflict {
        step: Step,
        target: String,
        fields: Vec<String>,
    },

    #[error("{step} step failed for {target}: {message}")]
    Transient {
        step: Step,
        target: String,
        message: String,
    },

    #[error(
        "partial deployment in namespace {namespace}: deployment {deployment} {deployment_status}, \
         service {service} {service_status}: {cause}"
    )]
    PartialDeployment {
        namespace: String,
        deployment: String,
        service: String,
        deployment_status: String,
        service_status: String,
        cause: Box<Error>,
    },

    #[error("{step} step cancelled for {target}")]
    Cancelled { step: Step, target: String },
}

impl Error {
    /// Shorthand for a validation failure.
    pub fn validation(field: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Error::Validation {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Auth { .. } => ErrorKind::Auth,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::Transient { .. } => ErrorKind::Transient,
            Error::PartialDeployment { .. } => ErrorKind::PartialDeployment,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// The step that failed, if the error is tied to one.
    pub fn step(&self) -> Option<Step> {
        match self {
            Error::Auth { step, .. }
            | Error::NotFound { step, .. }
            | Error::Conflict { step, .. }
            | Error::Transient { step, .. }
            | Error::Cancelled { step, .. } => Some(*step),
            Error::PartialDeployment { cause, .. } => cause.step(),
            Error::Validation { .. } => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(ErrorKind::Transient.is_retryable());
        for kind in [
            ErrorKind::Validation,
            ErrorKind::Auth,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::PartialDeployment,
            ErrorKind::Cancelled,
        ] {
            assert!(!kind.is_retryable(), "{kind} must not be retryable");
        }
    }

    #[test]
    fn conflict_message_names_fields_and_target() {
        let err = Error::Conflict {
            step: Step::Deployment,
            target: "deployment default/api".to_string(),
            fields: vec!["replicas".to_string(), "image".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("deployment default/api"));
        assert!(msg.contains("replicas, image"));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.step(), Some(Step::Deployment));
    }

    #[test]
    fn partial_deployment_reports_failed_step_of_cause() {
        let cause = Error::Transient {
            step: Step::Service,
            target: "service default/api-svc".to_string(),
            message: "connection reset".to_string(),
        };
        let err = Error::PartialDeployment {
            namespace: "default".to_string(),
            deployment: "api".to_string(),
            service: "api-svc".to_string(),
            deployment_status: "created".to_string(),
            service_status: "failed".to_string(),
            cause: Box::new(cause),
        };
        assert_eq!(err.kind(), ErrorKind::PartialDeployment);
        assert_eq!(err.step(), Some(Step::Service));
        assert!(err.to_string().contains("deployment api created"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PartialDeployment).unwrap();
        assert_eq!(json, "\"partial_deployment\"");
    }
}
