//! Amazon ECR adapter.
//!
//! Credentials and region come from the ambient AWS configuration chain
//! (environment, profile, instance metadata). The SDK's own retry policy
//! applies underneath; the provisioner adds none.

use async_trait::async_trait;
use aws_sdk_ecr::Client;
use aws_sdk_ecr::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use tracing::debug;

use crate::client::{RegistryClient, RegistryError};

/// Service error codes that mean the caller's identity was refused.
const AUTH_CODES: &[&str] = &[
    "AccessDeniedException",
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "ExpiredTokenException",
    "MissingAuthenticationTokenException",
];

const TRANSIENT_CODES: &[&str] = &[
    "ThrottlingException",
    "ServerException",
    "ServiceUnavailableException",
    "RequestTimeout",
];

pub struct EcrRegistry {
    client: Client,
}

impl EcrRegistry {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS configuration.
    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl RegistryClient for EcrRegistry {
    async fn create_repository(&self, name: &str) -> Result<String, RegistryError> {
        let output = self
            .client
            .create_repository()
            .repository_name(name)
            .send()
            .await
            .map_err(classify)?;

        debug!(repository = %name, "ecr create_repository accepted");
        output
            .repository()
            .and_then(|r| r.repository_uri())
            .map(str::to_string)
            .ok_or_else(|| {
                RegistryError::Transient("create response carried no repository URI".to_string())
            })
    }

    async fn describe_repository(&self, name: &str) -> Result<String, RegistryError> {
        let output = self
            .client
            .describe_repositories()
            .repository_names(name)
            .send()
            .await
            .map_err(classify)?;

        output
            .repositories()
            .iter()
            .find(|r| r.repository_name() == Some(name))
            .and_then(|r| r.repository_uri())
            .map(str::to_string)
            .ok_or(RegistryError::NotFound)
    }
}

fn classify<E, R>(err: SdkError<E, R>) -> RegistryError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.as_service_error().and_then(|e| e.code()).map(str::to_string);
    let message = DisplayErrorContext(&err).to_string();

    match code.as_deref() {
        Some("RepositoryAlreadyExistsException") => RegistryError::AlreadyExists,
        Some("RepositoryNotFoundException") => RegistryError::NotFound,
        Some(c) if AUTH_CODES.contains(&c) => RegistryError::Unauthorized(message),
        Some(c) if TRANSIENT_CODES.contains(&c) => RegistryError::Transient(message),
        Some(_) => RegistryError::Rejected(message),
        None => match err {
            SdkError::ConstructionFailure(_) => RegistryError::Rejected(message),
            // Timeouts, dispatch failures, unparseable responses.
            _ => RegistryError::Transient(message),
        },
    }
}
