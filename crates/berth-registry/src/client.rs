//! The registry service as seen by the provisioner.

use async_trait::async_trait;
use thiserror::Error;

/// Errors a registry backend reports. `AlreadyExists` and `NotFound` must
/// be distinguishable so the provisioner can take the reuse path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("repository already exists")]
    AlreadyExists,

    #[error("repository not found")]
    NotFound,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The registry refused the request as malformed.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("{0}")]
    Transient(String),
}

/// Create and describe repositories. Implementations hold already
/// authenticated sessions; they never retry on their own beyond what the
/// underlying SDK does.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Create `name` and return its pull URI.
    async fn create_repository(&self, name: &str) -> Result<String, RegistryError>;

    /// Return the pull URI of an existing repository.
    async fn describe_repository(&self, name: &str) -> Result<String, RegistryError>;
}
