//! RegistryProvisioner — ensure a repository exists and return its URI.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use berth_core::validate::validate_repository_name;
use berth_core::{Error, RepositoryIdentity, Result, Step, bounded};

use crate::client::{RegistryClient, RegistryError};

/// Creates repositories idempotently through an injected [`RegistryClient`].
pub struct RegistryProvisioner {
    client: Arc<dyn RegistryClient>,
    /// Bound on each registry call.
    timeout: Duration,
}

impl RegistryProvisioner {
    pub fn new(client: Arc<dyn RegistryClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Ensure `name` exists and return its identity.
    ///
    /// Creation is attempted first; "already exists" falls through to a
    /// describe call and yields the same identity a fresh creation would.
    /// Invalid names fail before any call is made.
    pub async fn ensure_repository(&self, name: &str) -> Result<RepositoryIdentity> {
        self.ensure_repository_cancellable(name, &CancellationToken::new())
            .await
    }

    /// [`ensure_repository`](Self::ensure_repository), abandoned when
    /// `cancel` fires. A create already sent is not revoked.
    pub async fn ensure_repository_cancellable(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<RepositoryIdentity> {
        validate_repository_name(name)?;
        let target = format!("repository {name}");

        let created = bounded(self.timeout, cancel, self.client.create_repository(name))
            .await
            .map_err(|i| i.into_error(Step::Repository, &target))?;

        let uri = match created {
            Ok(uri) => {
                info!(repository = %name, %uri, "repository created");
                uri
            }
            Err(RegistryError::AlreadyExists) => {
                debug!(repository = %name, "repository exists, reusing");
                let described =
                    bounded(self.timeout, cancel, self.client.describe_repository(name))
                        .await
                        .map_err(|i| i.into_error(Step::Repository, &target))?;
                let uri = described.map_err(|e| map_registry_error(name, &target, e))?;
                info!(repository = %name, %uri, "repository reused");
                uri
            }
            Err(e) => return Err(map_registry_error(name, &target, e)),
        };

        if uri.is_empty() {
            return Err(Error::Transient {
                step: Step::Repository,
                target,
                message: "registry returned an empty repository URI".to_string(),
            });
        }

        Ok(RepositoryIdentity {
            name: name.to_string(),
            uri,
        })
    }
}

fn map_registry_error(name: &str, target: &str, err: RegistryError) -> Error {
    let target = target.to_string();
    match err {
        RegistryError::NotFound => Error::NotFound {
            step: Step::Repository,
            target,
            message: "reported as existing but could not be described".to_string(),
        },
        RegistryError::Unauthorized(message) => Error::Auth {
            step: Step::Repository,
            target,
            message,
        },
        RegistryError::Rejected(reason) => Error::validation("repository name", name, reason),
        RegistryError::AlreadyExists => Error::Transient {
            step: Step::Repository,
            target,
            message: "describe reported an unexpected already-exists".to_string(),
        },
        RegistryError::Transient(message) => Error::Transient {
            step: Step::Repository,
            target,
            message,
        },
    }
}
