//! berth-registry — image repository provisioning.
//!
//! [`RegistryProvisioner::ensure_repository`] creates a repository or, if
//! one with that name already exists, describes it and returns the same
//! identity. Re-running against a registry where a previous run succeeded
//! is therefore a no-op.
//!
//! # Components
//!
//! - **`client`** — the `RegistryClient` trait the provisioner talks through
//! - **`provisioner`** — validation, create-or-describe, error mapping
//! - **`memory`** — in-process registry with call counters and fault injection
//! - **`ecr`** — Amazon ECR adapter (feature `ecr`)

pub mod client;
#[cfg(feature = "ecr")]
pub mod ecr;
pub mod memory;
pub mod provisioner;

pub use client::{RegistryClient, RegistryError};
#[cfg(feature = "ecr")]
pub use ecr::EcrRegistry;
pub use memory::InMemoryRegistry;
pub use provisioner::RegistryProvisioner;
