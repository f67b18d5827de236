//! berth-deployer — submit a deployment and its service to the orchestrator.
//!
//! Each object goes through three stages: **construct** (`builder`),
//! **validate** (`builder`), then **submit** (`deployer`). Submission is a
//! plain create. When the name is taken the live object is read back: an
//! identical spec is an idempotent no-op, anything else is a conflict and
//! the live object is left alone.
//!
//! # Architecture
//!
//! ```text
//! WorkloadDeployer
//!   ├── DeployRequest::plan()      (no network)
//!   │     ├── build_deployment_spec / build_service_spec
//!   │     └── validate_* + label consistency
//!   └── submit()                   (deployment ∥ service)
//!         └── OrchestratorClient   (memory | kubernetes)
//! ```

pub mod builder;
pub mod client;
pub mod deployer;
#[cfg(feature = "kube")]
pub mod kubernetes;
pub mod memory;

pub use builder::{DeployPlan, selector_labels};
pub use client::{OrchestratorClient, OrchestratorError};
pub use deployer::{DeployRequest, DeployResult, StepOutcome, WorkloadDeployer};
#[cfg(feature = "kube")]
pub use kubernetes::KubeOrchestrator;
pub use memory::InMemoryOrchestrator;
