//! In-process orchestrator.
//!
//! Mimics the parts of an API server the deployer relies on: namespaces
//! must exist, names are unique per namespace and kind, and creates never
//! overwrite. Faults and latency can be injected per object kind.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use berth_core::{DeploymentSpec, ServiceSpec};

use crate::client::{OrchestratorClient, OrchestratorError};

#[derive(Default)]
struct ClusterState {
    namespaces: HashSet<String>,
    /// `namespace/name` → spec.
    deployments: HashMap<String, DeploymentSpec>,
    services: HashMap<String, ServiceSpec>,
}

pub struct InMemoryOrchestrator {
    state: Mutex<ClusterState>,
    deployment_faults: Mutex<VecDeque<OrchestratorError>>,
    service_faults: Mutex<VecDeque<OrchestratorError>>,
    delay: Option<Duration>,
    deployment_creates: AtomicUsize,
    service_creates: AtomicUsize,
    reads: AtomicUsize,
}

impl InMemoryOrchestrator {
    /// A cluster with only the `default` namespace.
    pub fn new() -> Self {
        let state = ClusterState {
            namespaces: HashSet::from(["default".to_string()]),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
            deployment_faults: Mutex::new(VecDeque::new()),
            service_faults: Mutex::new(VecDeque::new()),
            delay: None,
            deployment_creates: AtomicUsize::new(0),
            service_creates: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn with_namespace(self, namespace: &str) -> Self {
        lock(&self.state).namespaces.insert(namespace.to_string());
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next deployment call (create or read) with `err`.
    pub fn fail_next_deployment(&self, err: OrchestratorError) {
        lock(&self.deployment_faults).push_back(err);
    }

    /// Fail the next service call (create or read) with `err`.
    pub fn fail_next_service(&self, err: OrchestratorError) {
        lock(&self.service_faults).push_back(err);
    }

    /// Seed a deployment as if someone else had created it.
    pub fn insert_deployment(&self, spec: DeploymentSpec) {
        let mut state = lock(&self.state);
        state.namespaces.insert(spec.namespace.clone());
        state.deployments.insert(spec.key(), spec);
    }

    pub fn insert_service(&self, spec: ServiceSpec) {
        let mut state = lock(&self.state);
        state.namespaces.insert(spec.namespace.clone());
        state.services.insert(spec.key(), spec);
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<DeploymentSpec> {
        lock(&self.state)
            .deployments
            .get(&format!("{namespace}/{name}"))
            .cloned()
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<ServiceSpec> {
        lock(&self.state)
            .services
            .get(&format!("{namespace}/{name}"))
            .cloned()
    }

    pub fn deployment_creates(&self) -> usize {
        self.deployment_creates.load(Ordering::SeqCst)
    }

    pub fn service_creates(&self) -> usize {
        self.service_creates.load(Ordering::SeqCst)
    }

    /// Total calls of any kind.
    pub fn calls(&self) -> usize {
        self.deployment_creates() + self.service_creates() + self.reads.load(Ordering::SeqCst)
    }

    async fn enter(
        &self,
        faults: &Mutex<VecDeque<OrchestratorError>>,
    ) -> Result<(), OrchestratorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match lock(faults).pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl OrchestratorClient for InMemoryOrchestrator {
    async fn create_deployment(&self, spec: &DeploymentSpec) -> Result<(), OrchestratorError> {
        self.deployment_creates.fetch_add(1, Ordering::SeqCst);
        self.enter(&self.deployment_faults).await?;

        let mut state = lock(&self.state);
        if !state.namespaces.contains(&spec.namespace) {
            return Err(OrchestratorError::NamespaceNotFound(spec.namespace.clone()));
        }
        if state.deployments.contains_key(&spec.key()) {
            return Err(OrchestratorError::AlreadyExists);
        }
        state.deployments.insert(spec.key(), spec.clone());
        debug!(deployment = %spec.key(), "in-memory deployment created");
        Ok(())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeploymentSpec>, OrchestratorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.enter(&self.deployment_faults).await?;
        Ok(self.deployment(namespace, name))
    }

    async fn create_service(&self, spec: &ServiceSpec) -> Result<(), OrchestratorError> {
        self.service_creates.fetch_add(1, Ordering::SeqCst);
        self.enter(&self.service_faults).await?;

        let mut state = lock(&self.state);
        if !state.namespaces.contains(&spec.namespace) {
            return Err(OrchestratorError::NamespaceNotFound(spec.namespace.clone()));
        }
        if state.services.contains_key(&spec.key()) {
            return Err(OrchestratorError::AlreadyExists);
        }
        state.services.insert(spec.key(), spec.clone());
        debug!(service = %spec.key(), "in-memory service created");
        Ok(())
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceSpec>, OrchestratorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.enter(&self.service_faults).await?;
        Ok(self.service(namespace, name))
    }
}
