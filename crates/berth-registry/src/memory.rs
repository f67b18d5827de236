//! In-process registry.
//!
//! Backs the `memory` CLI backend and the test suites. Counts every call so
//! tests can assert that validation short-circuits before the network, and
//! can be told to fail or stall.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::client::{RegistryClient, RegistryError};

pub const DEFAULT_HOST: &str = "registry.example";

pub struct InMemoryRegistry {
    host: String,
    repositories: Mutex<HashMap<String, String>>,
    /// Errors returned, in order, by the next calls of either kind.
    faults: Mutex<VecDeque<RegistryError>>,
    delay: Option<Duration>,
    create_calls: AtomicUsize,
    describe_calls: AtomicUsize,
}

impl InMemoryRegistry {
    /// Registry whose URIs look like `registry.example/<name>`.
    pub fn new() -> Self {
        Self::with_host(DEFAULT_HOST)
    }

    pub fn with_host(host: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            repositories: Mutex::new(HashMap::new()),
            faults: Mutex::new(VecDeque::new()),
            delay: None,
            create_calls: AtomicUsize::new(0),
            describe_calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every call (for timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make the next call fail with `err`. Queued faults fire in order.
    pub fn fail_next(&self, err: RegistryError) {
        lock(&self.faults).push_back(err);
    }

    /// Register `name` as if a previous run had created it.
    pub fn insert(&self, name: &str) -> String {
        let uri = self.uri_for(name);
        lock(&self.repositories).insert(name.to_string(), uri.clone());
        uri
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.repositories).contains_key(name)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    /// Total calls of any kind.
    pub fn calls(&self) -> usize {
        self.create_calls() + self.describe_calls()
    }

    fn uri_for(&self, name: &str) -> String {
        format!("{}/{}", self.host, name)
    }

    async fn enter(&self) -> Result<(), RegistryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match lock(&self.faults).pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    async fn create_repository(&self, name: &str) -> Result<String, RegistryError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;

        let mut repos = lock(&self.repositories);
        if repos.contains_key(name) {
            return Err(RegistryError::AlreadyExists);
        }
        let uri = self.uri_for(name);
        repos.insert(name.to_string(), uri.clone());
        debug!(repository = %name, %uri, "in-memory repository created");
        Ok(uri)
    }

    async fn describe_repository(&self, name: &str) -> Result<String, RegistryError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;

        lock(&self.repositories)
            .get(name)
            .cloned()
            .ok_or(RegistryError::NotFound)
    }
}
