//! Domain types exchanged between the registry provisioner, the workload
//! deployer, and the CLI.
//!
//! Labels use `BTreeMap` so two specs built from the same inputs compare,
//! serialize, and print identically.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Label set attached to pods and used as a service selector.
pub type Labels = BTreeMap<String, String>;

/// The mutable tag Berth accepts but warns about.
pub const LATEST_TAG: &str = "latest";

// ── Repository ─────────────────────────────────────────────────────

/// A repository in the image registry and the address images are pulled from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryIdentity {
    pub name: String,
    /// Canonical pull address, assigned by the registry (e.g.
    /// `123456789012.dkr.ecr.eu-west-1.amazonaws.com/my-app`).
    pub uri: String,
}

/// `repository_uri:tag`, the image a deployment's container runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    pub repository_uri: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(repository_uri: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository_uri: repository_uri.into(),
            tag: tag.into(),
        }
    }

    /// Reference `tag` inside a repository returned by the provisioner.
    pub fn in_repository(repository: &RepositoryIdentity, tag: impl Into<String>) -> Self {
        Self::new(repository.uri.clone(), tag)
    }

    /// Split a rendered reference back into URI and tag.
    ///
    /// The tag separator is the last `:` after the last `/`, so registry
    /// hosts with ports (`localhost:5000/app:v1`) parse correctly. A
    /// reference without a tag yields `None`.
    pub fn parse(image: &str) -> Option<Self> {
        let slash = image.rfind('/').map_or(0, |i| i + 1);
        let (uri, tag) = image[slash..]
            .rfind(':')
            .map(|i| (&image[..slash + i], &image[slash + i + 1..]))?;
        if uri.is_empty() || tag.is_empty() {
            return None;
        }
        Some(Self::new(uri, tag))
    }

    /// `latest` (and friends) can point at different images over time.
    pub fn is_mutable_tag(&self) -> bool {
        self.tag == LATEST_TAG
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository_uri, self.tag)
    }
}

// ── Deployment ─────────────────────────────────────────────────────

/// Desired state of a single-container workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
    /// Pod template labels, also the deployment's selector.
    pub selector_labels: Labels,
    pub container_name: String,
    pub image: ImageReference,
    pub container_port: u16,
}

impl DeploymentSpec {
    /// `namespace/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Fields in which `live` differs from this spec. Empty means the two
    /// describe the same workload.
    pub fn differing_fields(&self, live: &DeploymentSpec) -> Vec<String> {
        let mut fields = Vec::new();
        if self.replicas != live.replicas {
            fields.push("replicas");
        }
        if self.selector_labels != live.selector_labels {
            fields.push("selector_labels");
        }
        if self.container_name != live.container_name {
            fields.push("container_name");
        }
        if self.image != live.image {
            fields.push("image");
        }
        if self.container_port != live.container_port {
            fields.push("container_port");
        }
        fields.into_iter().map(String::from).collect()
    }
}

// ── Service ────────────────────────────────────────────────────────

/// Stable endpoint routing to the pods of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub namespace: String,
    pub selector_labels: Labels,
    /// Port the service listens on.
    pub port: u16,
    /// Container port traffic is forwarded to.
    pub target_port: u16,
}

impl ServiceSpec {
    /// `namespace/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn differing_fields(&self, live: &ServiceSpec) -> Vec<String> {
        let mut fields = Vec::new();
        if self.selector_labels != live.selector_labels {
            fields.push("selector_labels");
        }
        if self.port != live.port {
            fields.push("port");
        }
        if self.target_port != live.target_port {
            fields.push("target_port");
        }
        fields.into_iter().map(String::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(app: &str) -> Labels {
        Labels::from([("app".to_string(), app.to_string())])
    }

    fn deployment() -> DeploymentSpec {
        DeploymentSpec {
            name: "api".to_string(),
            namespace: "default".to_string(),
            replicas: 1,
            selector_labels: labels("api"),
            container_name: "api".to_string(),
            image: ImageReference::new("registry.example/api", "v1"),
            container_port: 5000,
        }
    }

    #[test]
    fn image_reference_renders_uri_colon_tag() {
        let image = ImageReference::new("registry.example/my-app", "v1.2.0");
        assert_eq!(image.to_string(), "registry.example/my-app:v1.2.0");
    }

    #[test]
    fn parse_handles_registry_port() {
        let image = ImageReference::parse("localhost:5000/team/app:v3").unwrap();
        assert_eq!(image.repository_uri, "localhost:5000/team/app");
        assert_eq!(image.tag, "v3");
    }

    #[test]
    fn parse_without_tag_is_none() {
        assert_eq!(ImageReference::parse("localhost:5000/team/app"), None);
        assert_eq!(ImageReference::parse("app:"), None);
    }

    #[test]
    fn latest_is_mutable() {
        assert!(ImageReference::new("r/app", "latest").is_mutable_tag());
        assert!(!ImageReference::new("r/app", "1.0.0").is_mutable_tag());
    }

    #[test]
    fn identical_deployments_have_no_diff() {
        assert!(deployment().differing_fields(&deployment()).is_empty());
    }

    #[test]
    fn deployment_diff_lists_changed_fields() {
        let live = DeploymentSpec {
            replicas: 3,
            image: ImageReference::new("registry.example/api", "v2"),
            ..deployment()
        };
        assert_eq!(deployment().differing_fields(&live), vec!["replicas", "image"]);
    }

    #[test]
    fn service_diff_detects_selector_drift() {
        let svc = ServiceSpec {
            name: "api-svc".to_string(),
            namespace: "default".to_string(),
            selector_labels: labels("api"),
            port: 80,
            target_port: 5000,
        };
        let live = ServiceSpec {
            selector_labels: labels("other"),
            ..svc.clone()
        };
        assert_eq!(svc.differing_fields(&live), vec!["selector_labels"]);
        assert_eq!(svc.key(), "default/api-svc");
    }
}
