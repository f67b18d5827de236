//! Naming rules for registry repositories and cluster objects.
//!
//! These checks run before any request is sent: a name the remote side
//! would deterministically reject is reported as [`Error::Validation`]
//! without a round trip.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// ECR repository names: lowercase path segments separated by `/`.
static REPOSITORY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9]+(?:[._-][a-z0-9]+)*/)*[a-z0-9]+(?:[._-][a-z0-9]+)*$")
        .expect("repository name pattern is valid")
});

/// RFC 1123 label (namespaces).
static DNS_1123_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("dns-1123 label pattern is valid")
});

/// RFC 1123 subdomain (deployments).
static DNS_1123_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("dns-1123 subdomain pattern is valid")
});

/// RFC 1035 label (services): must start with a letter.
static DNS_1035_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").expect("dns-1035 label pattern is valid")
});

static IMAGE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$").expect("image tag pattern is valid")
});

static LABEL_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?)?$")
        .expect("label value pattern is valid")
});

const REPOSITORY_NAME_MIN: usize = 2;
const REPOSITORY_NAME_MAX: usize = 256;
const LABEL_MAX: usize = 63;
const SUBDOMAIN_MAX: usize = 253;

fn check(
    field: &'static str,
    value: &str,
    pattern: &Regex,
    max_len: usize,
    rule: &str,
) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(field, value, "must not be empty"));
    }
    if value.len() > max_len {
        return Err(Error::validation(
            field,
            value,
            format!("must be at most {max_len} characters"),
        ));
    }
    if !pattern.is_match(value) {
        return Err(Error::validation(field, value, rule.to_string()));
    }
    Ok(())
}

/// Registry repository name: 2–256 characters, lowercase alphanumerics
/// separated by `.`, `_`, `-`, or `/`.
pub fn validate_repository_name(name: &str) -> Result<()> {
    if !name.is_empty() && name.len() < REPOSITORY_NAME_MIN {
        return Err(Error::validation(
            "repository name",
            name,
            format!("must be at least {REPOSITORY_NAME_MIN} characters"),
        ));
    }
    check(
        "repository name",
        name,
        &REPOSITORY_NAME,
        REPOSITORY_NAME_MAX,
        "must be lowercase alphanumerics separated by '.', '_', '-' or '/'",
    )
}

pub fn validate_namespace(namespace: &str) -> Result<()> {
    check(
        "namespace",
        namespace,
        &DNS_1123_LABEL,
        LABEL_MAX,
        "must be a lowercase RFC 1123 label",
    )
}

pub fn validate_deployment_name(name: &str) -> Result<()> {
    check(
        "deployment name",
        name,
        &DNS_1123_SUBDOMAIN,
        SUBDOMAIN_MAX,
        "must be a lowercase RFC 1123 subdomain",
    )
}

pub fn validate_service_name(name: &str) -> Result<()> {
    check(
        "service name",
        name,
        &DNS_1035_LABEL,
        LABEL_MAX,
        "must be a lowercase RFC 1035 label starting with a letter",
    )
}

/// Container names share the RFC 1123 label rules.
pub fn validate_container_name(name: &str) -> Result<()> {
    check(
        "container name",
        name,
        &DNS_1123_LABEL,
        LABEL_MAX,
        "must be a lowercase RFC 1123 label",
    )
}

pub fn validate_tag(tag: &str) -> Result<()> {
    check(
        "image tag",
        tag,
        &IMAGE_TAG,
        128,
        "must be alphanumerics, '_', '.' or '-' and not start with '.' or '-'",
    )
}

/// Label values may be empty; non-empty values are at most 63 characters.
pub fn validate_label_value(value: &str) -> Result<()> {
    if value.len() > LABEL_MAX {
        return Err(Error::validation(
            "label value",
            value,
            format!("must be at most {LABEL_MAX} characters"),
        ));
    }
    if !LABEL_VALUE.is_match(value) {
        return Err(Error::validation(
            "label value",
            value,
            "must start and end with an alphanumeric",
        ));
    }
    Ok(())
}

/// TCP port in `1..=65535`.
pub fn validate_port(field: &'static str, port: u32) -> Result<u16> {
    match u16::try_from(port) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(Error::validation(
            field,
            &port.to_string(),
            "must be between 1 and 65535",
        )),
    }
}

pub fn validate_replicas(replicas: i32) -> Result<()> {
    if replicas < 0 {
        return Err(Error::validation(
            "replicas",
            &replicas.to_string(),
            "must not be negative",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn accepts_registry_names() {
        for name in ["my-app", "my_monitoring_app_image_new-1", "team/api", "a.b/c-d_e"] {
            assert!(validate_repository_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_uppercase_repository_name() {
        let err = validate_repository_name("My-App").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("My-App"));
    }

    #[test]
    fn rejects_malformed_repository_names() {
        for name in ["", "a", "-app", "app-", "app//api", "app..x", "/app"] {
            assert!(validate_repository_name(name).is_err(), "{name:?}");
        }
        assert!(validate_repository_name(&"a".repeat(257)).is_err());
        assert!(validate_repository_name(&"a".repeat(256)).is_ok());
    }

    #[test]
    fn namespace_is_a_dns_label() {
        assert!(validate_namespace("default").is_ok());
        assert!(validate_namespace("kube-system").is_ok());
        assert!(validate_namespace("Default").is_err());
        assert!(validate_namespace("team.a").is_err());
        assert!(validate_namespace(&"n".repeat(64)).is_err());
    }

    #[test]
    fn deployment_may_contain_dots_but_service_may_not() {
        assert!(validate_deployment_name("api.v2").is_ok());
        assert!(validate_service_name("api.v2").is_err());
    }

    #[test]
    fn service_must_start_with_letter() {
        assert!(validate_service_name("my-app-svc").is_ok());
        assert!(validate_service_name("1-svc").is_err());
    }

    #[test]
    fn tag_rules() {
        assert!(validate_tag("latest").is_ok());
        assert!(validate_tag("v1.2.3_rc-1").is_ok());
        assert!(validate_tag("").is_err());
        assert!(validate_tag(".hidden").is_err());
        assert!(validate_tag("a:b").is_err());
        assert!(validate_tag(&"t".repeat(129)).is_err());
    }

    #[test]
    fn label_values() {
        assert!(validate_label_value("").is_ok());
        assert!(validate_label_value("my-app.v2").is_ok());
        assert!(validate_label_value("-x").is_err());
        assert!(validate_label_value(&"l".repeat(64)).is_err());
    }

    #[test]
    fn port_range() {
        assert_eq!(validate_port("container port", 5000).unwrap(), 5000);
        assert_eq!(validate_port("container port", 65535).unwrap(), 65535);
        assert!(validate_port("container port", 0).is_err());
        assert!(validate_port("container port", 65536).is_err());
    }

    #[test]
    fn replicas_may_be_zero() {
        assert!(validate_replicas(0).is_ok());
        assert!(validate_replicas(-1).is_err());
    }
}
