//! berth.toml configuration parser.
//!
//! Every field is optional; missing values fall back to the defaults
//! below, and CLI flags override whatever the file sets.
//!
//! ```toml
//! [timeouts]
//! request = "30s"
//!
//! [retry]
//! attempts = 3
//! base_backoff = "500ms"
//! max_backoff = "10s"
//!
//! [defaults]
//! namespace = "default"
//! registry_backend = "ecr"
//! orchestrator_backend = "kube"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BerthConfig {
    pub timeouts: Option<TimeoutsConfig>,
    pub retry: Option<RetryConfig>,
    pub defaults: Option<DefaultsConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Bound on each registry/orchestrator call (e.g. "30s").
    pub request: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per step, including the first.
    pub attempts: Option<u32>,
    pub base_backoff: Option<String>,
    pub max_backoff: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    pub namespace: Option<String>,
    pub registry_backend: Option<String>,
    pub orchestrator_backend: Option<String>,
}

impl BerthConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BerthConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        let raw = self.timeouts.as_ref().and_then(|t| t.request.as_deref());
        duration_or("timeouts.request", raw, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry
            .as_ref()
            .and_then(|r| r.attempts)
            .unwrap_or(DEFAULT_RETRY_ATTEMPTS)
            .max(1)
    }

    pub fn base_backoff(&self) -> Result<Duration> {
        let raw = self.retry.as_ref().and_then(|r| r.base_backoff.as_deref());
        duration_or("retry.base_backoff", raw, DEFAULT_BASE_BACKOFF)
    }

    pub fn max_backoff(&self) -> Result<Duration> {
        let raw = self.retry.as_ref().and_then(|r| r.max_backoff.as_deref());
        duration_or("retry.max_backoff", raw, DEFAULT_MAX_BACKOFF)
    }

    pub fn default_namespace(&self) -> Option<&str> {
        self.defaults.as_ref().and_then(|d| d.namespace.as_deref())
    }

    pub fn registry_backend(&self) -> Option<&str> {
        self.defaults.as_ref().and_then(|d| d.registry_backend.as_deref())
    }

    pub fn orchestrator_backend(&self) -> Option<&str> {
        self.defaults
            .as_ref()
            .and_then(|d| d.orchestrator_backend.as_deref())
    }
}

fn duration_or(field: &'static str, raw: Option<&str>, default: Duration) -> Result<Duration> {
    match raw {
        None => Ok(default),
        Some(s) => parse_duration(s).ok_or_else(|| {
            Error::validation(field, s, "expected a duration like 500ms, 30s, 2m or 1h")
        }),
    }
}

/// Parse a duration such as `"500ms"`, `"30s"`, `"2m"` or `"1h"`. A bare
/// number is seconds. Values too large to represent are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let n: u64 = digits.parse().ok()?;
    let secs_per_unit = match unit {
        "ms" => return Some(Duration::from_millis(n)),
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => return None,
    };
    n.checked_mul(secs_per_unit).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: BerthConfig = toml::from_str("").unwrap();
        assert_eq!(config.request_timeout().unwrap(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.retry_attempts(), DEFAULT_RETRY_ATTEMPTS);
        assert_eq!(config.base_backoff().unwrap(), DEFAULT_BASE_BACKOFF);
        assert_eq!(config.max_backoff().unwrap(), DEFAULT_MAX_BACKOFF);
        assert_eq!(config.default_namespace(), None);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[timeouts]
request = "5s"

[retry]
attempts = 5
base_backoff = "250ms"
max_backoff = "1m"

[defaults]
namespace = "apps"
registry_backend = "memory"
orchestrator_backend = "kube"
"#;
        let config: BerthConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.request_timeout().unwrap(), Duration::from_secs(5));
        assert_eq!(config.retry_attempts(), 5);
        assert_eq!(config.base_backoff().unwrap(), Duration::from_millis(250));
        assert_eq!(config.max_backoff().unwrap(), Duration::from_secs(60));
        assert_eq!(config.default_namespace(), Some("apps"));
        assert_eq!(config.registry_backend(), Some("memory"));
        assert_eq!(config.orchestrator_backend(), Some("kube"));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let config: BerthConfig = toml::from_str("[retry]\nattempts = 0\n").unwrap();
        assert_eq!(config.retry_attempts(), 1);
    }

    #[test]
    fn bad_duration_is_a_validation_error() {
        let config: BerthConfig = toml::from_str("[timeouts]\nrequest = \"soon\"\n").unwrap();
        let err = config.request_timeout().unwrap_err();
        assert!(err.to_string().contains("timeouts.request"));
    }

    #[test]
    fn round_trips_through_toml() {
        let config: BerthConfig = toml::from_str("[defaults]\nnamespace = \"apps\"\n").unwrap();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("apps"));
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration(" 45s "), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("fast"), None);
        assert_eq!(parse_duration("5 s"), None);
        assert_eq!(parse_duration("ms"), None);
        assert_eq!(parse_duration("-3s"), None);
    }

    #[test]
    fn oversized_duration_is_rejected() {
        assert_eq!(parse_duration("400000000000000000m"), None);
        assert_eq!(parse_duration("99999999999999999999s"), None);

        let config: BerthConfig =
            toml::from_str("[timeouts]\nrequest = \"400000000000000000m\"\n").unwrap();
        let err = config.request_timeout().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert!(err.to_string().contains("timeouts.request"));
    }
}
