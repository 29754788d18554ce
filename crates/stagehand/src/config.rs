//! Flow configuration: default wait options, action pacing and strictness.
//!
//! Loaded from YAML, then optionally overridden from the environment:
//!
//! ```yaml
//! element:
//!   timeout_ms: 5000
//!   poll_interval_ms: 100
//! readiness:
//!   timeout_ms: 300000
//! action_settle_ms: 0
//! strict: true
//! ```
//!
//! | Variable | Field |
//! |---|---|
//! | `STAGEHAND_ELEMENT_TIMEOUT_MS` | `element.timeout_ms` |
//! | `STAGEHAND_POLL_INTERVAL_MS` | `element.poll_interval_ms` |
//! | `STAGEHAND_READINESS_TIMEOUT_MS` | `readiness.timeout_ms` |

use crate::result::{StagehandError, StagehandResult};
use crate::wait::WaitOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding the element timeout
pub const ENV_ELEMENT_TIMEOUT_MS: &str = "STAGEHAND_ELEMENT_TIMEOUT_MS";
/// Environment variable overriding the element poll interval
pub const ENV_POLL_INTERVAL_MS: &str = "STAGEHAND_POLL_INTERVAL_MS";
/// Environment variable overriding the readiness timeout
pub const ENV_READINESS_TIMEOUT_MS: &str = "STAGEHAND_READINESS_TIMEOUT_MS";

/// Configuration shared by every operation of a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagehandConfig {
    /// Defaults for element waits
    pub element: WaitOptions,
    /// Defaults for background readiness
    pub readiness: WaitOptions,
    /// Pause between the primitive events of one action, in milliseconds
    pub action_settle_ms: u64,
    /// Whether a single-target wait fails on more than one match
    pub strict: bool,
}

impl Default for StagehandConfig {
    fn default() -> Self {
        Self {
            element: WaitOptions::default(),
            readiness: WaitOptions::readiness(),
            action_settle_ms: 0,
            strict: true,
        }
    }
}

impl StagehandConfig {
    /// Default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate YAML; missing fields take their defaults
    pub fn from_yaml_str(yaml: &str) -> StagehandResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: &Path) -> StagehandResult<Self> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> StagehandResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Apply the `STAGEHAND_*` environment overrides
    pub fn with_env_overrides(self) -> StagehandResult<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides_from<F>(mut self, lookup: F) -> StagehandResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| -> StagehandResult<Option<u64>> {
            lookup(name)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|e| StagehandError::Config {
                        message: format!("{name}='{raw}' is not a millisecond count: {e}"),
                    })
                })
                .transpose()
        };

        if let Some(ms) = read(ENV_ELEMENT_TIMEOUT_MS)? {
            self.element.timeout_ms = ms;
        }
        if let Some(ms) = read(ENV_POLL_INTERVAL_MS)? {
            self.element.poll_interval_ms = ms;
        }
        if let Some(ms) = read(ENV_READINESS_TIMEOUT_MS)? {
            self.readiness.timeout_ms = ms;
        }
        self.validate()?;
        Ok(self)
    }

    /// Set the element timeout
    #[must_use]
    pub const fn with_element_timeout(mut self, timeout_ms: u64) -> Self {
        self.element.timeout_ms = timeout_ms;
        self
    }

    /// Set the element poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.element.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set the readiness timeout
    #[must_use]
    pub const fn with_readiness_timeout(mut self, timeout_ms: u64) -> Self {
        self.readiness.timeout_ms = timeout_ms;
        self
    }

    /// Set the pause between primitive events
    #[must_use]
    pub const fn with_action_settle(mut self, settle_ms: u64) -> Self {
        self.action_settle_ms = settle_ms;
        self
    }

    /// Set the ambiguity policy
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Pause between primitive events as Duration
    #[must_use]
    pub const fn action_settle(&self) -> Duration {
        Duration::from_millis(self.action_settle_ms)
    }

    fn validate(&self) -> StagehandResult<()> {
        for (name, options) in [("element", &self.element), ("readiness", &self.readiness)] {
            if options.poll_interval_ms == 0 {
                return Err(StagehandError::Config {
                    message: format!("{name}.poll_interval_ms must be positive"),
                });
            }
            if options.poll_interval_ms > options.timeout_ms && options.timeout_ms > 0 {
                return Err(StagehandError::Config {
                    message: format!(
                        "{name}.poll_interval_ms ({}) exceeds {name}.timeout_ms ({})",
                        options.poll_interval_ms, options.timeout_ms
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StagehandConfig::default();
        assert_eq!(config.element.timeout(), Duration::from_secs(5));
        assert_eq!(config.readiness.timeout(), Duration::from_secs(300));
        assert!(config.strict);
        assert_eq!(config.action_settle(), Duration::ZERO);
    }

    #[test]
    fn test_partial_yaml() {
        let config = StagehandConfig::from_yaml_str("element:\n  timeout_ms: 2000\nstrict: false\n").unwrap();
        assert_eq!(config.element.timeout_ms, 2000);
        assert_eq!(config.element.poll_interval_ms, 100);
        assert_eq!(config.readiness, WaitOptions::readiness());
        assert!(!config.strict);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = StagehandConfig::new().with_element_timeout(1234).with_action_settle(15);
        let back = StagehandConfig::from_yaml_str(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_invalid_yaml_and_values() {
        assert_eq!(
            StagehandConfig::from_yaml_str("element: [1, 2]").unwrap_err().kind(),
            "yaml"
        );
        let err = StagehandConfig::from_yaml_str("element:\n  poll_interval_ms: 0\n").unwrap_err();
        assert!(err.to_string().contains("must be positive"));
        let err = StagehandConfig::from_yaml_str("element:\n  timeout_ms: 50\n").unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "readiness:\n  timeout_ms: 60000\naction_settle_ms: 20").unwrap();
        let config = StagehandConfig::from_file(file.path()).unwrap();
        assert_eq!(config.readiness.timeout_ms, 60_000);
        assert_eq!(config.action_settle(), Duration::from_millis(20));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StagehandConfig::from_file(&dir.path().join("absent.yaml")).unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_ELEMENT_TIMEOUT_MS, "800"),
            (ENV_READINESS_TIMEOUT_MS, " 1000 "),
        ]
        .into_iter()
        .collect();
        let config = StagehandConfig::default()
            .with_overrides_from(|name| vars.get(name).map(ToString::to_string))
            .unwrap();
        assert_eq!(config.element.timeout_ms, 800);
        assert_eq!(config.element.poll_interval_ms, 100);
        assert_eq!(config.readiness.timeout_ms, 1000);
    }

    #[test]
    fn test_bad_override() {
        let err = StagehandConfig::default()
            .with_overrides_from(|name| (name == ENV_POLL_INTERVAL_MS).then(|| "fast".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), "config");
        assert!(err.to_string().contains(ENV_POLL_INTERVAL_MS));
    }

    #[test]
    fn test_no_overrides_present() {
        let config = StagehandConfig::default().with_overrides_from(|_| None).unwrap();
        assert_eq!(config, StagehandConfig::default());
    }
}
