//! Result and error types for Stagehand.

use std::time::Duration;
use thiserror::Error;

/// Result type for Stagehand operations
pub type StagehandResult<T> = Result<T, StagehandError>;

/// Errors that can occur while driving a component tree.
///
/// Locator and handle context is carried as rendered text so a failed flow
/// can be triaged from its report alone.
#[derive(Debug, Error)]
pub enum StagehandError {
    /// A wait condition never held before its deadline
    #[error("Deadline exceeded after {}ms waiting for {locator}: {expectation}", .elapsed.as_millis())]
    DeadlineExceeded {
        /// Locator that never resolved
        locator: String,
        /// What the wait expected of the matches
        expectation: String,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// A single-match lookup found nothing
    #[error("No component matches {locator}")]
    NotFound {
        /// Locator that matched nothing
        locator: String,
    },

    /// More than one component matched where exactly one was required
    #[error("{match_count} components match {locator}, expected exactly one")]
    AmbiguousMatch {
        /// Locator that matched too much
        locator: String,
        /// Number of matches
        match_count: usize,
    },

    /// An action targeted a component that is no longer in the tree
    #[error("Stale handle: component for {locator} is gone")]
    StaleHandle {
        /// Locator that produced the handle
        locator: String,
    },

    /// The attribute is absent on the component
    #[error("Attribute '{key}' missing on {handle}")]
    AttributeMissing {
        /// Handle description
        handle: String,
        /// Attribute key
        key: String,
    },

    /// The attribute is present but cannot be read as the requested type
    #[error("Attribute '{key}' on {handle} is '{found}', expected {expected}")]
    AttributeTypeMismatch {
        /// Handle description
        handle: String,
        /// Attribute key
        key: String,
        /// Requested type name
        expected: &'static str,
        /// Raw value found
        found: String,
    },

    /// A textual locator expression could not be parsed
    #[error("Invalid locator '{expression}': {reason}")]
    InvalidLocator {
        /// Offending expression
        expression: String,
        /// Parse failure
        reason: String,
    },

    /// A key combination could not be parsed
    #[error("Invalid key combo '{combo}': {reason}")]
    InvalidKeyCombo {
        /// Offending combo string
        combo: String,
        /// Parse failure
        reason: String,
    },

    /// The application never reported background readiness
    #[error("Application not ready after {}s", .timeout.as_secs())]
    ReadinessTimeout {
        /// Readiness timeout
        timeout: Duration,
    },

    /// The session transport reported a failure
    #[error("Session error: {message}")]
    Session {
        /// Error message
        message: String,
    },

    /// A flow-level check failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// An operation was attempted on a flow that already finished
    #[error("Flow already terminated in state {state}")]
    FlowTerminated {
        /// Terminal state name
        state: String,
    },

    /// A facade referenced a locator it never declared
    #[error("Facade '{facade}' declares no locator named '{name}'")]
    UndeclaredLocator {
        /// Facade name
        facade: &'static str,
        /// Requested locator name
        name: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl StagehandError {
    /// Whether this error came from a deadline (element wait or readiness)
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::DeadlineExceeded { .. } | Self::ReadinessTimeout { .. }
        )
    }

    /// The locator context carried by this error, if any
    #[must_use]
    pub fn locator(&self) -> Option<&str> {
        match self {
            Self::DeadlineExceeded { locator, .. }
            | Self::NotFound { locator }
            | Self::AmbiguousMatch { locator, .. }
            | Self::StaleHandle { locator } => Some(locator),
            _ => None,
        }
    }

    /// Short stable name of the error kind, used in flow reports and logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
            Self::NotFound { .. } => "not_found",
            Self::AmbiguousMatch { .. } => "ambiguous_match",
            Self::StaleHandle { .. } => "stale_handle",
            Self::AttributeMissing { .. } => "attribute_missing",
            Self::AttributeTypeMismatch { .. } => "attribute_type_mismatch",
            Self::InvalidLocator { .. } => "invalid_locator",
            Self::InvalidKeyCombo { .. } => "invalid_key_combo",
            Self::ReadinessTimeout { .. } => "readiness_timeout",
            Self::Session { .. } => "session",
            Self::AssertionFailed { .. } => "assertion_failed",
            Self::FlowTerminated { .. } => "flow_terminated",
            Self::UndeclaredLocator { .. } => "undeclared_locator",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
            Self::Yaml(_) => "yaml",
        }
    }

    /// Owned copy kept by a flow while the original goes back to the
    /// caller. I/O and YAML sources are flattened to their messages.
    pub(crate) fn replicate(&self) -> Self {
        match self {
            Self::DeadlineExceeded {
                locator,
                expectation,
                elapsed,
            } => Self::DeadlineExceeded {
                locator: locator.clone(),
                expectation: expectation.clone(),
                elapsed: *elapsed,
            },
            Self::NotFound { locator } => Self::NotFound {
                locator: locator.clone(),
            },
            Self::AmbiguousMatch {
                locator,
                match_count,
            } => Self::AmbiguousMatch {
                locator: locator.clone(),
                match_count: *match_count,
            },
            Self::StaleHandle { locator } => Self::StaleHandle {
                locator: locator.clone(),
            },
            Self::AttributeMissing { handle, key } => Self::AttributeMissing {
                handle: handle.clone(),
                key: key.clone(),
            },
            Self::AttributeTypeMismatch {
                handle,
                key,
                expected,
                found,
            } => Self::AttributeTypeMismatch {
                handle: handle.clone(),
                key: key.clone(),
                expected: *expected,
                found: found.clone(),
            },
            Self::InvalidLocator { expression, reason } => Self::InvalidLocator {
                expression: expression.clone(),
                reason: reason.clone(),
            },
            Self::InvalidKeyCombo { combo, reason } => Self::InvalidKeyCombo {
                combo: combo.clone(),
                reason: reason.clone(),
            },
            Self::ReadinessTimeout { timeout } => Self::ReadinessTimeout { timeout: *timeout },
            Self::Session { message } => Self::Session {
                message: message.clone(),
            },
            Self::AssertionFailed { message } => Self::AssertionFailed {
                message: message.clone(),
            },
            Self::FlowTerminated { state } => Self::FlowTerminated {
                state: state.clone(),
            },
            Self::UndeclaredLocator { facade, name } => Self::UndeclaredLocator {
                facade: *facade,
                name: name.clone(),
            },
            Self::Config { message } => Self::Config {
                message: message.clone(),
            },
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
            Self::Yaml(e) => Self::Config {
                message: format!("YAML error: {e}"),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_message_names_locator() {
        let err = StagehandError::DeadlineExceeded {
            locator: "//div[@text='OK']".to_string(),
            expectation: "at least one match".to_string(),
            elapsed: Duration::from_millis(5000),
        };
        let msg = err.to_string();
        assert!(msg.contains("5000ms"));
        assert!(msg.contains("//div[@text='OK']"));
        assert!(err.is_timeout());
        assert_eq!(err.locator(), Some("//div[@text='OK']"));
    }

    #[test]
    fn test_attribute_errors_are_distinct() {
        let missing = StagehandError::AttributeMissing {
            handle: "checkbox".to_string(),
            key: "selected".to_string(),
        };
        let mismatch = StagehandError::AttributeTypeMismatch {
            handle: "checkbox".to_string(),
            key: "selected".to_string(),
            expected: "bool",
            found: "yes".to_string(),
        };
        assert_eq!(missing.kind(), "attribute_missing");
        assert_eq!(mismatch.kind(), "attribute_type_mismatch");
        assert!(mismatch.to_string().contains("'yes'"));
        assert!(missing.locator().is_none());
    }

    #[test]
    fn test_readiness_timeout_is_timeout() {
        let err = StagehandError::ReadinessTimeout {
            timeout: Duration::from_secs(300),
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("300s"));
    }

    #[test]
    fn test_replicate_keeps_kind_and_context() {
        let err = StagehandError::StaleHandle {
            locator: "//checkbox".to_string(),
        };
        let copy = err.replicate();
        assert_eq!(copy.kind(), "stale_handle");
        assert_eq!(copy.locator(), Some("//checkbox"));
        assert_eq!(copy.to_string(), err.to_string());

        let io: StagehandError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        let copy = io.replicate();
        assert_eq!(copy.kind(), "io");
        assert!(copy.to_string().contains("missing"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: StagehandError = io.into();
        assert_eq!(err.kind(), "io");
    }
}
