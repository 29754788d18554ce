//! Predicates over a single component.

use crate::component::{keys, Component};
use crate::result::{StagehandError, StagehandResult};
use regex::Regex;
use std::fmt;

/// Compiled regular expression matched against a component's text.
///
/// Equality compares the source pattern.
#[derive(Debug, Clone)]
pub struct TextPattern(Regex);

impl TextPattern {
    /// Compile a pattern
    pub fn new(pattern: &str) -> StagehandResult<Self> {
        Self::compile(pattern).map_err(|e| StagehandError::InvalidLocator {
            expression: pattern.to_string(),
            reason: e.to_string(),
        })
    }

    pub(crate) fn compile(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    /// Source pattern
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether the pattern matches anywhere in `text`
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for TextPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for TextPattern {}

/// One test applied to a component; a locator ANDs its predicates.
///
/// Non-exhaustive so disjunction and negation can be added later.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Predicate {
    /// Node tag equals
    Tag(String),
    /// `class` attribute contains the substring
    ClassContains(String),
    /// `text` attribute equals
    TextEquals(String),
    /// `text` attribute contains the substring
    TextContains(String),
    /// `text` attribute matches the regular expression
    TextMatches(TextPattern),
    /// Textual form of an attribute equals
    AttributeEquals {
        /// Attribute key
        key: String,
        /// Expected value
        value: String,
    },
    /// Textual form of an attribute contains the substring
    AttributeContains {
        /// Attribute key
        key: String,
        /// Expected substring
        value: String,
    },
    /// Match filter on the `enabled` attribute; a component without the
    /// attribute passes as enabled. Typed reads use [`crate::state::is_enabled`],
    /// which reports the missing attribute instead.
    Enabled(bool),
}

impl Predicate {
    /// Attribute equality, folded onto the dedicated variants for
    /// `text` and `enabled` so every predicate has one canonical form
    #[must_use]
    pub fn attribute_equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match (key.as_str(), value.as_str()) {
            (keys::TEXT, _) => Self::TextEquals(value),
            (keys::ENABLED, "true") => Self::Enabled(true),
            (keys::ENABLED, "false") => Self::Enabled(false),
            _ => Self::AttributeEquals { key, value },
        }
    }

    /// Attribute substring match, folded onto the `class`/`text` variants
    #[must_use]
    pub fn attribute_contains(key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            keys::CLASS => Self::ClassContains(value),
            keys::TEXT => Self::TextContains(value),
            _ => Self::AttributeContains { key, value },
        }
    }

    /// Evaluate against one component (children are not considered)
    #[must_use]
    pub fn matches(&self, component: &Component) -> bool {
        let text = |key: &str| component.attribute_text(key);
        match self {
            Self::Tag(tag) => component.tag() == tag,
            Self::ClassContains(v) => text(keys::CLASS).is_some_and(|c| c.contains(v.as_str())),
            Self::TextEquals(v) => text(keys::TEXT).is_some_and(|t| t == v.as_str()),
            Self::TextContains(v) => text(keys::TEXT).is_some_and(|t| t.contains(v.as_str())),
            Self::TextMatches(p) => text(keys::TEXT).is_some_and(|t| p.is_match(&t)),
            Self::AttributeEquals { key, value } => text(key.as_str()).is_some_and(|a| a == value.as_str()),
            Self::AttributeContains { key, value } => {
                text(key.as_str()).is_some_and(|a| a.contains(value.as_str()))
            }
            Self::Enabled(expected) => {
                text(keys::ENABLED).map_or(true, |a| a == "true") == *expected
            }
        }
    }
}

/// Render a string literal, switching quote style when the value has `'`.
/// A value with both quote kinds becomes `concat()` of its pieces.
pub(crate) fn quote(value: &str) -> String {
    match (value.contains('\''), value.contains('"')) {
        (false, _) => format!("'{value}'"),
        (true, false) => format!("\"{value}\""),
        (true, true) => {
            let pieces: Vec<String> = value.split('\'').map(|piece| format!("'{piece}'")).collect();
            format!("concat({})", pieces.join(", \"'\", "))
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => write!(f, "name()={}", quote(tag)),
            Self::ClassContains(v) => write!(f, "contains(@class, {})", quote(v)),
            Self::TextEquals(v) => write!(f, "@text={}", quote(v)),
            Self::TextContains(v) => write!(f, "contains(@text, {})", quote(v)),
            Self::TextMatches(p) => write!(f, "matches(@text, {})", quote(p.as_str())),
            Self::AttributeEquals { key, value } => write!(f, "@{key}={}", quote(value)),
            Self::AttributeContains { key, value } => {
                write!(f, "contains(@{key}, {})", quote(value))
            }
            Self::Enabled(b) => write!(f, "@enabled='{b}'"),
        }
    }
}
