//! Typed reads of component state for assertions.
//!
//! Reads never guess: a missing attribute and an attribute that cannot be
//! read as the requested type are distinct outcomes, and booleans only
//! accept native booleans or the exact text `"true"` / `"false"`.

use crate::component::{keys, AttrValue};
use crate::locator::ResolvedHandle;
use crate::result::{StagehandError, StagehandResult};

/// Outcome of a typed attribute read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeRead<T> {
    /// Present and convertible
    Value(T),
    /// Not present on the component
    Missing,
    /// Present, but not convertible; carries the raw text
    TypeMismatch {
        /// Raw value found
        found: String,
    },
}

impl<T: FromAttribute> AttributeRead<T> {
    /// Read `key` from the handle's primary component
    #[must_use]
    pub fn from_handle(handle: &ResolvedHandle, key: &str) -> Self {
        match handle.component().attribute(key) {
            None => Self::Missing,
            Some(raw) => T::from_attribute(raw).map_or_else(
                || Self::TypeMismatch {
                    found: raw.as_text().into_owned(),
                },
                Self::Value,
            ),
        }
    }

    /// Convert into the crate's error taxonomy
    pub fn into_result(self, handle: &str, key: &str) -> StagehandResult<T> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Missing => Err(StagehandError::AttributeMissing {
                handle: handle.to_string(),
                key: key.to_string(),
            }),
            Self::TypeMismatch { found } => Err(StagehandError::AttributeTypeMismatch {
                handle: handle.to_string(),
                key: key.to_string(),
                expected: T::TYPE_NAME,
                found,
            }),
        }
    }
}

impl<T> AttributeRead<T> {
    /// The value, if the read succeeded
    #[must_use]
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Types an attribute value can be coerced into
pub trait FromAttribute: Sized {
    /// Name used in type-mismatch errors
    const TYPE_NAME: &'static str;

    /// Coerce, or `None` if the value has the wrong shape
    fn from_attribute(value: &AttrValue) -> Option<Self>;
}

impl FromAttribute for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_attribute(value: &AttrValue) -> Option<Self> {
        match value {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Text(s) | AttrValue::Enum(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

impl FromAttribute for String {
    const TYPE_NAME: &'static str = "string";

    fn from_attribute(value: &AttrValue) -> Option<Self> {
        Some(value.as_text().into_owned())
    }
}

impl FromAttribute for i64 {
    const TYPE_NAME: &'static str = "integer";

    fn from_attribute(value: &AttrValue) -> Option<Self> {
        match value {
            AttrValue::Text(s) => s.trim().parse().ok(),
            AttrValue::Bool(_) | AttrValue::Enum(_) => None,
        }
    }
}

/// Read `key` from the handle's primary component as `T`
pub fn read_attribute<T: FromAttribute>(handle: &ResolvedHandle, key: &str) -> StagehandResult<T> {
    AttributeRead::<T>::from_handle(handle, key).into_result(&handle.describe(), key)
}

/// Selection state
pub fn is_selected(handle: &ResolvedHandle) -> StagehandResult<bool> {
    read_attribute(handle, keys::SELECTED)
}

/// Enabled state
pub fn is_enabled(handle: &ResolvedHandle) -> StagehandResult<bool> {
    read_attribute(handle, keys::ENABLED)
}

/// Visible text
pub fn text(handle: &ResolvedHandle) -> StagehandResult<String> {
    read_attribute(handle, keys::TEXT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::locator::Locator;
    use crate::testing::FakeSession;
    use proptest::prelude::*;

    fn handle_for(component: Component) -> ResolvedHandle {
        let session = FakeSession::new(vec![component]);
        session.find_now(&Locator::any()).unwrap()
    }

    mod coercion_tests {
        use super::*;

        #[test]
        fn test_bool_from_text_and_native() {
            assert_eq!(bool::from_attribute(&"true".into()), Some(true));
            assert_eq!(bool::from_attribute(&"false".into()), Some(false));
            assert_eq!(bool::from_attribute(&AttrValue::Bool(true)), Some(true));
            assert_eq!(bool::from_attribute(&"TRUE".into()), None);
            assert_eq!(bool::from_attribute(&"1".into()), None);
        }

        #[test]
        fn test_integer() {
            assert_eq!(i64::from_attribute(&" 42 ".into()), Some(42));
            assert_eq!(i64::from_attribute(&"4x".into()), None);
            assert_eq!(i64::from_attribute(&AttrValue::Bool(true)), None);
        }
    }

    mod reader_tests {
        use super::*;

        #[test]
        fn test_is_selected() {
            let h = handle_for(Component::new("div").with_selected(true));
            assert!(is_selected(&h).unwrap());
        }

        #[test]
        fn test_missing_vs_mismatch() {
            let h = handle_for(Component::new("div").with_attr(keys::SELECTED, "maybe"));
            let err = is_selected(&h).unwrap_err();
            assert!(matches!(
                err,
                StagehandError::AttributeTypeMismatch { expected: "bool", ref found, .. } if found == "maybe"
            ));

            let h = handle_for(Component::new("div"));
            let err = is_selected(&h).unwrap_err();
            assert_eq!(err.kind(), "attribute_missing");
            assert!(err.to_string().contains("'selected'"));
        }

        #[test]
        fn test_tagged_read() {
            let h = handle_for(Component::new("div").with_text("OK"));
            assert_eq!(
                AttributeRead::<String>::from_handle(&h, keys::TEXT),
                AttributeRead::Value("OK".to_string())
            );
            assert_eq!(
                AttributeRead::<bool>::from_handle(&h, keys::TEXT),
                AttributeRead::TypeMismatch {
                    found: "OK".to_string()
                }
            );
            assert_eq!(AttributeRead::<bool>::from_handle(&h, "nope").value(), None);
        }

        #[test]
        fn test_enabled_is_not_defaulted() {
            let err = is_enabled(&handle_for(Component::new("div"))).unwrap_err();
            assert_eq!(err.kind(), "attribute_missing");
            assert!(err.to_string().contains("'enabled'"));
            assert!(!is_enabled(&handle_for(Component::new("div").with_enabled(false))).unwrap());
            assert!(is_enabled(&handle_for(Component::new("div").with_enabled(true))).unwrap());
        }

        #[test]
        fn test_text() {
            let h = handle_for(Component::new("div").with_text("Version Control"));
            assert_eq!(text(&h).unwrap(), "Version Control");
        }
    }

    proptest! {
        #[test]
        fn prop_bool_coercion(raw in "\\PC{0,8}") {
            let expected = match raw.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            };
            prop_assert_eq!(bool::from_attribute(&AttrValue::Text(raw.clone())), expected);

            let h = handle_for(Component::new("div").with_attr(keys::SELECTED, raw));
            match expected {
                Some(b) => prop_assert_eq!(is_selected(&h).unwrap(), b),
                None => prop_assert_eq!(is_selected(&h).unwrap_err().kind(), "attribute_type_mismatch"),
            }
        }

        #[test]
        fn prop_bool_literals_always_coerce(b in any::<bool>()) {
            prop_assert_eq!(bool::from_attribute(&AttrValue::Text(b.to_string())), Some(b));
        }
    }
}
