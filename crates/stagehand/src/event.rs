//! Input event types dispatched to the application.
//!
//! Semantic actions are lowered to these primitives before they reach the
//! session. Key combinations use the space separated form the application
//! keymaps use (`"meta comma"`, `"ctrl alt s"`); `+` is accepted as well.

use crate::component::NodePath;
use crate::result::{StagehandError, StagehandResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    /// Primary button
    #[default]
    Left,
    /// Secondary button
    Right,
}

/// Keyboard modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    /// Command on macOS, Super/Windows elsewhere
    Meta,
    /// Control
    Ctrl,
    /// Alt / Option
    Alt,
    /// Shift
    Shift,
}

impl Modifier {
    /// The modifier application shortcuts are built on for this platform
    #[must_use]
    pub const fn primary() -> Self {
        if cfg!(target_os = "macos") {
            Self::Meta
        } else {
            Self::Ctrl
        }
    }

    /// Canonical name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Ctrl => "ctrl",
            Self::Alt => "alt",
            Self::Shift => "shift",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "meta" | "cmd" | "command" | "super" => Some(Self::Meta),
            "ctrl" | "control" => Some(Self::Ctrl),
            "alt" | "opt" | "option" => Some(Self::Alt),
            "shift" => Some(Self::Shift),
            _ => None,
        }
    }
}

/// A non-modifier key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// Printable character (letters are stored lowercase)
    Char(char),
    /// Return / Enter
    Enter,
    /// Tab
    Tab,
    /// Space bar
    Space,
    /// Escape
    Escape,
    /// Backspace
    Backspace,
    /// Forward delete
    Delete,
    /// Arrow up
    Up,
    /// Arrow down
    Down,
    /// Arrow left
    Left,
    /// Arrow right
    Right,
    /// Home
    Home,
    /// End
    End,
    /// Page up
    PageUp,
    /// Page down
    PageDown,
    /// Function key F1-F24
    F(u8),
}

/// Named punctuation keys and the character they type
const PUNCTUATION: &[(&str, char)] = &[
    ("comma", ','),
    ("period", '.'),
    ("slash", '/'),
    ("backslash", '\\'),
    ("semicolon", ';'),
    ("quote", '\''),
    ("minus", '-'),
    ("equals", '='),
    ("plus", '+'),
    ("open_bracket", '['),
    ("close_bracket", ']'),
    ("back_quote", '`'),
];

impl Key {
    /// Parse a key name (case-insensitive)
    fn parse(name: &str) -> Option<Self> {
        let key = match name {
            "enter" | "return" => Self::Enter,
            "tab" => Self::Tab,
            "space" => Self::Space,
            "escape" | "esc" => Self::Escape,
            "backspace" | "back_space" => Self::Backspace,
            "delete" | "del" => Self::Delete,
            "up" => Self::Up,
            "down" => Self::Down,
            "left" => Self::Left,
            "right" => Self::Right,
            "home" => Self::Home,
            "end" => Self::End,
            "pageup" | "page_up" => Self::PageUp,
            "pagedown" | "page_down" => Self::PageDown,
            other => {
                if let Some((_, c)) = PUNCTUATION.iter().find(|(n, _)| *n == other) {
                    return Some(Self::Char(*c));
                }
                if let Some(number) = other.strip_prefix('f') {
                    if let Ok(n) = number.parse::<u8>() {
                        return (1..=24).contains(&n).then_some(Self::F(n));
                    }
                }
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphanumeric() || PUNCTUATION.iter().any(|(_, p)| *p == c) => {
                        Self::Char(c.to_ascii_lowercase())
                    }
                    _ => return None,
                }
            }
        };
        Some(key)
    }

    /// Canonical name, the inverse of parsing
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Char(c) => PUNCTUATION
                .iter()
                .find(|(_, p)| p == c)
                .map_or_else(|| c.to_string(), |(n, _)| (*n).to_string()),
            Self::Enter => "enter".to_string(),
            Self::Tab => "tab".to_string(),
            Self::Space => "space".to_string(),
            Self::Escape => "escape".to_string(),
            Self::Backspace => "backspace".to_string(),
            Self::Delete => "delete".to_string(),
            Self::Up => "up".to_string(),
            Self::Down => "down".to_string(),
            Self::Left => "left".to_string(),
            Self::Right => "right".to_string(),
            Self::Home => "home".to_string(),
            Self::End => "end".to_string(),
            Self::PageUp => "page_up".to_string(),
            Self::PageDown => "page_down".to_string(),
            Self::F(n) => format!("f{n}"),
        }
    }
}

/// A key plus the modifiers held while it is pressed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCombo {
    modifiers: Vec<Modifier>,
    key: Key,
}

impl KeyCombo {
    /// Build a combo; modifiers are normalised to a sorted, duplicate-free set
    #[must_use]
    pub fn new(modifiers: impl IntoIterator<Item = Modifier>, key: Key) -> Self {
        let mut modifiers: Vec<Modifier> = modifiers.into_iter().collect();
        modifiers.sort_unstable();
        modifiers.dedup();
        Self { modifiers, key }
    }

    /// Parse `"meta comma"`, `"ctrl alt s"` or `"ctrl+shift+p"`.
    ///
    /// Exactly one non-modifier key is required; names are case-insensitive.
    pub fn parse(combo: &str) -> StagehandResult<Self> {
        let invalid = |reason: &str| StagehandError::InvalidKeyCombo {
            combo: combo.to_string(),
            reason: reason.to_string(),
        };

        let mut modifiers = Vec::new();
        let mut key = None;
        for part in combo
            .split(|c: char| c.is_whitespace() || c == '+')
            .filter(|p| !p.is_empty())
        {
            let lower = part.to_lowercase();
            if let Some(modifier) = Modifier::parse(&lower) {
                modifiers.push(modifier);
                continue;
            }
            let parsed = Key::parse(&lower).ok_or_else(|| invalid(&format!("unknown key '{part}'")))?;
            if key.replace(parsed).is_some() {
                return Err(invalid("more than one non-modifier key"));
            }
        }

        let key = key.ok_or_else(|| invalid("no key besides modifiers"))?;
        Ok(Self::new(modifiers, key))
    }

    /// Held modifiers, sorted
    #[must_use]
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    /// The pressed key
    #[must_use]
    pub const fn key(&self) -> Key {
        self.key
    }

    /// Lower to a key-down/key-up pair
    #[must_use]
    pub fn to_events(&self, target: Option<&NodePath>) -> Vec<InputEvent> {
        vec![
            InputEvent::KeyDown {
                key: self.key,
                modifiers: self.modifiers.clone(),
                target: target.cloned(),
            },
            InputEvent::KeyUp {
                key: self.key,
                modifiers: self.modifiers.clone(),
                target: target.cloned(),
            },
        ]
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{} ", modifier.as_str())?;
        }
        f.write_str(&self.key.name())
    }
}

impl std::str::FromStr for KeyCombo {
    type Err = StagehandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Primitive input event understood by the application session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// Mouse button pressed over a component
    MouseDown {
        /// Target component
        target: NodePath,
        /// Button
        button: MouseButton,
    },
    /// Mouse button released over a component
    MouseUp {
        /// Target component
        target: NodePath,
        /// Button
        button: MouseButton,
    },
    /// Key pressed; `target` is `None` for application-wide shortcuts
    KeyDown {
        /// Key
        key: Key,
        /// Held modifiers
        modifiers: Vec<Modifier>,
        /// Focused component, if any
        target: Option<NodePath>,
    },
    /// Key released
    KeyUp {
        /// Key
        key: Key,
        /// Held modifiers
        modifiers: Vec<Modifier>,
        /// Focused component, if any
        target: Option<NodePath>,
    },
    /// Unicode text delivered to a component in one event
    Text {
        /// Target component
        target: NodePath,
        /// Text to insert
        text: String,
    },
}

impl InputEvent {
    /// Component the event is aimed at, `None` for global key events
    #[must_use]
    pub const fn target(&self) -> Option<&NodePath> {
        match self {
            Self::MouseDown { target, .. }
            | Self::MouseUp { target, .. }
            | Self::Text { target, .. } => Some(target),
            Self::KeyDown { target, .. } | Self::KeyUp { target, .. } => target.as_ref(),
        }
    }

    /// Short event name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MouseDown { .. } => "mouse_down",
            Self::MouseUp { .. } => "mouse_up",
            Self::KeyDown { .. } => "key_down",
            Self::KeyUp { .. } => "key_up",
            Self::Text { .. } => "text",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod key_combo_tests {
        use super::*;

        #[test]
        fn test_parse_space_separated() {
            let combo = KeyCombo::parse("meta comma").unwrap();
            assert_eq!(combo.modifiers(), &[Modifier::Meta]);
            assert_eq!(combo.key(), Key::Char(','));
        }

        #[test]
        fn test_parse_plus_separated_and_sorted() {
            let combo = KeyCombo::parse("shift+Ctrl+P").unwrap();
            assert_eq!(combo.modifiers(), &[Modifier::Ctrl, Modifier::Shift]);
            assert_eq!(combo.key(), Key::Char('p'));
        }

        #[test]
        fn test_parse_three_part() {
            let combo = KeyCombo::parse("ctrl alt s").unwrap();
            assert_eq!(combo.modifiers(), &[Modifier::Ctrl, Modifier::Alt]);
            assert_eq!(combo.to_string(), "ctrl alt s");
        }

        #[test]
        fn test_parse_named_keys() {
            assert_eq!(KeyCombo::parse("enter").unwrap().key(), Key::Enter);
            assert_eq!(KeyCombo::parse("esc").unwrap().key(), Key::Escape);
            assert_eq!(KeyCombo::parse("f12").unwrap().key(), Key::F(12));
            assert_eq!(KeyCombo::parse("cmd ,").unwrap().key(), Key::Char(','));
        }

        #[test]
        fn test_parse_errors() {
            assert!(KeyCombo::parse("").is_err());
            assert!(KeyCombo::parse("ctrl shift").is_err());
            assert!(KeyCombo::parse("ctrl s p").is_err());
            assert!(KeyCombo::parse("hyper x").is_err());
            assert!(KeyCombo::parse("f30").is_err());
        }

        #[test]
        fn test_error_kind() {
            let err = KeyCombo::parse("ctrl").unwrap_err();
            assert_eq!(err.kind(), "invalid_key_combo");
            assert!(err.to_string().contains("no key"));
        }

        #[test]
        fn test_duplicate_modifiers_collapse() {
            let combo = KeyCombo::parse("ctrl control x").unwrap();
            assert_eq!(combo.modifiers(), &[Modifier::Ctrl]);
        }

        #[test]
        fn test_events_are_down_then_up() {
            let combo = KeyCombo::parse("meta comma").unwrap();
            let events = combo.to_events(None);
            assert_eq!(events.len(), 2);
            assert_eq!(events[0].name(), "key_down");
            assert_eq!(events[1].name(), "key_up");
            assert!(events[0].target().is_none());
        }

        #[test]
        fn test_primary_modifier_is_platform_specific() {
            let primary = Modifier::primary();
            if cfg!(target_os = "macos") {
                assert_eq!(primary, Modifier::Meta);
            } else {
                assert_eq!(primary, Modifier::Ctrl);
            }
        }
    }

    mod input_event_tests {
        use super::*;

        #[test]
        fn test_serialization_is_tagged() {
            let event = InputEvent::MouseDown {
                target: NodePath::root(0).child(1),
                button: MouseButton::Left,
            };
            let json = serde_json::to_string(&event).unwrap();
            assert!(json.contains("\"type\":\"mouse_down\""));
            assert!(json.contains("\"button\":\"left\""));
        }
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(
            mods in proptest::collection::vec(
                prop_oneof![
                    Just(Modifier::Meta),
                    Just(Modifier::Ctrl),
                    Just(Modifier::Alt),
                    Just(Modifier::Shift),
                ],
                0..4,
            ),
            key in prop_oneof![
                proptest::char::range('a', 'z').prop_map(Key::Char),
                proptest::char::range('0', '9').prop_map(Key::Char),
                Just(Key::Char(',')),
                Just(Key::Enter),
                Just(Key::PageDown),
                (1u8..=24).prop_map(Key::F),
            ],
        ) {
            let combo = KeyCombo::new(mods, key);
            let reparsed = KeyCombo::parse(&combo.to_string()).unwrap();
            prop_assert_eq!(reparsed, combo);
        }
    }
}
