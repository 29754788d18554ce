//! In-memory application session for unit and integration tests.
//!
//! [`FakeSession`] holds a component forest, answers queries from it and
//! records every dispatched input event. Scripted [`TreeMutation`]s simulate
//! an application that updates its UI asynchronously: after a number of
//! queries, in response to a click on a matching component, or in response
//! to a key combo.
//!
//! # Example
//!
//! ```
//! use stagehand::testing::{FakeSession, TreeMutation};
//! use stagehand::{Component, Locator};
//!
//! let session = FakeSession::new(vec![
//!     Component::new("div").with_text("OK"),
//! ]);
//! session.on_click(
//!     Locator::any().text_eq("OK"),
//!     TreeMutation::Remove { target: Locator::any().text_eq("OK") },
//! );
//! ```

use crate::clock::{Clock, FakeClock};
use crate::component::{keys, locate, place_forest, AttrValue, Component, NodePath};
use crate::event::{InputEvent, KeyCombo};
use crate::locator::{Locator, ResolvedHandle};
use crate::result::{StagehandError, StagehandResult};
use crate::session::{ApplicationSession, TreeQuery};
use crate::wait::{WaitOptions, Waiter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A change applied to the fake tree. Targets are matched by predicates
/// alone, anywhere in the forest.
#[derive(Debug, Clone)]
pub enum TreeMutation {
    /// Set an attribute on every match
    SetAttribute {
        /// Components to change
        target: Locator,
        /// Attribute key
        key: String,
        /// New value
        value: AttrValue,
    },
    /// Flip a boolean attribute (`Bool` or `"true"`/`"false"` text) on every
    /// match; a missing attribute becomes `"true"`
    Toggle {
        /// Components to change
        target: Locator,
        /// Attribute key
        key: String,
    },
    /// Insert a child under the first match, clamped to its child count
    Insert {
        /// Parent component
        parent: Locator,
        /// Child position
        index: usize,
        /// New subtree
        component: Component,
    },
    /// Remove every match with its subtree
    Remove {
        /// Components to remove
        target: Locator,
    },
}

impl TreeMutation {
    /// Toggle `selected` on the target, what clicking a checkbox does
    #[must_use]
    pub fn toggle_selected(target: Locator) -> Self {
        Self::Toggle {
            target,
            key: keys::SELECTED.to_string(),
        }
    }

    fn apply_to(&self, forest: &mut Vec<Component>) {
        match self {
            Self::SetAttribute { target, key, value } => {
                for_each_match(forest, target, &mut |c| {
                    let _ = c.attributes_mut().insert(key.clone(), value.clone());
                });
            }
            Self::Toggle { target, key } => {
                for_each_match(forest, target, &mut |c| {
                    let flipped = match c.attribute(key) {
                        Some(AttrValue::Bool(b)) => AttrValue::Bool(!b),
                        Some(v) if v.as_text() == "true" => AttrValue::Text("false".into()),
                        _ => AttrValue::Text("true".into()),
                    };
                    let _ = c.attributes_mut().insert(key.clone(), flipped);
                });
            }
            Self::Insert {
                parent,
                index,
                component,
            } => {
                let path = forest
                    .iter()
                    .flat_map(Component::walk)
                    .find(|c| parent.matches(c))
                    .map(|c| c.path().clone());
                if let Some(node) = path.and_then(|p| locate_mut(forest, &p)) {
                    let children = node.children_mut();
                    let at = (*index).min(children.len());
                    children.insert(at, component.clone());
                }
            }
            Self::Remove { target } => remove_matching(forest, target),
        }
        *forest = place_forest(std::mem::take(forest));
    }
}

fn for_each_match(nodes: &mut [Component], target: &Locator, f: &mut dyn FnMut(&mut Component)) {
    for node in nodes {
        if target.matches(node) {
            f(node);
        }
        for_each_match(node.children_mut(), target, f);
    }
}

fn remove_matching(nodes: &mut Vec<Component>, target: &Locator) {
    nodes.retain(|n| !target.matches(n));
    for node in nodes {
        remove_matching(node.children_mut(), target);
    }
}

fn locate_mut<'a>(forest: &'a mut [Component], path: &NodePath) -> Option<&'a mut Component> {
    let (first, rest) = path.indices().split_first()?;
    let mut node = forest.get_mut(*first)?;
    for index in rest {
        node = node.children_mut().get_mut(*index)?;
    }
    Some(node)
}

#[derive(Debug, Clone)]
enum Trigger {
    /// Fire once more than this many queries have been answered
    AfterQueries(usize),
    /// Fire when a click lands on a match; delayed by this many queries
    Click(Locator, usize),
    /// Fire when the combo is pressed
    Key(KeyCombo),
}

#[derive(Debug)]
struct Script {
    trigger: Trigger,
    mutation: TreeMutation,
    repeat: bool,
}

#[derive(Debug, Default)]
struct State {
    forest: Vec<Component>,
    scripts: Vec<Script>,
    events: Vec<InputEvent>,
    queries: usize,
    ready: bool,
    readiness_checks: usize,
    query_failure: Option<String>,
}

impl State {
    fn fire_due_queries(&mut self) {
        let queries = self.queries;
        let (due, pending): (Vec<Script>, Vec<Script>) = std::mem::take(&mut self.scripts)
            .into_iter()
            .partition(|s| matches!(s.trigger, Trigger::AfterQueries(n) if queries > n));
        self.scripts = pending;
        for script in due {
            script.mutation.apply_to(&mut self.forest);
        }
    }

    fn react_to(&mut self, event: &InputEvent) {
        let mut fired = Vec::new();
        let mut scheduled = Vec::new();
        for (i, script) in self.scripts.iter().enumerate() {
            let hit = match (&script.trigger, event) {
                (Trigger::Click(locator, _), InputEvent::MouseUp { target, .. }) => {
                    locate(&self.forest, target).is_some_and(|c| locator.matches(c))
                }
                (Trigger::Key(combo), InputEvent::KeyDown { key, modifiers, .. }) => {
                    combo.key() == *key && combo.modifiers() == modifiers.as_slice()
                }
                _ => false,
            };
            if !hit {
                continue;
            }
            match script.trigger {
                Trigger::Click(_, delay) if delay > 0 => scheduled.push(Script {
                    trigger: Trigger::AfterQueries(self.queries + delay),
                    mutation: script.mutation.clone(),
                    repeat: false,
                }),
                _ => fired.push(i),
            }
        }

        for i in &fired {
            self.scripts[*i].mutation.clone().apply_to(&mut self.forest);
        }
        let mut index = 0;
        self.scripts.retain(|s| {
            let keep = s.repeat || !fired.contains(&index);
            index += 1;
            keep
        });
        self.scripts.extend(scheduled);
    }
}

/// Scriptable in-memory [`ApplicationSession`]
#[derive(Debug)]
pub struct FakeSession {
    state: Mutex<State>,
    query_cost: Option<(Arc<FakeClock>, Duration)>,
}

impl FakeSession {
    /// Session over a forest of top-level components; starts ready
    #[must_use]
    pub fn new(forest: Vec<Component>) -> Self {
        Self {
            state: Mutex::new(State {
                forest: place_forest(forest),
                ready: true,
                ..State::default()
            }),
            query_cost: None,
        }
    }

    /// Charge `cost` of virtual time on `clock` for every query
    #[must_use]
    pub fn with_query_cost(mut self, clock: Arc<FakeClock>, cost: Duration) -> Self {
        self.query_cost = Some((clock, cost));
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn script(&self, trigger: Trigger, mutation: TreeMutation, repeat: bool) {
        self.lock().scripts.push(Script {
            trigger,
            mutation,
            repeat,
        });
    }

    /// Apply a mutation now
    pub fn apply(&self, mutation: &TreeMutation) {
        mutation.apply_to(&mut self.lock().forest);
    }

    /// Apply `mutation` once `queries` more queries have been answered
    pub fn after_queries(&self, queries: usize, mutation: TreeMutation) {
        let due = self.query_count() + queries;
        self.script(Trigger::AfterQueries(due), mutation, false);
    }

    /// Apply `mutation` on every click that lands on a match of `target`
    pub fn on_click(&self, target: Locator, mutation: TreeMutation) {
        self.script(Trigger::Click(target, 0), mutation, true);
    }

    /// Like [`Self::on_click`], but the change only becomes visible after
    /// `queries` further queries, as with a UI that repaints later
    pub fn on_click_delayed(&self, target: Locator, queries: usize, mutation: TreeMutation) {
        self.script(Trigger::Click(target, queries), mutation, true);
    }

    /// Apply `mutation` once when `combo` is pressed
    pub fn on_key(&self, combo: KeyCombo, mutation: TreeMutation) {
        self.script(Trigger::Key(combo), mutation, false);
    }

    /// Set whether background readiness succeeds
    pub fn set_ready(&self, ready: bool) {
        self.lock().ready = ready;
    }

    /// Make every query fail with a session error, or clear the failure
    pub fn fail_queries(&self, message: Option<&str>) {
        self.lock().query_failure = message.map(str::to_string);
    }

    /// Current forest
    #[must_use]
    pub fn forest(&self) -> Vec<Component> {
        self.lock().forest.clone()
    }

    /// Every dispatched event, in order
    #[must_use]
    pub fn events(&self) -> Vec<InputEvent> {
        self.lock().events.clone()
    }

    /// Targets of completed clicks, in order
    #[must_use]
    pub fn clicked_paths(&self) -> Vec<NodePath> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                InputEvent::MouseUp { target, .. } => Some(target.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of completed clicks
    #[must_use]
    pub fn click_count(&self) -> usize {
        self.clicked_paths().len()
    }

    /// Number of queries answered so far
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.lock().queries
    }

    /// Number of readiness checks
    #[must_use]
    pub fn readiness_checks(&self) -> usize {
        self.lock().readiness_checks
    }

    /// Handle over every current match of `locator`, from a single
    /// zero-timeout wait
    pub fn find_now(&self, locator: &Locator) -> StagehandResult<ResolvedHandle> {
        let clock = FakeClock::new();
        Waiter::new(self, &clock).wait_found(locator, &WaitOptions::new().with_timeout(0), false)
    }
}

impl ApplicationSession for FakeSession {
    fn query_tree(&self, query: &TreeQuery) -> StagehandResult<Vec<Component>> {
        let mut state = self.lock();
        if let Some(message) = &state.query_failure {
            return Err(StagehandError::Session {
                message: message.clone(),
            });
        }
        state.queries += 1;
        state.fire_due_queries();
        if let Some((clock, cost)) = &self.query_cost {
            clock.advance(*cost);
        }

        Ok(match query {
            TreeQuery::Forest => state.forest.clone(),
            TreeQuery::Subtree(path) => locate(&state.forest, path).cloned().into_iter().collect(),
        })
    }

    fn dispatch_input(&self, event: &InputEvent) -> StagehandResult<()> {
        let mut state = self.lock();
        state.events.push(event.clone());
        state.react_to(event);
        Ok(())
    }

    fn wait_for_background_readiness(&self, timeout: Duration) -> StagehandResult<()> {
        let mut state = self.lock();
        state.readiness_checks += 1;
        if state.ready {
            Ok(())
        } else {
            if let Some((clock, _)) = &self.query_cost {
                clock.sleep(timeout);
            }
            Err(StagehandError::ReadinessTimeout { timeout })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event::MouseButton;

    fn checkbox_tree() -> Vec<Component> {
        vec![Component::new("div")
            .with_child(Component::new("div").with_class("JBCheckBox").with_selected(false))
            .with_child(Component::new("div").with_class("JButton").with_text("OK"))]
    }

    fn click(session: &FakeSession, path: NodePath) {
        for event in [
            InputEvent::MouseDown {
                target: path.clone(),
                button: MouseButton::Left,
            },
            InputEvent::MouseUp {
                target: path,
                button: MouseButton::Left,
            },
        ] {
            session.dispatch_input(&event).unwrap();
        }
    }

    fn selected(session: &FakeSession) -> String {
        Locator::any()
            .class_contains("CheckBox")
            .resolve_one(session)
            .unwrap()
            .attribute_text(keys::SELECTED)
            .unwrap()
            .into_owned()
    }

    #[test]
    fn test_queries_are_counted() {
        let session = FakeSession::new(checkbox_tree());
        let _ = session.query_tree(&TreeQuery::Forest).unwrap();
        let sub = session
            .query_tree(&TreeQuery::Subtree(NodePath::from_indices([0, 1])))
            .unwrap();
        assert_eq!(sub.len(), 1);
        assert_eq!(session.query_count(), 2);
        assert!(session
            .query_tree(&TreeQuery::Subtree(NodePath::from_indices([0, 9])))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_after_queries() {
        let session = FakeSession::new(checkbox_tree());
        session.after_queries(
            2,
            TreeMutation::toggle_selected(Locator::any().class_contains("CheckBox")),
        );
        assert_eq!(selected(&session), "false");
        assert_eq!(selected(&session), "false");
        assert_eq!(selected(&session), "true");
    }

    #[test]
    fn test_on_click_toggles_each_time() {
        let session = FakeSession::new(checkbox_tree());
        let checkbox = Locator::any().class_contains("CheckBox");
        session.on_click(checkbox.clone(), TreeMutation::toggle_selected(checkbox));
        let path = NodePath::from_indices([0, 0]);
        click(&session, path.clone());
        assert_eq!(selected(&session), "true");
        click(&session, path.clone());
        assert_eq!(selected(&session), "false");
        assert_eq!(session.clicked_paths(), vec![path.clone(), path]);
    }

    #[test]
    fn test_click_elsewhere_does_nothing() {
        let session = FakeSession::new(checkbox_tree());
        let checkbox = Locator::any().class_contains("CheckBox");
        session.on_click(checkbox.clone(), TreeMutation::toggle_selected(checkbox));
        click(&session, NodePath::from_indices([0, 1]));
        assert_eq!(selected(&session), "false");
        assert_eq!(session.click_count(), 1);
    }

    #[test]
    fn test_on_click_delayed() {
        let session = FakeSession::new(checkbox_tree());
        let checkbox = Locator::any().class_contains("CheckBox");
        session.on_click_delayed(checkbox.clone(), 1, TreeMutation::toggle_selected(checkbox));
        click(&session, NodePath::from_indices([0, 0]));
        assert_eq!(selected(&session), "false");
        assert_eq!(selected(&session), "true");
    }

    #[test]
    fn test_on_key() {
        let session = FakeSession::new(vec![Component::new("frame")]);
        session.on_key(
            KeyCombo::parse("meta comma").unwrap(),
            TreeMutation::Insert {
                parent: Locator::tag("frame"),
                index: 0,
                component: Component::new("dialog").with_attr(keys::TITLE, "Settings"),
            },
        );
        for event in KeyCombo::parse("meta comma").unwrap().to_events(None) {
            session.dispatch_input(&event).unwrap();
        }
        let dialog = Locator::tag("dialog").resolve_one(&session).unwrap();
        assert_eq!(dialog.path().to_string(), "/0/0");
    }

    #[test]
    fn test_insert_clamps_and_replaces_paths() {
        let session = FakeSession::new(checkbox_tree());
        session.apply(&TreeMutation::Insert {
            parent: Locator::tag("div").text_eq("nothing"),
            index: 0,
            component: Component::new("x"),
        });
        assert!(Locator::tag("x").resolve_all(&session).unwrap().is_empty());

        session.apply(&TreeMutation::Insert {
            parent: Locator::any().class_contains("JButton"),
            index: 99,
            component: Component::new("x"),
        });
        let x = Locator::tag("x").resolve_one(&session).unwrap();
        assert_eq!(x.path().to_string(), "/0/1/0");
    }

    #[test]
    fn test_remove_and_set_attribute() {
        let session = FakeSession::new(checkbox_tree());
        session.apply(&TreeMutation::SetAttribute {
            target: Locator::any().text_eq("OK"),
            key: keys::ENABLED.to_string(),
            value: AttrValue::Bool(false),
        });
        assert!(Locator::any().enabled(false).resolve_one(&session).is_ok());
        session.apply(&TreeMutation::Remove {
            target: Locator::any().text_eq("OK"),
        });
        assert_eq!(session.forest()[0].children().len(), 1);
    }

    #[test]
    fn test_readiness_and_failures() {
        let session = FakeSession::new(checkbox_tree());
        assert!(session.wait_for_background_readiness(Duration::from_secs(1)).is_ok());
        session.set_ready(false);
        let err = session
            .wait_for_background_readiness(Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err.kind(), "readiness_timeout");
        assert_eq!(session.readiness_checks(), 2);

        session.fail_queries(Some("connection reset"));
        let err = session.query_tree(&TreeQuery::Forest).unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        session.fail_queries(None);
        assert!(session.query_tree(&TreeQuery::Forest).is_ok());
    }

    #[test]
    fn test_query_cost_advances_clock() {
        let clock = FakeClock::shared();
        let session = FakeSession::new(checkbox_tree())
            .with_query_cost(Arc::clone(&clock), Duration::from_millis(7));
        let _ = session.query_tree(&TreeQuery::Forest).unwrap();
        let _ = session.query_tree(&TreeQuery::Forest).unwrap();
        assert_eq!(clock.now_ms(), 14);
    }

    #[test]
    fn test_find_now_goes_through_one_wait() {
        let session = FakeSession::new(checkbox_tree());
        let handle = session.find_now(&Locator::tag("div")).unwrap();
        assert_eq!(handle.len(), 3);
        assert_eq!(session.query_count(), 1);

        let err = session.find_now(&Locator::any().text_eq("Cancel")).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(session.query_count(), 2);
    }
}
