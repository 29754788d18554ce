//! Action dispatcher: semantic actions lowered to primitive input events.
//!
//! Actions only accept a [`ResolvedHandle`], never a bare locator. Before
//! dispatching, the handle's primary component is checked against the live
//! tree; if its path is gone or now holds a different component the action
//! fails with `StaleHandle` instead of clicking whatever moved into place.
//! Actions are fire-and-forget: they never wait for the UI to react.

use crate::clock::Clock;
use crate::component::NodePath;
use crate::event::{InputEvent, KeyCombo, MouseButton};
use crate::locator::ResolvedHandle;
use crate::result::{StagehandError, StagehandResult};
use crate::session::{ApplicationSession, TreeQuery};
use std::fmt;
use std::time::Duration;

/// Where a key combo is delivered
#[derive(Debug, Clone, Copy)]
pub enum KeyTarget<'h> {
    /// Application-wide shortcut, no focused component
    Application,
    /// The primary component of a handle
    Handle(&'h ResolvedHandle),
}

/// Sends input events through a borrowed session
pub struct Dispatcher<'a> {
    session: &'a dyn ApplicationSession,
    clock: &'a dyn Clock,
    settle: Duration,
}

impl fmt::Debug for Dispatcher<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settle", &self.settle)
            .finish_non_exhaustive()
    }
}

impl<'a> Dispatcher<'a> {
    /// Dispatcher with no delay between primitive events
    #[must_use]
    pub fn new(session: &'a dyn ApplicationSession, clock: &'a dyn Clock) -> Self {
        Self {
            session,
            clock,
            settle: Duration::ZERO,
        }
    }

    /// Pause between the primitive events of one action
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Left click on the handle's primary component
    pub fn click(&self, handle: &ResolvedHandle) -> StagehandResult<()> {
        self.click_with(handle, MouseButton::Left)
    }

    /// Click with a specific button
    pub fn click_with(&self, handle: &ResolvedHandle, button: MouseButton) -> StagehandResult<()> {
        let target = self.live_path(handle)?;
        tracing::info!(
            event = "stagehand.action.click_dispatched",
            target = %handle.describe(),
            button = ?button,
        );
        self.send(&[
            InputEvent::MouseDown {
                target: target.clone(),
                button,
            },
            InputEvent::MouseUp { target, button },
        ])
    }

    /// Press a key combination, globally or on a handle
    pub fn press_key_combo(&self, target: KeyTarget<'_>, combo: &KeyCombo) -> StagehandResult<()> {
        let path = match target {
            KeyTarget::Application => None,
            KeyTarget::Handle(handle) => Some(self.live_path(handle)?),
        };
        tracing::info!(
            event = "stagehand.action.keys_dispatched",
            combo = %combo,
            target = %path
                .as_ref()
                .map_or_else(|| "application".to_string(), ToString::to_string),
        );
        self.send(&combo.to_events(path.as_ref()))
    }

    /// Deliver `text` to the handle's primary component
    pub fn type_text(&self, handle: &ResolvedHandle, text: &str) -> StagehandResult<()> {
        let target = self.live_path(handle)?;
        tracing::info!(
            event = "stagehand.action.text_dispatched",
            target = %handle.describe(),
            text_len = text.len(),
        );
        self.send(&[InputEvent::Text {
            target,
            text: text.to_string(),
        }])
    }

    /// Path of the handle's primary component if it still holds a matching node
    fn live_path(&self, handle: &ResolvedHandle) -> StagehandResult<NodePath> {
        let path = handle.component().path().clone();
        let current = self
            .session
            .query_tree(&TreeQuery::Subtree(path.clone()))?
            .into_iter()
            .next();
        match current {
            Some(node) if handle.locator().matches(&node) => Ok(path),
            _ => {
                tracing::warn!(
                    event = "stagehand.action.stale_handle",
                    locator = %handle.locator(),
                    path = %path,
                );
                Err(StagehandError::StaleHandle {
                    locator: handle.locator().to_string(),
                })
            }
        }
    }

    fn send(&self, events: &[InputEvent]) -> StagehandResult<()> {
        for (i, event) in events.iter().enumerate() {
            if i > 0 && !self.settle.is_zero() {
                self.clock.sleep(self.settle);
            }
            tracing::trace!(event = "stagehand.action.input_sent", kind = event.name());
            self.session.dispatch_input(event)?;
        }
        Ok(())
    }
}
