//! Flow runner: one scripted verification against a borrowed session.
//!
//! A [`Flow`] moves through
//! `Idle -> AwaitingReadiness -> Navigating -> AwaitingElement -> Acting -> Asserting`
//! as its operations run, and ends in `Passed` or `Failed`. The first error
//! any operation returns fails the flow; every later operation is refused
//! with `FlowTerminated`. There is no flow-level retry.
//!
//! ```
//! use stagehand::flow::{Flow, FlowOutcome};
//! use stagehand::testing::FakeSession;
//! use stagehand::{Component, Locator, StagehandConfig};
//!
//! let session = FakeSession::new(vec![Component::new("button").with_text("OK")]);
//! let report = Flow::new(&session, StagehandConfig::default()).run(|flow| {
//!     let ok = flow.wait_for(&Locator::tag("button").text_eq("OK"))?;
//!     flow.click(&ok)
//! });
//! assert!(matches!(report.outcome(), FlowOutcome::Passed));
//! ```

use crate::action::{Dispatcher, KeyTarget};
use crate::clock::{SharedClock, SystemClock};
use crate::config::StagehandConfig;
use crate::event::KeyCombo;
use crate::locator::{Locator, ResolvedHandle};
use crate::page_object::Facade;
use crate::result::{StagehandError, StagehandResult};
use crate::session::ApplicationSession;
use crate::state::{self, FromAttribute};
use crate::wait::{Expectation, WaitCondition, WaitOptions, WaitResult, Waiter};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Where a flow is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    /// Created, nothing run yet
    Idle,
    /// Waiting for background work to settle
    AwaitingReadiness,
    /// Sending an application-wide shortcut to reach a surface
    Navigating,
    /// Polling for a component
    AwaitingElement,
    /// Dispatching input to a resolved component
    Acting,
    /// Reading state back for checks
    Asserting,
    /// Finished without error
    Passed,
    /// Finished with an error
    Failed,
}

impl FlowState {
    /// Whether no further operation may run
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed)
    }

    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingReadiness => "awaiting_readiness",
            Self::Navigating => "navigating",
            Self::AwaitingElement => "awaiting_element",
            Self::Acting => "acting",
            Self::Asserting => "asserting",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// State left
    pub from: FlowState,
    /// State entered
    pub to: FlowState,
    /// Milliseconds since the flow started
    pub at_ms: u64,
}

/// How a finished flow ended
#[derive(Debug)]
pub enum FlowOutcome {
    /// Every operation succeeded
    Passed,
    /// An operation failed
    Failed {
        /// The error that ended the flow
        error: StagehandError,
        /// State the flow was in when it failed
        state: FlowState,
    },
}

impl FlowOutcome {
    /// Whether the flow passed
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Diagnostics of a finished flow
#[derive(Debug)]
pub struct FlowReport {
    /// Correlation id, also on the flow's tracing span
    pub flow_id: Uuid,
    /// Final verdict
    pub outcome: FlowOutcome,
    /// Every state change in order
    pub transitions: Vec<Transition>,
    /// Time from start to finish
    pub elapsed: Duration,
}

impl FlowReport {
    /// Final verdict
    #[must_use]
    pub const fn outcome(&self) -> &FlowOutcome {
        &self.outcome
    }

    /// Whether the flow passed
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.outcome.is_passed()
    }

    /// Sequence of states entered, starting with `Idle`
    #[must_use]
    pub fn states(&self) -> Vec<FlowState> {
        std::iter::once(FlowState::Idle)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }

    /// JSON summary for CI logs
    #[must_use]
    pub fn to_json(&self) -> String {
        let (outcome, failure) = match &self.outcome {
            FlowOutcome::Passed => ("passed", serde_json::Value::Null),
            FlowOutcome::Failed { error, state } => (
                "failed",
                serde_json::json!({
                    "kind": error.kind(),
                    "message": error.to_string(),
                    "locator": error.locator(),
                    "state": state,
                }),
            ),
        };
        serde_json::json!({
            "flow_id": self.flow_id,
            "outcome": outcome,
            "failure": failure,
            "elapsed_ms": self.elapsed.as_millis() as u64,
            "transitions": self.transitions,
        })
        .to_string()
    }
}

#[derive(Debug)]
struct FlowLog {
    state: FlowState,
    started: Duration,
    transitions: Vec<Transition>,
    /// State and error of the first failure
    failure: Option<(FlowState, StagehandError)>,
}

/// A single verification flow over a borrowed session
pub struct Flow<'a> {
    id: Uuid,
    session: &'a dyn ApplicationSession,
    clock: SharedClock,
    config: StagehandConfig,
    span: tracing::Span,
    log: RefCell<FlowLog>,
}

impl fmt::Debug for Flow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> Flow<'a> {
    /// New flow on the system clock
    pub fn new(session: &'a dyn ApplicationSession, config: StagehandConfig) -> Self {
        let id = Uuid::new_v4();
        let clock = SystemClock::shared();
        let started = clock.now();
        Self {
            id,
            session,
            clock,
            config,
            span: tracing::info_span!("flow", flow_id = %id),
            log: RefCell::new(FlowLog {
                state: FlowState::Idle,
                started,
                transitions: Vec::new(),
                failure: None,
            }),
        }
    }

    /// Use another clock; the flow's start is re-read from it
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.log.get_mut().started = clock.now();
        self.clock = clock;
        self
    }

    /// Correlation id
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current state
    pub fn state(&self) -> FlowState {
        self.log.borrow().state
    }

    /// Transitions so far
    pub fn transitions(&self) -> Vec<Transition> {
        self.log.borrow().transitions.clone()
    }

    /// Configuration in effect
    pub const fn config(&self) -> &StagehandConfig {
        &self.config
    }

    /// The borrowed session
    pub fn session(&self) -> &'a dyn ApplicationSession {
        self.session
    }

    // =========================================================================
    // Readiness and navigation
    // =========================================================================

    /// Wait for background work with the configured readiness options.
    /// May be called again at any point, e.g. after navigating.
    pub fn await_readiness(&self) -> StagehandResult<WaitResult> {
        self.await_readiness_with(&self.config.readiness)
    }

    /// Wait for background work with explicit options
    pub fn await_readiness_with(&self, options: &WaitOptions) -> StagehandResult<WaitResult> {
        self.step(FlowState::AwaitingReadiness, || {
            self.waiter().wait_for_readiness(options)
        })
    }

    /// Send an application-wide key combo such as `"meta comma"`
    pub fn navigate(&self, combo: &str) -> StagehandResult<()> {
        self.step(FlowState::Navigating, || {
            let combo = KeyCombo::parse(combo)?;
            self.dispatcher().press_key_combo(KeyTarget::Application, &combo)
        })
    }

    // =========================================================================
    // Waiting
    // =========================================================================

    /// Wait for `locator` with the element defaults and strictness
    pub fn wait_for(&self, locator: &Locator) -> StagehandResult<ResolvedHandle> {
        self.wait_for_with(locator, &self.config.element)
    }

    /// Wait for `locator` with explicit options
    pub fn wait_for_with(
        &self,
        locator: &Locator,
        options: &WaitOptions,
    ) -> StagehandResult<ResolvedHandle> {
        self.step(FlowState::AwaitingElement, || {
            self.waiter().wait_found(locator, options, self.config.strict)
        })
    }

    /// Wait until `expectation` holds over `locator`'s matches
    pub fn wait_until(
        &self,
        locator: &Locator,
        expectation: Expectation,
    ) -> StagehandResult<ResolvedHandle> {
        self.wait_until_with(locator, expectation, &self.config.element)
    }

    /// [`Self::wait_until`] with explicit options
    pub fn wait_until_with(
        &self,
        locator: &Locator,
        expectation: Expectation,
        options: &WaitOptions,
    ) -> StagehandResult<ResolvedHandle> {
        self.step(FlowState::AwaitingElement, || {
            self.waiter()
                .wait_until(&WaitCondition::new(locator.clone(), expectation), options)
        })
    }

    /// Wait until `locator` has no match
    pub fn wait_for_gone(&self, locator: &Locator) -> StagehandResult<WaitResult> {
        self.wait_for_gone_with(locator, &self.config.element)
    }

    /// [`Self::wait_for_gone`] with explicit options
    pub fn wait_for_gone_with(
        &self,
        locator: &Locator,
        options: &WaitOptions,
    ) -> StagehandResult<WaitResult> {
        self.step(FlowState::AwaitingElement, || {
            self.waiter().wait_for_gone(locator, options)
        })
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Click the handle's component
    pub fn click(&self, handle: &ResolvedHandle) -> StagehandResult<()> {
        self.step(FlowState::Acting, || self.dispatcher().click(handle))
    }

    /// Type into the handle's component
    pub fn type_text(&self, handle: &ResolvedHandle, text: &str) -> StagehandResult<()> {
        self.step(FlowState::Acting, || self.dispatcher().type_text(handle, text))
    }

    /// Press a key combo on a component or the whole application
    pub fn press_keys(&self, target: KeyTarget<'_>, combo: &str) -> StagehandResult<()> {
        self.step(FlowState::Acting, || {
            let combo = KeyCombo::parse(combo)?;
            self.dispatcher().press_key_combo(target, &combo)
        })
    }

    /// Select the component `locator` finds, clicking only if it is not
    /// selected yet, then wait until it reads as selected
    pub fn ensure_selected(&self, locator: &Locator) -> StagehandResult<ResolvedHandle> {
        self.ensure_selection_with(locator, true, &self.config.element)
    }

    /// Counterpart of [`Self::ensure_selected`]
    pub fn ensure_unselected(&self, locator: &Locator) -> StagehandResult<ResolvedHandle> {
        self.ensure_selection_with(locator, false, &self.config.element)
    }

    /// [`Self::ensure_selected`] (or unselected, with `wanted == false`) where
    /// both waits use `options`
    pub fn ensure_selection_with(
        &self,
        locator: &Locator,
        wanted: bool,
        options: &WaitOptions,
    ) -> StagehandResult<ResolvedHandle> {
        let handle = self.wait_for_with(locator, options)?;
        if self.is_selected(&handle)? == wanted {
            tracing::debug!(
                event = "stagehand.flow.selection_already_held",
                locator = %locator,
                selected = wanted,
            );
            return Ok(handle);
        }
        self.click(&handle)?;
        self.wait_until_with(locator, Expectation::selected(wanted), options)
    }

    // =========================================================================
    // Assertions
    // =========================================================================

    /// Typed attribute read
    pub fn read<T: FromAttribute>(&self, handle: &ResolvedHandle, key: &str) -> StagehandResult<T> {
        self.step(FlowState::Asserting, || state::read_attribute(handle, key))
    }

    /// Selection state
    pub fn is_selected(&self, handle: &ResolvedHandle) -> StagehandResult<bool> {
        self.step(FlowState::Asserting, || state::is_selected(handle))
    }

    /// Visible text
    pub fn text(&self, handle: &ResolvedHandle) -> StagehandResult<String> {
        self.step(FlowState::Asserting, || state::text(handle))
    }

    /// Fail the flow with `message` unless `condition` holds
    pub fn check(&self, condition: bool, message: impl Into<String>) -> StagehandResult<()> {
        self.step(FlowState::Asserting, || {
            if condition {
                Ok(())
            } else {
                Err(StagehandError::AssertionFailed {
                    message: message.into(),
                })
            }
        })
    }

    // =========================================================================
    // Page objects
    // =========================================================================

    /// Enter a top-level facade, resolving its root over the whole tree
    pub fn enter<'f, F: Facade<'f>>(&'f self) -> StagehandResult<F>
    where
        'a: 'f,
    {
        F::enter(self, None)
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Run `script` and finish with its result
    pub fn run<F>(self, script: F) -> FlowReport
    where
        F: FnOnce(&Self) -> StagehandResult<()>,
    {
        let result = script(&self);
        self.finish(result)
    }

    /// Close the flow. An error, or a failure recorded earlier and then
    /// swallowed by the caller, ends it as `Failed`; the report always
    /// carries the first error the flow recorded.
    pub fn finish(self, result: StagehandResult<()>) -> FlowReport {
        let _enter = self.span.enter();
        let recorded = self.log.borrow_mut().failure.take();
        let outcome = match (result, recorded) {
            (Err(_), Some((state, first))) => FlowOutcome::Failed { error: first, state },
            (Err(error), None) => {
                let state = self.state();
                self.fail(&error);
                FlowOutcome::Failed { error, state }
            }
            (Ok(()), Some((state, first))) => {
                tracing::warn!(
                    event = "stagehand.flow.failure_swallowed",
                    state = %state,
                    kind = first.kind(),
                );
                FlowOutcome::Failed { error: first, state }
            }
            (Ok(()), None) => {
                self.transition(FlowState::Passed);
                FlowOutcome::Passed
            }
        };

        let log = self.log.into_inner();
        let elapsed = self.clock.now().saturating_sub(log.started);
        tracing::info!(
            event = "stagehand.flow.finished",
            passed = outcome.is_passed(),
            elapsed_ms = elapsed.as_millis() as u64,
            transitions = log.transitions.len(),
        );
        FlowReport {
            flow_id: self.id,
            outcome,
            transitions: log.transitions,
            elapsed,
        }
    }

    /// Record a failure from a helper that runs outside any step
    pub(crate) fn record<T>(&self, result: StagehandResult<T>) -> StagehandResult<T> {
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    fn step<T>(
        &self,
        state: FlowState,
        op: impl FnOnce() -> StagehandResult<T>,
    ) -> StagehandResult<T> {
        let _enter = self.span.enter();
        let current = self.state();
        if current.is_terminal() {
            return Err(StagehandError::FlowTerminated {
                state: current.to_string(),
            });
        }
        self.transition(state);
        self.record(op())
    }

    fn transition(&self, to: FlowState) {
        let mut log = self.log.borrow_mut();
        if log.state == to {
            return;
        }
        let at_ms = self.clock.now().saturating_sub(log.started).as_millis() as u64;
        tracing::debug!(
            event = "stagehand.flow.transition",
            from = %log.state,
            to = %to,
            at_ms = at_ms,
        );
        let from = log.state;
        log.transitions.push(Transition { from, to, at_ms });
        log.state = to;
    }

    fn fail(&self, error: &StagehandError) {
        let state = self.state();
        if state.is_terminal() {
            return;
        }
        tracing::error!(
            event = "stagehand.flow.failed",
            state = %state,
            kind = error.kind(),
            error = %error,
        );
        self.log.borrow_mut().failure = Some((state, error.replicate()));
        self.transition(FlowState::Failed);
    }

    fn waiter(&self) -> Waiter<'_> {
        Waiter::new(self.session, self.clock.as_ref())
    }

    fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(self.session, self.clock.as_ref()).with_settle(self.config.action_settle())
    }
}
