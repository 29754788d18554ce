//! Wait engine: bounded polling of locators until a condition holds.
//!
//! Every wait evaluates immediately, sleeps `poll_interval` between
//! attempts (clamped so it never sleeps past the deadline) and performs one
//! last evaluation at the deadline before failing. A wait therefore fails no
//! earlier than its timeout `T` and no later than `T` plus one evaluation.
//! Session errors end the wait at once; only "not yet" is retried.

use crate::clock::Clock;
use crate::component::{keys, Component};
use crate::locator::{Locator, ResolvedHandle};
use crate::result::{StagehandError, StagehandResult};
use crate::session::ApplicationSession;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for element waits (5 seconds)
pub const DEFAULT_ELEMENT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval for element waits (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default timeout for background readiness (5 minutes)
pub const DEFAULT_READINESS_TIMEOUT_MS: u64 = 300_000;

/// Default polling interval for background readiness (1 second)
pub const DEFAULT_READINESS_POLL_INTERVAL_MS: u64 = 1_000;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Timeout and poll interval of one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_ELEMENT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Element wait defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Background readiness defaults (minutes, not seconds)
    #[must_use]
    pub const fn readiness() -> Self {
        Self {
            timeout_ms: DEFAULT_READINESS_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_READINESS_POLL_INTERVAL_MS,
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as Duration, at least 1ms so a wait never spins
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        if self.poll_interval_ms == 0 {
            Duration::from_millis(1)
        } else {
            Duration::from_millis(self.poll_interval_ms)
        }
    }
}

// =============================================================================
// EXPECTATIONS
// =============================================================================

/// Predicate over the matches of one locator evaluation
#[derive(Clone)]
pub enum Expectation {
    /// At least one match
    Exists,
    /// Exactly this many matches
    Count(usize),
    /// No match
    Gone,
    /// The first match has the attribute with this textual value
    AttributeEquals {
        /// Attribute key
        key: String,
        /// Expected text
        value: String,
    },
    /// Match filter on the first match's enabled state; a missing attribute
    /// counts as enabled here, unlike [`crate::state::is_enabled`]
    Enabled(bool),
    /// Caller-supplied check over every match
    Custom {
        /// Shown in logs and errors
        description: String,
        /// The check
        check: Arc<dyn Fn(&[Component]) -> bool + Send + Sync>,
    },
}

impl Expectation {
    /// The first match's `selected` attribute equals `selected`
    #[must_use]
    pub fn selected(selected: bool) -> Self {
        Self::attribute(keys::SELECTED, selected.to_string())
    }

    /// The first match's attribute equals `value`
    #[must_use]
    pub fn attribute(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AttributeEquals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Custom check with a description
    #[must_use]
    pub fn custom<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&[Component]) -> bool + Send + Sync + 'static,
    {
        Self::Custom {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    /// Whether the matches of one evaluation satisfy the expectation
    #[must_use]
    pub fn is_met(&self, matches: &[Component]) -> bool {
        match self {
            Self::Exists => !matches.is_empty(),
            Self::Count(n) => matches.len() == *n,
            Self::Gone => matches.is_empty(),
            Self::AttributeEquals { key, value } => matches
                .first()
                .and_then(|c| c.attribute_text(key))
                .is_some_and(|a| a == value.as_str()),
            Self::Enabled(expected) => matches.first().is_some_and(|c| {
                c.attribute_text(keys::ENABLED).map_or(true, |a| a == "true") == *expected
            }),
            Self::Custom { check, .. } => check(matches),
        }
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom { description, .. } => f
                .debug_struct("Custom")
                .field("description", description)
                .finish_non_exhaustive(),
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists => f.write_str("at least one match"),
            Self::Count(n) => write!(f, "exactly {n} matches"),
            Self::Gone => f.write_str("no match"),
            Self::AttributeEquals { key, value } => write!(f, "{key} = '{value}'"),
            Self::Enabled(b) => write!(f, "enabled = {b}"),
            Self::Custom { description, .. } => f.write_str(description),
        }
    }
}

/// A locator plus what its matches must satisfy
#[derive(Debug, Clone)]
pub struct WaitCondition {
    /// Locator evaluated on every attempt
    pub locator: Locator,
    /// Expectation over its matches
    pub expectation: Expectation,
}

impl WaitCondition {
    /// Create a condition
    #[must_use]
    pub const fn new(locator: Locator, expectation: Expectation) -> Self {
        Self {
            locator,
            expectation,
        }
    }

    /// At least one match
    #[must_use]
    pub const fn exists(locator: Locator) -> Self {
        Self::new(locator, Expectation::Exists)
    }

    /// No match
    #[must_use]
    pub const fn gone(locator: Locator) -> Self {
        Self::new(locator, Expectation::Gone)
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.locator, self.expectation)
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// A satisfied wait
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of evaluations, at least one
    pub attempts: usize,
    /// Description of what was waited for
    pub waited_for: String,
    /// Matches of the satisfying evaluation
    pub matches: Vec<Component>,
}

// =============================================================================
// WAITER
// =============================================================================

/// Polls a session on behalf of one flow
pub struct Waiter<'a> {
    session: &'a dyn ApplicationSession,
    clock: &'a dyn Clock,
}

impl fmt::Debug for Waiter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl<'a> Waiter<'a> {
    /// Create a waiter over a borrowed session
    #[must_use]
    pub fn new(session: &'a dyn ApplicationSession, clock: &'a dyn Clock) -> Self {
        Self { session, clock }
    }

    /// Poll until `condition` holds or the deadline passes
    pub fn wait_for(
        &self,
        condition: &WaitCondition,
        options: &WaitOptions,
    ) -> StagehandResult<WaitResult> {
        let start = self.clock.now();
        let timeout = options.timeout();
        let interval = options.poll_interval();
        let mut attempts = 0;

        tracing::debug!(
            event = "stagehand.wait.started",
            condition = %condition,
            timeout_ms = options.timeout_ms,
            poll_interval_ms = options.poll_interval_ms,
        );

        loop {
            attempts += 1;
            let matches = condition.locator.resolve_all(self.session)?;
            let elapsed = self.clock.now().saturating_sub(start);

            if condition.expectation.is_met(&matches) {
                tracing::debug!(
                    event = "stagehand.wait.satisfied",
                    condition = %condition,
                    attempts = attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                );
                return Ok(WaitResult {
                    elapsed,
                    attempts,
                    waited_for: condition.to_string(),
                    matches,
                });
            }

            if elapsed >= timeout {
                tracing::warn!(
                    event = "stagehand.wait.deadline_exceeded",
                    condition = %condition,
                    attempts = attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    last_match_count = matches.len(),
                );
                return Err(StagehandError::DeadlineExceeded {
                    locator: condition.locator.to_string(),
                    expectation: condition.expectation.to_string(),
                    elapsed,
                });
            }

            tracing::trace!(
                event = "stagehand.wait.poll_retry",
                attempt = attempts,
                match_count = matches.len(),
            );
            self.clock.sleep(interval.min(timeout - elapsed));
        }
    }

    /// Poll until `condition` holds and hand back its matches as a handle.
    ///
    /// Conditions that can hold with no match (`Gone`, `Count(0)`) have no
    /// handle to give; use [`Self::wait_for`] for those.
    pub fn wait_until(
        &self,
        condition: &WaitCondition,
        options: &WaitOptions,
    ) -> StagehandResult<ResolvedHandle> {
        let result = self.wait_for(condition, options)?;
        ResolvedHandle::from_matches(condition.locator.clone(), result.matches).ok_or_else(|| {
            StagehandError::NotFound {
                locator: condition.locator.to_string(),
            }
        })
    }

    /// Wait for `locator` to match. With `strict`, more than one match at
    /// the moment it first matches is an `AmbiguousMatch`; otherwise the
    /// handle carries every match in document order.
    pub fn wait_found(
        &self,
        locator: &Locator,
        options: &WaitOptions,
        strict: bool,
    ) -> StagehandResult<ResolvedHandle> {
        let handle = self.wait_until(&WaitCondition::exists(locator.clone()), options)?;
        if strict && handle.len() > 1 {
            return Err(StagehandError::AmbiguousMatch {
                locator: locator.to_string(),
                match_count: handle.len(),
            });
        }
        Ok(handle)
    }

    /// Wait until `locator` has no match
    pub fn wait_for_gone(
        &self,
        locator: &Locator,
        options: &WaitOptions,
    ) -> StagehandResult<WaitResult> {
        self.wait_for(&WaitCondition::gone(locator.clone()), options)
    }

    /// Wait for the application's background work to settle.
    ///
    /// The session is asked in slices of one poll interval; a slice that
    /// comes back early is slept out so the session is not hammered.
    pub fn wait_for_readiness(&self, options: &WaitOptions) -> StagehandResult<WaitResult> {
        let start = self.clock.now();
        let timeout = options.timeout();
        let interval = options.poll_interval();
        let mut attempts = 0;

        tracing::info!(
            event = "stagehand.wait.readiness_started",
            timeout_ms = options.timeout_ms,
        );

        loop {
            attempts += 1;
            let attempt_start = self.clock.now();
            let remaining = timeout.saturating_sub(attempt_start.saturating_sub(start));
            let slice = interval.min(remaining);

            match self.session.wait_for_background_readiness(slice) {
                Ok(()) => {
                    let elapsed = self.clock.now().saturating_sub(start);
                    tracing::info!(
                        event = "stagehand.wait.readiness_completed",
                        attempts = attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                    );
                    return Ok(WaitResult {
                        elapsed,
                        attempts,
                        waited_for: "background readiness".to_string(),
                        matches: Vec::new(),
                    });
                }
                Err(StagehandError::ReadinessTimeout { .. }) => {}
                Err(e) => return Err(e),
            }

            let now = self.clock.now();
            let elapsed = now.saturating_sub(start);
            if elapsed >= timeout {
                tracing::warn!(
                    event = "stagehand.wait.readiness_timeout",
                    attempts = attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                );
                return Err(StagehandError::ReadinessTimeout { timeout });
            }

            let spent = now.saturating_sub(attempt_start);
            if spent < slice {
                self.clock.sleep((slice - spent).min(timeout - elapsed));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::testing::{FakeSession, TreeMutation};

    fn dialog() -> Vec<Component> {
        vec![Component::new("div")
            .with_child(Component::new("div").with_class("JBCheckBox").with_selected(false))
            .with_child(Component::new("div").with_class("JButton").with_text("OK"))]
    }

    fn checkbox() -> Locator {
        Locator::any().class_contains("CheckBox")
    }

    mod options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout(), Duration::from_secs(5));
            assert_eq!(opts.poll_interval(), Duration::from_millis(100));
            let ready = WaitOptions::readiness();
            assert_eq!(ready.timeout(), Duration::from_secs(300));
            assert!(ready.timeout() > opts.timeout() * 10);
        }

        #[test]
        fn test_builders_and_zero_interval() {
            let opts = WaitOptions::new().with_timeout(250).with_poll_interval(0);
            assert_eq!(opts.timeout_ms, 250);
            assert_eq!(opts.poll_interval(), Duration::from_millis(1));
        }

        #[test]
        fn test_serde_defaults_missing_fields() {
            let opts: WaitOptions = serde_yaml_ng::from_str("timeout_ms: 900").unwrap();
            assert_eq!(opts.timeout_ms, 900);
            assert_eq!(opts.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        }
    }

    mod expectation_tests {
        use super::*;

        #[test]
        fn test_is_met() {
            let on = Component::new("div").with_selected(true);
            let off = Component::new("div").with_selected(false).with_enabled(false);
            assert!(Expectation::Exists.is_met(&[on.clone()]));
            assert!(!Expectation::Exists.is_met(&[]));
            assert!(Expectation::Gone.is_met(&[]));
            assert!(Expectation::Count(2).is_met(&[on.clone(), off.clone()]));
            assert!(Expectation::selected(true).is_met(&[on.clone(), off.clone()]));
            assert!(!Expectation::selected(true).is_met(&[off.clone(), on.clone()]));
            assert!(!Expectation::selected(true).is_met(&[]));
            assert!(Expectation::Enabled(true).is_met(&[on.clone()]));
            assert!(Expectation::Enabled(false).is_met(&[off]));
            assert!(Expectation::custom("two", |m| m.len() == 2).is_met(&[on.clone(), on]));
        }

        #[test]
        fn test_display() {
            assert_eq!(Expectation::selected(true).to_string(), "selected = 'true'");
            let custom = Expectation::custom("tree expanded", |_| true);
            assert_eq!(custom.to_string(), "tree expanded");
            assert!(format!("{custom:?}").contains("tree expanded"));
        }
    }

    mod waiter_tests {
        use super::*;

        #[test]
        fn test_immediate_success_does_not_sleep() {
            let session = FakeSession::new(dialog());
            let clock = FakeClock::new();
            let waiter = Waiter::new(&session, &clock);
            let handle = waiter
                .wait_until(&WaitCondition::exists(checkbox()), &WaitOptions::default())
                .unwrap();
            assert_eq!(handle.len(), 1);
            assert_eq!(clock.sleep_count(), 0);
            assert_eq!(clock.now(), Duration::ZERO);
        }

        #[test]
        fn test_success_after_async_change() {
            let session = FakeSession::new(dialog());
            session.after_queries(3, TreeMutation::toggle_selected(checkbox()));
            let clock = FakeClock::new();
            let waiter = Waiter::new(&session, &clock);
            let result = waiter
                .wait_for(
                    &WaitCondition::new(checkbox(), Expectation::selected(true)),
                    &WaitOptions::default(),
                )
                .unwrap();
            assert_eq!(result.attempts, 4);
            assert_eq!(result.elapsed, Duration::from_millis(300));
        }

        #[test]
        fn test_deadline_with_final_evaluation() {
            let session = FakeSession::new(dialog());
            let clock = FakeClock::new();
            let waiter = Waiter::new(&session, &clock);
            let opts = WaitOptions::new().with_timeout(250).with_poll_interval(100);
            let err = waiter
                .wait_until(&WaitCondition::exists(Locator::any().text_eq("Cancel")), &opts)
                .unwrap_err();

            // evaluations at 0, 100, 200 and the boundary 250
            assert_eq!(session.query_count(), 4);
            assert_eq!(clock.now_ms(), 250);
            match err {
                StagehandError::DeadlineExceeded {
                    locator, elapsed, ..
                } => {
                    assert_eq!(locator, "//*[@text='Cancel']");
                    assert_eq!(elapsed, Duration::from_millis(250));
                }
                other => panic!("unexpected error {other}"),
            }
        }

        #[test]
        fn test_overrun_bounded_by_one_evaluation() {
            let clock = FakeClock::shared();
            let session = FakeSession::new(dialog())
                .with_query_cost(Arc::clone(&clock), Duration::from_millis(30));
            let waiter = Waiter::new(&session, &*clock);
            let opts = WaitOptions::new().with_timeout(250).with_poll_interval(100);
            let err = waiter
                .wait_until(&WaitCondition::exists(Locator::any().text_eq("Cancel")), &opts)
                .unwrap_err();

            // evaluations end at 30, 160 and 280; the last sleep is cut to 90
            assert_eq!(session.query_count(), 3);
            assert!(matches!(err, StagehandError::DeadlineExceeded { elapsed, .. }
                if elapsed == Duration::from_millis(280)));
            assert!(clock.now() <= opts.timeout() + Duration::from_millis(30));
        }

        #[test]
        fn test_zero_timeout_evaluates_once() {
            let session = FakeSession::new(dialog());
            let clock = FakeClock::new();
            let waiter = Waiter::new(&session, &clock);
            let opts = WaitOptions::new().with_timeout(0);
            assert!(waiter.wait_found(&checkbox(), &opts, true).is_ok());
            assert!(waiter
                .wait_found(&Locator::any().text_eq("nope"), &opts, true)
                .unwrap_err()
                .is_timeout());
            assert_eq!(session.query_count(), 2);
        }

        #[test]
        fn test_session_error_is_not_retried() {
            let session = FakeSession::new(dialog());
            session.fail_queries(Some("transport closed"));
            let clock = FakeClock::new();
            let waiter = Waiter::new(&session, &clock);
            let err = waiter
                .wait_found(&checkbox(), &WaitOptions::default(), true)
                .unwrap_err();
            assert_eq!(err.kind(), "session");
            assert_eq!(clock.sleep_count(), 0);
        }

        #[test]
        fn test_strict_ambiguity() {
            let session = FakeSession::new(dialog());
            let clock = FakeClock::new();
            let waiter = Waiter::new(&session, &clock);
            let all = Locator::tag("div");
            let err = waiter
                .wait_found(&all, &WaitOptions::default(), true)
                .unwrap_err();
            assert!(matches!(err, StagehandError::AmbiguousMatch { match_count: 3, .. }));
            let lenient = waiter.wait_found(&all, &WaitOptions::default(), false).unwrap();
            assert_eq!(lenient.len(), 3);
        }

        #[test]
        fn test_wait_for_gone() {
            let session = FakeSession::new(dialog());
            session.after_queries(
                1,
                TreeMutation::Remove {
                    target: Locator::any().text_eq("OK"),
                },
            );
            let clock = FakeClock::new();
            let waiter = Waiter::new(&session, &clock);
            let result = waiter
                .wait_for_gone(&Locator::any().text_eq("OK"), &WaitOptions::default())
                .unwrap();
            assert_eq!(result.attempts, 2);
            assert!(result.matches.is_empty());

            let err = waiter
                .wait_until(&WaitCondition::gone(Locator::any().text_eq("OK")), &WaitOptions::default())
                .unwrap_err();
            assert_eq!(err.kind(), "not_found");
        }

        #[test]
        fn test_readiness_success_and_timeout() {
            let session = FakeSession::new(dialog());
            let clock = FakeClock::new();
            let waiter = Waiter::new(&session, &clock);
            let result = waiter.wait_for_readiness(&WaitOptions::readiness()).unwrap();
            assert_eq!(result.attempts, 1);

            session.set_ready(false);
            let opts = WaitOptions::new().with_timeout(3_000).with_poll_interval(1_000);
            let err = waiter.wait_for_readiness(&opts).unwrap_err();
            assert!(matches!(err, StagehandError::ReadinessTimeout { .. }));
            assert_eq!(clock.now_ms(), 3_000);
            assert_eq!(session.readiness_checks(), 5);
        }
    }
}
