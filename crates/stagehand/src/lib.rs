//! Stagehand: drive a live application's component tree from Rust.
//!
//! Flows query an introspectable UI tree through an [`ApplicationSession`],
//! wait for asynchronous state changes, dispatch synthetic input and read
//! state back for assertions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Facade (page object)                                            │
//! │    │ named, scoped Locators                                      │
//! │    ▼                                                             │
//! │  Flow ──► Waiter ──poll──► Locator ──query_tree──► Session       │
//! │    │        │ ResolvedHandle                                     │
//! │    ├──► Dispatcher ──dispatch_input───────────────► Session      │
//! │    └──► state::read_attribute ──► typed value / error            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on one thread; the only suspension is the waiter's
//! bounded poll sleep.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays))]

mod component;
mod result;

/// Key combos, mouse buttons and the primitive input events sent to a session
pub mod event;

/// Locator engine: predicates, textual queries, scopes and resolved handles
pub mod locator;

/// The application session collaborator
pub mod session;

/// Time source for polling, with a virtual clock for tests
pub mod clock;

/// Wait engine: polling with deadlines
pub mod wait;

/// Action dispatcher
pub mod action;

/// Typed attribute reads
pub mod state;

/// Flow configuration
pub mod config;

/// Tracing subscriber setup
pub mod logging;

/// Flow runner and its state machine
pub mod flow;

/// Page object composition
pub mod page_object;

/// In-memory session for tests
pub mod testing;

pub use action::{Dispatcher, KeyTarget};
pub use clock::{Clock, FakeClock, SharedClock, SystemClock};
pub use component::{keys, place_forest, AttrValue, Component, NodePath, Walk};
pub use config::StagehandConfig;
pub use event::{InputEvent, Key, KeyCombo, Modifier, MouseButton};
pub use flow::{Flow, FlowOutcome, FlowReport, FlowState, Transition};
pub use locator::{Locator, Predicate, ResolvedHandle, Scope, TextPattern};
pub use page_object::{Facade, FacadeDef, Page};
pub use result::{StagehandError, StagehandResult};
pub use session::{ApplicationSession, TreeQuery};
pub use state::{read_attribute, AttributeRead, FromAttribute};
pub use wait::{Expectation, WaitCondition, WaitOptions, WaitResult, Waiter};
