//! The application session: the only door into the live UI.
//!
//! Launching the application and choosing a transport are the caller's
//! business. The core borrows a session for the duration of a flow and only
//! ever queries the tree, dispatches input and asks about readiness.

use crate::component::{Component, NodePath};
use crate::event::InputEvent;
use crate::result::StagehandResult;
use std::time::Duration;

/// What part of the tree a query should return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeQuery {
    /// Every top-level node with its full subtree
    Forest,
    /// The node at a path with its subtree, or nothing if the path is gone
    Subtree(NodePath),
}

/// Capability to introspect and drive a running application.
///
/// Implementations must return components with their [`NodePath`]s assigned
/// (see [`crate::place_forest`]), children in declared order.
/// Access is serialized by the caller; methods take `&self` so a session can
/// be shared by the engines of one flow.
pub trait ApplicationSession {
    /// Snapshot part of the component tree
    fn query_tree(&self, query: &TreeQuery) -> StagehandResult<Vec<Component>>;

    /// Deliver one primitive input event
    fn dispatch_input(&self, event: &InputEvent) -> StagehandResult<()>;

    /// Block until the application's background work has settled, or fail
    /// with [`crate::StagehandError::ReadinessTimeout`]
    fn wait_for_background_readiness(&self, timeout: Duration) -> StagehandResult<()>;
}

impl<S: ApplicationSession + ?Sized> ApplicationSession for &S {
    fn query_tree(&self, query: &TreeQuery) -> StagehandResult<Vec<Component>> {
        (**self).query_tree(query)
    }

    fn dispatch_input(&self, event: &InputEvent) -> StagehandResult<()> {
        (**self).dispatch_input(event)
    }

    fn wait_for_background_readiness(&self, timeout: Duration) -> StagehandResult<()> {
        (**self).wait_for_background_readiness(timeout)
    }
}

impl<S: ApplicationSession + ?Sized> ApplicationSession for Box<S> {
    fn query_tree(&self, query: &TreeQuery) -> StagehandResult<Vec<Component>> {
        (**self).query_tree(query)
    }

    fn dispatch_input(&self, event: &InputEvent) -> StagehandResult<()> {
        (**self).dispatch_input(event)
    }

    fn wait_for_background_readiness(&self, timeout: Duration) -> StagehandResult<()> {
        (**self).wait_for_background_readiness(timeout)
    }
}
