//! Locators: declarative, re-evaluatable component queries.
//!
//! A [`Locator`] is pure data: an AND of [`Predicate`]s plus an optional
//! [`Scope`]. Evaluating it walks a fresh snapshot of the tree in document
//! order (depth first, children in declared order). Nothing is cached, so
//! the same locator can be evaluated any number of times while the UI
//! changes underneath it.
//!
//! A scoped locator only ever matches strict descendants of its scope root.
//! When the scope root has moved or vanished since it was resolved, the scope
//! is re-derived from the locator that produced it.

mod handle;
mod predicate;
mod xpath;

pub use handle::ResolvedHandle;
pub use predicate::{Predicate, TextPattern};

use crate::component::{Component, NodePath};
use crate::result::{StagehandError, StagehandResult};
use crate::session::{ApplicationSession, TreeQuery};
use std::fmt;

/// Search root for a scoped locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    root: NodePath,
    /// Locator that produced the root, and which of its matches it was
    origin: Option<(Box<Locator>, usize)>,
}

impl Scope {
    /// Scope rooted at a fixed path, never re-derived
    #[must_use]
    pub const fn at(root: NodePath) -> Self {
        Self { root, origin: None }
    }

    /// Scope rooted at the `index`-th match of `origin`
    #[must_use]
    pub fn derived(root: NodePath, origin: Locator, index: usize) -> Self {
        Self {
            root,
            origin: Some((Box::new(origin), index)),
        }
    }

    /// Root path as last resolved
    #[must_use]
    pub const fn root(&self) -> &NodePath {
        &self.root
    }

    /// Locator the root was resolved from
    #[must_use]
    pub fn origin(&self) -> Option<&Locator> {
        self.origin.as_ref().map(|(locator, _)| locator.as_ref())
    }

    /// Current snapshot of the scope root, re-deriving it when the
    /// recorded path no longer holds the node the origin locator describes
    fn snapshot(&self, session: &dyn ApplicationSession) -> StagehandResult<Option<Component>> {
        let at_path = session
            .query_tree(&TreeQuery::Subtree(self.root.clone()))?
            .into_iter()
            .next();

        let Some((origin, index)) = &self.origin else {
            return Ok(at_path);
        };
        if let Some(node) = at_path {
            if origin.matches(&node) {
                return Ok(Some(node));
            }
        }

        let rederived = origin.resolve_all(session)?.into_iter().nth(*index);
        tracing::debug!(
            event = "stagehand.locator.scope_rederived",
            origin = %origin,
            previous_root = %self.root,
            found = rederived.is_some(),
        );
        Ok(rederived)
    }
}

/// A declarative component query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locator {
    predicates: Vec<Predicate>,
    scope: Option<Scope>,
}

impl Locator {
    /// Matches every component
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Matches components with the given tag
    #[must_use]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::any().and(Predicate::Tag(tag.into()))
    }

    /// Parse the restricted XPath form, e.g. `//div[@text='OK']`
    pub fn parse(expression: &str) -> StagehandResult<Self> {
        Ok(Self {
            predicates: xpath::parse(expression)?,
            scope: None,
        })
    }

    /// Add a predicate; a first tag predicate is kept in front
    #[must_use]
    pub fn and(mut self, predicate: Predicate) -> Self {
        let is_first_tag = matches!(predicate, Predicate::Tag(_))
            && !self.predicates.iter().any(|p| matches!(p, Predicate::Tag(_)));
        if is_first_tag {
            self.predicates.insert(0, predicate);
        } else {
            self.predicates.push(predicate);
        }
        self
    }

    /// `class` contains
    #[must_use]
    pub fn class_contains(self, class: impl Into<String>) -> Self {
        self.and(Predicate::ClassContains(class.into()))
    }

    /// `text` equals
    #[must_use]
    pub fn text_eq(self, text: impl Into<String>) -> Self {
        self.and(Predicate::TextEquals(text.into()))
    }

    /// `text` contains
    #[must_use]
    pub fn text_contains(self, text: impl Into<String>) -> Self {
        self.and(Predicate::TextContains(text.into()))
    }

    /// `text` matches a regular expression
    pub fn text_matches(self, pattern: &str) -> StagehandResult<Self> {
        Ok(self.and(Predicate::TextMatches(TextPattern::new(pattern)?)))
    }

    /// Attribute equals (textual comparison)
    #[must_use]
    pub fn attr_eq(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.and(Predicate::attribute_equals(key, value))
    }

    /// Attribute contains (textual comparison)
    #[must_use]
    pub fn attr_contains(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.and(Predicate::attribute_contains(key, value))
    }

    /// Enabled state equals
    #[must_use]
    pub fn enabled(self, enabled: bool) -> Self {
        self.and(Predicate::Enabled(enabled))
    }

    /// Restrict matching to the subtree below a resolved handle
    #[must_use]
    pub fn within(self, handle: &ResolvedHandle) -> Self {
        self.within_scope(handle.scope())
    }

    /// Restrict matching to the subtree below `scope`
    #[must_use]
    pub fn within_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Same predicates, optionally rescoped
    #[must_use]
    pub fn with_scope(&self, scope: Option<Scope>) -> Self {
        Self {
            predicates: self.predicates.clone(),
            scope,
        }
    }

    /// Predicates in evaluation order
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Search root, if scoped
    #[must_use]
    pub const fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    /// Whether one component satisfies every predicate (scope not considered)
    #[must_use]
    pub fn matches(&self, component: &Component) -> bool {
        self.predicates.iter().all(|p| p.matches(component))
    }

    /// Every match, in document order. An empty result is not an error.
    pub fn resolve_all(&self, session: &dyn ApplicationSession) -> StagehandResult<Vec<Component>> {
        let matches: Vec<Component> = match &self.scope {
            None => session
                .query_tree(&TreeQuery::Forest)?
                .iter()
                .flat_map(Component::walk)
                .filter(|c| self.matches(c))
                .cloned()
                .collect(),
            Some(scope) => match scope.snapshot(session)? {
                Some(root) => root
                    .descendants()
                    .filter(|c| self.matches(c))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            },
        };

        tracing::trace!(
            event = "stagehand.locator.resolved",
            locator = %self,
            match_count = matches.len(),
        );
        Ok(matches)
    }

    /// Exactly one match, or `NotFound` / `AmbiguousMatch`
    pub fn resolve_one(&self, session: &dyn ApplicationSession) -> StagehandResult<Component> {
        let mut matches = self.resolve_all(session)?;
        match matches.len() {
            0 => Err(StagehandError::NotFound {
                locator: self.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            match_count => Err(StagehandError::AmbiguousMatch {
                locator: self.to_string(),
                match_count,
            }),
        }
    }

    /// First match in document order, or `NotFound`
    pub fn resolve_first(&self, session: &dyn ApplicationSession) -> StagehandResult<Component> {
        self.resolve_all(session)?
            .into_iter()
            .next()
            .ok_or_else(|| StagehandError::NotFound {
                locator: self.to_string(),
            })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.predicates.iter().peekable();
        match rest.peek() {
            Some(Predicate::Tag(tag)) => {
                write!(f, "//{tag}")?;
                let _ = rest.next();
            }
            _ => f.write_str("//*")?,
        }

        let terms: Vec<String> = rest.map(ToString::to_string).collect();
        if !terms.is_empty() {
            write!(f, "[{}]", terms.join(" and "))?;
        }
        if let Some(scope) = &self.scope {
            write!(f, " in {}", scope.root)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Locator {
    type Err = StagehandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
