use super::{Locator, Scope};
use crate::component::Component;
use crate::result::{StagehandError, StagehandResult};
use crate::session::ApplicationSession;

/// A successful resolution: one or more component snapshots plus the
/// locator that produced them.
///
/// Only the engines construct handles, which is what keeps actions from
/// ever targeting a bare locator. A handle is a snapshot; call
/// [`ResolvedHandle::refresh`] to observe later state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHandle {
    locator: Locator,
    /// Never empty
    components: Vec<Component>,
}

impl ResolvedHandle {
    pub(crate) fn from_matches(locator: Locator, components: Vec<Component>) -> Option<Self> {
        if components.is_empty() {
            None
        } else {
            Some(Self {
                locator,
                components,
            })
        }
    }

    /// Primary (first in document order) match
    #[must_use]
    pub fn component(&self) -> &Component {
        &self.components[0]
    }

    /// Alias of [`Self::component`]
    #[must_use]
    pub fn first(&self) -> &Component {
        self.component()
    }

    /// Every match in document order
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Number of matches, at least one
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Always false; present for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Locator that produced this handle
    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Scope rooted at the primary match, re-derivable from this handle's locator
    #[must_use]
    pub fn scope(&self) -> Scope {
        Scope::derived(self.component().path().clone(), self.locator.clone(), 0)
    }

    /// Scope rooted at the `index`-th match
    #[must_use]
    pub fn scope_at(&self, index: usize) -> Option<Scope> {
        self.components
            .get(index)
            .map(|c| Scope::derived(c.path().clone(), self.locator.clone(), index))
    }

    /// Re-resolve through the locator; `StaleHandle` if nothing matches any more
    pub fn refresh(&self, session: &dyn ApplicationSession) -> StagehandResult<Self> {
        let components = self.locator.resolve_all(session)?;
        Self::from_matches(self.locator.clone(), components).ok_or_else(|| {
            StagehandError::StaleHandle {
                locator: self.locator.to_string(),
            }
        })
    }

    /// Locator plus the primary match, for errors and logs
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} -> {}", self.locator, self.component().describe())
    }
}
