//! Page objects: facades over a scoped part of the component tree.
//!
//! A facade type declares a [`FacadeDef`] table: an optional root locator and
//! a fixed set of named child locators. Entering a facade resolves its root
//! (waiting for it) inside the parent's scope; every named locator is then
//! evaluated inside that root. Naming a locator never resolves it, and no
//! handle is cached: each action waits for its target afresh.
//!
//! ```
//! use stagehand::page_object::{Facade, FacadeDef, Page};
//! use stagehand::{facade_def, StagehandResult};
//!
//! struct Settings<'f>(Page<'f>);
//!
//! impl<'f> Facade<'f> for Settings<'f> {
//!     const DEF: FacadeDef = facade_def! {
//!         name: "Settings",
//!         root: "//dialog[@title='Settings']",
//!         locators: {
//!             "ok" => "//button[@text='OK']",
//!         }
//!     };
//!
//!     fn from_page(page: Page<'f>) -> Self {
//!         Self(page)
//!     }
//! }
//!
//! impl Settings<'_> {
//!     fn confirm(&self) -> StagehandResult<()> {
//!         self.0.click("ok")
//!     }
//! }
//! ```

use crate::action::KeyTarget;
use crate::flow::Flow;
use crate::locator::{Locator, ResolvedHandle, Scope};
use crate::result::{StagehandError, StagehandResult};
use crate::state::FromAttribute;
use crate::wait::{Expectation, WaitOptions, WaitResult};
use std::collections::HashSet;

/// Static description of a facade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacadeDef {
    /// Facade name, used in errors and logs
    pub name: &'static str,
    /// Root locator, relative to the parent scope; `None` binds the parent
    /// scope itself (the whole tree for a top-level facade)
    pub root: Option<&'static str>,
    /// Named child locators in declaration order
    pub locators: &'static [(&'static str, &'static str)],
}

impl FacadeDef {
    /// Expression declared under `name`
    #[must_use]
    pub fn expression(&self, name: &str) -> Option<&'static str> {
        self.locators
            .iter()
            .find(|(declared, _)| *declared == name)
            .map(|(_, expression)| *expression)
    }

    /// Declared names in order
    #[must_use]
    pub fn locator_names(&self) -> Vec<&'static str> {
        self.locators.iter().map(|(name, _)| *name).collect()
    }

    /// Check that every expression parses and no name is declared twice
    pub fn validate(&self) -> StagehandResult<()> {
        if let Some(root) = self.root {
            let _ = Locator::parse(root)?;
        }
        let mut seen = HashSet::new();
        for (name, expression) in self.locators {
            if !seen.insert(*name) {
                return Err(StagehandError::Config {
                    message: format!("facade '{}' declares '{name}' more than once", self.name),
                });
            }
            let _ = Locator::parse(expression)?;
        }
        Ok(())
    }
}

/// Declare a [`FacadeDef`] table.
///
/// ```
/// use stagehand::facade_def;
///
/// let def = facade_def! {
///     name: "Toolbar",
///     locators: { "run" => "//button[@text='Run']" }
/// };
/// assert_eq!(def.root, None);
/// assert_eq!(def.expression("run"), Some("//button[@text='Run']"));
/// ```
#[macro_export]
macro_rules! facade_def {
    (
        name: $name:literal,
        root: $root:literal,
        locators: { $($key:literal => $expression:literal),* $(,)? } $(,)?
    ) => {
        $crate::page_object::FacadeDef {
            name: $name,
            root: ::core::option::Option::Some($root),
            locators: &[$(($key, $expression)),*],
        }
    };
    (
        name: $name:literal,
        locators: { $($key:literal => $expression:literal),* $(,)? } $(,)?
    ) => {
        $crate::page_object::FacadeDef {
            name: $name,
            root: ::core::option::Option::None,
            locators: &[$(($key, $expression)),*],
        }
    };
}

/// A page object bound to a flow and a scope
pub trait Facade<'f>: Sized {
    /// The facade's locator table
    const DEF: FacadeDef;

    /// Wrap the bound page
    fn from_page(page: Page<'f>) -> Self;

    /// The facade's locator table
    fn definition() -> FacadeDef {
        Self::DEF
    }

    /// Resolve the root inside `parent` and bind the facade to it
    fn enter(flow: &'f Flow<'f>, parent: Option<Scope>) -> StagehandResult<Self> {
        let def = Self::DEF;
        flow.record(def.validate())?;
        let scope = match def.root {
            None => parent,
            Some(root) => {
                let locator = flow.record(Locator::parse(root))?.with_scope(parent);
                Some(flow.wait_for(&locator)?.scope())
            }
        };
        tracing::debug!(
            event = "stagehand.page.entered",
            facade = def.name,
            scope = %scope.as_ref().map_or_else(|| "/".to_string(), |s| s.root().to_string()),
        );
        Ok(Self::from_page(Page { flow, def, scope }))
    }
}

/// Scoped binding handed to a facade
#[derive(Debug, Clone)]
pub struct Page<'f> {
    flow: &'f Flow<'f>,
    def: FacadeDef,
    scope: Option<Scope>,
}

impl<'f> Page<'f> {
    /// The owning flow
    pub const fn flow(&self) -> &'f Flow<'f> {
        self.flow
    }

    /// The facade's table
    pub const fn definition(&self) -> &FacadeDef {
        &self.def
    }

    /// Scope every named locator is evaluated in
    pub const fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    /// The named locator, scoped to this page. Does not touch the session.
    pub fn locator(&self, name: &str) -> StagehandResult<Locator> {
        let expression = self
            .def
            .expression(name)
            .ok_or_else(|| StagehandError::UndeclaredLocator {
                facade: self.def.name,
                name: name.to_string(),
            })?;
        Ok(Locator::parse(expression)?.with_scope(self.scope.clone()))
    }

    fn named(&self, name: &str) -> StagehandResult<Locator> {
        self.flow.record(self.locator(name))
    }

    /// Wait for the named component
    pub fn find(&self, name: &str) -> StagehandResult<ResolvedHandle> {
        self.flow.wait_for(&self.named(name)?)
    }

    /// [`Self::find`] with explicit options
    pub fn find_with(&self, name: &str, options: &WaitOptions) -> StagehandResult<ResolvedHandle> {
        self.flow.wait_for_with(&self.named(name)?, options)
    }

    /// Wait until `expectation` holds for the named locator
    pub fn wait_until(&self, name: &str, expectation: Expectation) -> StagehandResult<ResolvedHandle> {
        self.flow.wait_until(&self.named(name)?, expectation)
    }

    /// [`Self::wait_until`] with explicit options
    pub fn wait_until_with(
        &self,
        name: &str,
        expectation: Expectation,
        options: &WaitOptions,
    ) -> StagehandResult<ResolvedHandle> {
        self.flow.wait_until_with(&self.named(name)?, expectation, options)
    }

    /// Wait until the named locator has no match
    pub fn wait_for_gone(&self, name: &str) -> StagehandResult<WaitResult> {
        self.flow.wait_for_gone(&self.named(name)?)
    }

    /// [`Self::wait_for_gone`] with explicit options
    pub fn wait_for_gone_with(&self, name: &str, options: &WaitOptions) -> StagehandResult<WaitResult> {
        self.flow.wait_for_gone_with(&self.named(name)?, options)
    }

    /// Wait for and click the named component
    pub fn click(&self, name: &str) -> StagehandResult<()> {
        let handle = self.find(name)?;
        self.flow.click(&handle)
    }

    /// Wait for the named component and type into it
    pub fn type_into(&self, name: &str, text: &str) -> StagehandResult<()> {
        let handle = self.find(name)?;
        self.flow.type_text(&handle, text)
    }

    /// Press a key combo on the named component
    pub fn press_keys(&self, name: &str, combo: &str) -> StagehandResult<()> {
        let handle = self.find(name)?;
        self.flow.press_keys(KeyTarget::Handle(&handle), combo)
    }

    /// Typed read of the named component's attribute
    pub fn read<T: FromAttribute>(&self, name: &str, key: &str) -> StagehandResult<T> {
        let handle = self.find(name)?;
        self.flow.read(&handle, key)
    }

    /// Selection state of the named component
    pub fn is_selected(&self, name: &str) -> StagehandResult<bool> {
        let handle = self.find(name)?;
        self.flow.is_selected(&handle)
    }

    /// Visible text of the named component
    pub fn text(&self, name: &str) -> StagehandResult<String> {
        let handle = self.find(name)?;
        self.flow.text(&handle)
    }

    /// Select the named component if it is not selected yet
    pub fn ensure_selected(&self, name: &str) -> StagehandResult<ResolvedHandle> {
        self.flow.ensure_selected(&self.named(name)?)
    }

    /// Unselect the named component if it is selected
    pub fn ensure_unselected(&self, name: &str) -> StagehandResult<ResolvedHandle> {
        self.flow.ensure_unselected(&self.named(name)?)
    }

    /// Bring the named component to the `wanted` selection state, waiting
    /// with `options`
    pub fn ensure_selection_with(
        &self,
        name: &str,
        wanted: bool,
        options: &WaitOptions,
    ) -> StagehandResult<ResolvedHandle> {
        self.flow.ensure_selection_with(&self.named(name)?, wanted, options)
    }

    /// Enter a sub-facade inside this page's scope
    pub fn enter<F: Facade<'f>>(&self) -> StagehandResult<F> {
        F::enter(self.flow, self.scope.clone())
    }
}
