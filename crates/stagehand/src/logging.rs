//! Subscriber setup for binaries and test harnesses that drive flows.
//!
//! Library code only emits `tracing` events; nothing is printed unless the
//! host installs a subscriber, either its own or the one built here.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or unparsable
pub const DEFAULT_FILTER: &str = "stagehand=info";

/// Build the env filter, falling back to [`DEFAULT_FILTER`]
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a global subscriber: JSON lines when `json`, compact text otherwise.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one is kept.
pub fn init_logging(json: bool) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter());
    let installed = if json {
        registry
            .with(fmt::layer().json().with_target(false).with_current_span(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_target(false))
            .try_init()
    };
    installed.is_ok()
}
