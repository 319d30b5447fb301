//! Process-level hooks consulted by the executor.

use std::fmt;
use std::sync::Arc;

use crate::error::Failure;

/// Engine-level callbacks for failures that have nowhere else to go.
///
/// Hooks are intended to be configured once during program initialization
/// and then treated as read-only; every chain carries an `Arc<Hooks>` and
/// concurrent runs share it freely.
#[derive(Clone)]
pub struct Hooks {
    /// Called when a handler failed and no error handler was registered.
    ///
    /// The default panics, mirroring the fail-fast construction policy: a
    /// chain that can fail should have an error handler. Replace this with
    /// a logging hook (see [`Hooks::logging`]) for lenient setups. This
    /// callback is not validated against the chain's available types, so
    /// keep it as simple as possible.
    pub on_unhandled: Arc<dyn Fn(&Failure) + Send + Sync>,

    /// Called when an error handler or deferred handler itself panicked.
    ///
    /// Such panics are captured and swallowed; this hook is the only
    /// signal they produce. The default records the failure via
    /// `tracing::error!`.
    pub on_swallowed: Arc<dyn Fn(&Failure) + Send + Sync>,
}

impl Hooks {
    /// Hooks that log both cases via `tracing` instead of panicking.
    #[must_use]
    pub fn logging() -> Self {
        Self {
            on_unhandled: Arc::new(|failure| {
                tracing::error!(%failure, "unhandled chain failure");
            }),
            on_swallowed: Arc::new(|failure| {
                tracing::error!(%failure, "panic captured in error/deferred handler");
            }),
        }
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            on_unhandled: Arc::new(|failure| {
                panic!("unhandled chain failure: {failure}");
            }),
            on_swallowed: Arc::new(|failure| {
                tracing::error!(%failure, "panic captured in error/deferred handler");
            }),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}
