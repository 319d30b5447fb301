//! Process-wide settables, bundled into one injectable context.
//!
//! Three things are global to a strata process: what happens to a failure
//! no error handler claimed, how request log entries are written, and how
//! the current time is read. They are intended to be configured once
//! before traffic is accepted; tests construct their own [`Env`] with a
//! fake clock and capturing sinks instead of monkey-patching globals.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use strata_chain::Hooks;

use crate::logger::LogEntry;

/// A replaceable time source.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A replaceable log-entry sink.
pub type LogSink = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// The process context handed to [`Stack`](crate::Stack) and
/// [`Router`](crate::Router) constructors.
#[derive(Clone)]
pub struct Env {
    /// Time source used for log entry start/elapsed stamps.
    pub clock: Clock,
    /// Sink for committed request log entries.
    pub write_log: LogSink,
    /// Engine hooks: unhandled failures and swallowed panics.
    pub hooks: Arc<Hooks>,
}

impl Default for Env {
    fn default() -> Self {
        Self {
            clock: Arc::new(Utc::now),
            write_log: Arc::new(|entry: &LogEntry| {
                if !entry.quiet {
                    eprint!("{}", entry.render_line());
                }
            }),
            // A serving process should log, not die, on a handler failure
            // that nothing claimed.
            hooks: Arc::new(Hooks::logging()),
        }
    }
}

impl Env {
    /// The default context, shared.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the log sink.
    #[must_use]
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.write_log = sink;
        self
    }

    /// Replaces the engine hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Reads the current time from the configured clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env").finish_non_exhaustive()
    }
}
