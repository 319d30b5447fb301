//! Error types for chain construction, execution, and panic capture.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// The per-run failure carrier.
///
/// `Failure` is the chain's projection of "an error may or may not have
/// occurred". It is cheaply clonable and always bindable, so deferred
/// handlers can accept it uniformly: when the normal phase completed
/// without error they observe [`Failure::none`].
///
/// Error handlers and deferred handlers take `Failure` as an ordinary
/// parameter; it is treated as available during their construction-time
/// validation even before any fallible handler appears in the chain.
#[derive(Clone, Default)]
pub struct Failure(Option<Arc<dyn StdError + Send + Sync>>);

impl Failure {
    /// The "no error occurred" value.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    /// Wraps a concrete error.
    #[must_use]
    pub fn of<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self(Some(Arc::new(err)))
    }

    /// Wraps an already-shared error.
    #[must_use]
    pub fn from_arc(err: Arc<dyn StdError + Send + Sync>) -> Self {
        Self(Some(err))
    }

    /// Returns `true` if an error is present.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.0.is_some()
    }

    /// Returns the underlying error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&(dyn StdError + Send + Sync)> {
        self.0.as_deref()
    }

    /// Attempts to view the underlying error as a concrete type.
    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.as_deref().and_then(|e| e.downcast_ref::<E>())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(err) => fmt::Display::fmt(err, f),
            None => f.write_str("<no failure>"),
        }
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(err) => f.debug_tuple("Failure").field(err).finish(),
            None => f.write_str("Failure(None)"),
        }
    }
}

/// A snapshot of one already-invoked step, recorded for panic reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    /// Registered function name (the fully-qualified path of the handler).
    pub name: &'static str,
    /// Rendered signature, e.g. `fn(String, i64) -> User`.
    pub signature: String,
}

/// The error produced when an invoked handler panics.
///
/// The panicking step appears first in [`middleware_stack`], followed by
/// the previously executed steps in most-recent-first order. Deferred
/// handlers that had been registered but not yet run are not listed.
///
/// [`middleware_stack`]: PanicFailure::middleware_stack
#[derive(Debug, Clone)]
pub struct PanicFailure {
    /// The panic payload, rendered to a string.
    pub value: String,
    /// Executed steps, most recent first.
    pub middleware_stack: Vec<StepInfo>,
    /// Call-stack snapshot taken at the capture point.
    pub raw_stack: String,
}

impl PanicFailure {
    pub(crate) fn new(payload: &(dyn std::any::Any + Send), executed: &[StepInfo]) -> Self {
        let value = payload
            .downcast_ref::<&'static str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_string());
        let middleware_stack = executed.iter().rev().cloned().collect();
        let raw_stack = std::backtrace::Backtrace::force_capture().to_string();
        Self {
            value,
            middleware_stack,
            raw_stack,
        }
    }

    /// The raw stack with engine-internal and unwinding frames removed.
    #[must_use]
    pub fn filtered_stack(&self) -> Vec<&str> {
        let noise = [
            "strata_chain::",
            "std::panicking",
            "core::panicking",
            "std::panic::",
            "rust_begin_unwind",
            "std::sys",
            "__rust_",
        ];
        let mut filtered = Vec::new();
        let mut skip_location = false;
        for line in self.raw_stack.lines() {
            let trimmed = line.trim_start();
            if skip_location && trimmed.starts_with("at ") {
                skip_location = false;
                continue;
            }
            skip_location = false;
            if noise.iter().any(|n| trimmed.contains(n)) {
                skip_location = true;
                continue;
            }
            filtered.push(line);
        }
        filtered
    }
}

impl fmt::Display for PanicFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let site = self
            .middleware_stack
            .first()
            .map_or("<unknown>", |s| s.name);
        writeln!(f, "panic executing middleware `{site}`: {}", self.value)?;
        writeln!(f, "  middleware executed:")?;
        for step in &self.middleware_stack {
            writeln!(f, "    {}  {}", step.name, step.signature)?;
        }
        writeln!(f, "  filtered call stack:")?;
        for line in self.filtered_stack() {
            writeln!(f, "    {line}")?;
        }
        Ok(())
    }
}

impl StdError for PanicFailure {}

/// A chain operation was handed a handler it cannot legally append.
///
/// Construction errors are fatal: the public chain operations panic with
/// this error so that misconfigured programs fail during initialization,
/// while the `try_`-prefixed operations return it for inspection.
#[derive(Debug, Clone, Error)]
pub enum ConstructionError {
    /// A handler parameter type is not in the available set.
    #[error(
        "{role} `{handler}` cannot be called: type `{missing}` required for its \
         {ordinal} parameter has not been provided. Types that have been \
         provided: [{provided}].{suggestion}"
    )]
    Unavailable {
        /// What kind of registration failed ("handler", "error handler", ...).
        role: &'static str,
        /// The handler's registered name.
        handler: &'static str,
        /// The missing parameter type.
        missing: &'static str,
        /// 1-based parameter position, ordinalized.
        ordinal: String,
        /// Comma-joined sorted list of available type names.
        provided: String,
        /// Optional trait-object guidance.
        suggestion: String,
    },

    /// An error handler or deferred handler declared return values.
    #[error("{role} `{handler}` may not have any return values")]
    HasOutputs {
        /// What kind of registration failed.
        role: &'static str,
        /// The handler's registered name.
        handler: &'static str,
    },
}

/// The arguments passed to `run` did not match the chain's declared args.
///
/// This is the only error `run` itself returns; failures inside handlers
/// are routed to the active error handler instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgMismatch {
    /// Fewer values than declared args.
    #[error("missing args of types: [{}]", .types.join(", "))]
    Missing {
        /// Declared types with no corresponding value.
        types: Vec<&'static str>,
    },

    /// More values than declared args.
    #[error("too many args: expected {expected} args but got {got} args")]
    TooMany {
        /// Number of declared args.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },

    /// A value's type does not match the declared arg at its position.
    #[error("bad arg: {ordinal} arg of run(...) should be a `{expected}` but is a `{got}`")]
    WrongType {
        /// 1-based position, ordinalized.
        ordinal: String,
        /// The declared type.
        expected: &'static str,
        /// The supplied type.
        got: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_failure_none() {
        let f = Failure::none();
        assert!(!f.is_failure());
        assert!(f.error().is_none());
        assert_eq!(f.to_string(), "<no failure>");
    }

    #[test]
    fn test_failure_of() {
        let f = Failure::of(Boom);
        assert!(f.is_failure());
        assert_eq!(f.to_string(), "boom");
        assert!(f.downcast_ref::<Boom>().is_some());
        assert!(f.downcast_ref::<ArgMismatch>().is_none());
    }

    #[test]
    fn test_failure_clone_shares_error() {
        let f = Failure::of(Boom);
        let g = f.clone();
        assert_eq!(f.to_string(), g.to_string());
    }

    #[test]
    fn test_panic_failure_reverses_stack() {
        let executed = vec![
            StepInfo {
                name: "first",
                signature: "fn()".into(),
            },
            StepInfo {
                name: "second",
                signature: "fn()".into(),
            },
        ];
        let pf = PanicFailure::new(&"kaboom", &executed);
        assert_eq!(pf.value, "kaboom");
        assert_eq!(pf.middleware_stack[0].name, "second");
        assert_eq!(pf.middleware_stack[1].name, "first");

        let msg = pf.to_string();
        assert!(msg.contains("panic executing middleware `second`"));
        assert!(msg.contains("kaboom"));
    }

    #[test]
    fn test_panic_failure_string_payload() {
        let pf = PanicFailure::new(&"text".to_string(), &[]);
        assert_eq!(pf.value, "text");
    }

    #[test]
    fn test_arg_mismatch_messages() {
        let missing = ArgMismatch::Missing {
            types: vec!["bool", "i64"],
        };
        assert_eq!(missing.to_string(), "missing args of types: [bool, i64]");

        let too_many = ArgMismatch::TooMany {
            expected: 3,
            got: 5,
        };
        assert_eq!(
            too_many.to_string(),
            "too many args: expected 3 args but got 5 args"
        );

        let wrong = ArgMismatch::WrongType {
            ordinal: "2nd".into(),
            expected: "alloc::string::String",
            got: "bool",
        };
        assert!(wrong.to_string().starts_with("bad arg: 2nd arg of run(...)"));
    }
}
