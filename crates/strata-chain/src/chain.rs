//! Chain construction and validation.

use std::any::Any;
use std::sync::Arc;

use crate::error::{ConstructionError, Failure, StepInfo};
use crate::handle::TypeHandle;
use crate::handler::{Callable, Handler};
use crate::hooks::Hooks;
use crate::inject::Injectable;
use crate::naming::display_type;
use crate::ordinal::ordinalize;
use crate::registry::TypeRegistry;

/// What kind of step a chain entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepKind {
    /// A type whose value is supplied to `run`.
    Arg,
    /// An immediate value.
    Value,
    /// A normal handler.
    Pre,
    /// A deferred handler, run after the normal and error phases.
    Post,
    /// An error handler, active for subsequent steps.
    Err,
}

/// One entry of a chain: the erased callable plus the construction-time
/// metadata needed for validation, diagnostics, and code generation.
#[derive(Clone)]
pub(crate) struct Step {
    pub(crate) kind: StepKind,
    pub(crate) name: &'static str,
    /// Declared handle for `Arg`/`Value` steps.
    pub(crate) declared: Option<TypeHandle>,
    pub(crate) params: Vec<TypeHandle>,
    pub(crate) outputs: Vec<TypeHandle>,
    pub(crate) fallible: bool,
    /// Payload for `Value` steps.
    pub(crate) value: Option<Arc<dyn Any + Send + Sync>>,
    pub(crate) call: Option<Callable>,
    pub(crate) signature: String,
}

impl Step {
    pub(crate) fn info(&self) -> StepInfo {
        StepInfo {
            name: self.name,
            signature: self.signature.clone(),
        }
    }
}

fn render_signature(params: &[TypeHandle], outputs: &[TypeHandle], fallible: bool) -> String {
    let ins: Vec<String> = params.iter().map(|p| display_type(p.name())).collect();
    let mut sig = format!("fn({})", ins.join(", "));
    let values: Vec<String> = outputs
        .iter()
        .filter(|o| **o != TypeHandle::of::<Failure>())
        .map(|o| display_type(o.name()))
        .collect();
    let out = match values.len() {
        0 => String::new(),
        1 => values[0].clone(),
        _ => format!("({})", values.join(", ")),
    };
    match (fallible, out.is_empty()) {
        (false, true) => {}
        (false, false) => {
            sig.push_str(" -> ");
            sig.push_str(&out);
        }
        (true, true) => sig.push_str(" -> Result<(), _>"),
        (true, false) => {
            sig.push_str(" -> Result<");
            sig.push_str(&out);
            sig.push_str(", _>");
        }
    }
    sig
}

/// A type-directed dependency-injected chain of handlers.
///
/// A chain is an immutable sequence of steps: arg declarations, immediate
/// values, normal handlers, error handlers, and deferred handlers. Every
/// operation returns a new chain, so prefixes can be shared freely:
///
/// ```rust
/// use strata_chain::{Args, Chain};
///
/// fn greeting() -> String {
///     "hello".to_string()
/// }
///
/// fn shout(s: String) -> String {
///     s.to_uppercase()
/// }
///
/// let base = Chain::new().then(greeting);
/// let loud = base.clone().then(shout);
///
/// base.run(Args::new()).unwrap();
/// loud.run(Args::new()).unwrap();
/// ```
///
/// Handler parameters are resolved by type from values produced earlier in
/// the chain. The resolution is strictly last-provided-wins and is checked
/// when the handler is appended, not when the chain runs: a chain that
/// constructs without panicking can always be executed.
///
/// ```rust
/// use strata_chain::Chain;
///
/// // `shout` needs a String, but nothing provides one yet:
/// let err = Chain::new().try_then(|s: String| s.to_uppercase());
/// assert!(err.is_err());
/// ```
#[derive(Clone)]
pub struct Chain {
    pub(crate) steps: Vec<Step>,
    pub(crate) hooks: Arc<Hooks>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    /// Creates an empty chain with default [`Hooks`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            hooks: Arc::new(Hooks::default()),
        }
    }

    /// Creates an empty chain using the given process hooks.
    #[must_use]
    pub fn with_hooks(hooks: Arc<Hooks>) -> Self {
        Self {
            steps: Vec::new(),
            hooks,
        }
    }

    /// Number of steps in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` for the empty chain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn with_step(&self, step: Step) -> Self {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend(self.steps.iter().cloned());
        steps.push(step);
        Self {
            steps,
            hooks: self.hooks.clone(),
        }
    }

    /// Declares that a value of type `T` will be supplied positionally to
    /// `run`. Args exist to start a chain from values a surrounding
    /// framework owns (the response writer, the request); they bypass the
    /// causal checks, so facades should pre-declare them rather than expose
    /// this to application code.
    #[must_use]
    pub fn arg<T: Injectable>(self) -> Self {
        let handle = TypeHandle::of::<T>();
        self.with_step(Step {
            kind: StepKind::Arg,
            name: handle.name(),
            declared: Some(handle),
            params: Vec::new(),
            outputs: Vec::new(),
            fallible: false,
            value: None,
            call: None,
            signature: display_type(handle.name()),
        })
    }

    /// Supplies an immediate value, available to all subsequent handlers
    /// under its concrete type.
    ///
    /// To make a value available under a trait-object type, use
    /// [`provide_as`](Chain::provide_as); the concrete type cannot be
    /// recovered once the value is stored.
    #[must_use]
    pub fn provide<T: Injectable>(self, value: T) -> Self {
        let handle = TypeHandle::of::<T>();
        self.with_step(Step {
            kind: StepKind::Value,
            name: handle.name(),
            declared: Some(handle),
            params: Vec::new(),
            outputs: Vec::new(),
            fallible: false,
            value: Some(Arc::new(value)),
            call: None,
            signature: display_type(handle.name()),
        })
    }

    /// Supplies an immediate value under a trait-object type.
    ///
    /// The coercion to `Arc<I>` at the call site is where the compiler
    /// proves the value implements the trait:
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use strata_chain::Chain;
    ///
    /// trait Db: Send + Sync {}
    /// struct Sqlite;
    /// impl Db for Sqlite {}
    ///
    /// let chain = Chain::new()
    ///     .provide_as::<dyn Db>(Arc::new(Sqlite))
    ///     .then(|_db: Arc<dyn Db>| {});
    /// # let _ = chain;
    /// ```
    #[must_use]
    pub fn provide_as<I: ?Sized + Send + Sync + 'static>(self, value: Arc<I>) -> Self {
        let handle = TypeHandle::of::<Arc<I>>();
        self.with_step(Step {
            kind: StepKind::Value,
            name: handle.name(),
            declared: Some(handle),
            params: Vec::new(),
            outputs: Vec::new(),
            fallible: false,
            value: Some(Arc::new(value)),
            call: None,
            signature: display_type(handle.name()),
        })
    }

    /// Computes the set of types producible by the current steps.
    pub(crate) fn available(&self) -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        for step in &self.steps {
            match step.kind {
                StepKind::Arg | StepKind::Value => {
                    if let Some(handle) = step.declared {
                        registry.add(handle);
                    }
                }
                StepKind::Pre => {
                    for output in &step.outputs {
                        registry.add(*output);
                    }
                }
                // No return values allowed, so nothing becomes available.
                StepKind::Post | StepKind::Err => {}
            }
        }
        registry
    }

    fn check_available(
        registry: &TypeRegistry,
        role: &'static str,
        handler: &'static str,
        params: &[TypeHandle],
    ) -> Result<(), ConstructionError> {
        for (i, param) in params.iter().enumerate() {
            if registry.contains(param) {
                continue;
            }
            return Err(ConstructionError::Unavailable {
                role,
                handler,
                missing: param.name(),
                ordinal: ordinalize(i + 1),
                provided: registry.provided_names().join(", "),
                suggestion: registry.suggestion(param),
            });
        }
        Ok(())
    }

    /// Appends a normal handler.
    ///
    /// The handler may only take parameter types already producible by
    /// earlier steps; its outputs become available to subsequent steps.
    ///
    /// # Panics
    ///
    /// Panics with a [`ConstructionError`] if a parameter type is
    /// unavailable. Chains are built during program initialization, so
    /// construction mistakes fail fast; use [`try_then`](Chain::try_then)
    /// to inspect the error instead.
    #[must_use]
    pub fn then<M, H: Handler<M>>(self, handler: H) -> Self {
        match self.try_then(handler) {
            Ok(chain) => chain,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible form of [`then`](Chain::then).
    pub fn try_then<M, H: Handler<M>>(self, handler: H) -> Result<Self, ConstructionError> {
        let registry = self.available();
        let params = H::params();
        Self::check_available(&registry, "handler", H::name(), &params)?;
        let outputs = H::outputs();
        let fallible = H::fallible();
        let signature = render_signature(&params, &outputs, fallible);
        Ok(self.with_step(Step {
            kind: StepKind::Pre,
            name: H::name(),
            declared: None,
            params,
            outputs,
            fallible,
            value: None,
            call: Some(handler.erase()),
            signature,
        }))
    }

    /// Registers an error handler for failures of subsequent handlers.
    ///
    /// The handler becomes the active error handler until another `on_err`
    /// replaces it. It may take any already-available types plus
    /// [`Failure`], and must not return anything.
    ///
    /// # Panics
    ///
    /// Panics with a [`ConstructionError`] on an unavailable parameter type
    /// or a non-empty return; see [`try_on_err`](Chain::try_on_err).
    #[must_use]
    pub fn on_err<M, H: Handler<M>>(self, handler: H) -> Self {
        match self.try_on_err(handler) {
            Ok(chain) => chain,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible form of [`on_err`](Chain::on_err).
    pub fn try_on_err<M, H: Handler<M>>(self, handler: H) -> Result<Self, ConstructionError> {
        self.append_side_handler(handler, StepKind::Err, "error handler")
    }

    /// Registers a deferred handler.
    ///
    /// Deferred handlers run after the normal phase and the error handler,
    /// in reverse registration order. Like error handlers they may accept
    /// [`Failure`] (which is `Failure::none()` when nothing failed) and
    /// must not return anything. A deferred handler only runs if execution
    /// reached its registration point.
    ///
    /// # Panics
    ///
    /// Panics with a [`ConstructionError`] on an unavailable parameter type
    /// or a non-empty return; see [`try_defer`](Chain::try_defer).
    #[must_use]
    pub fn defer<M, H: Handler<M>>(self, handler: H) -> Self {
        match self.try_defer(handler) {
            Ok(chain) => chain,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible form of [`defer`](Chain::defer).
    pub fn try_defer<M, H: Handler<M>>(self, handler: H) -> Result<Self, ConstructionError> {
        self.append_side_handler(handler, StepKind::Post, "deferred handler")
    }

    fn append_side_handler<M, H: Handler<M>>(
        self,
        handler: H,
        kind: StepKind,
        role: &'static str,
    ) -> Result<Self, ConstructionError> {
        let mut registry = self.available();
        registry.add(TypeHandle::of::<Failure>());
        let params = H::params();
        Self::check_available(&registry, role, H::name(), &params)?;
        if !H::outputs().is_empty() {
            return Err(ConstructionError::HasOutputs {
                role,
                handler: H::name(),
            });
        }
        let signature = render_signature(&params, &[], false);
        Ok(self.with_step(Step {
            kind,
            name: H::name(),
            declared: None,
            params,
            outputs: Vec::new(),
            fallible: false,
            value: None,
            call: Some(handler.erase()),
            signature,
        }))
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for step in &self.steps {
            list.entry(&format_args!("{:?} {}", step.kind, step.name));
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gives_string() -> String {
        "s".to_string()
    }
    fn takes_string(_s: String) -> i64 {
        0
    }
    fn takes_i64(_n: i64) {}
    fn takes_bool(_b: bool) {}

    #[test]
    fn test_then_validates_in_order() {
        // Everything provided by earlier functions.
        let chain = Chain::new()
            .try_then(gives_string)
            .and_then(|c| c.try_then(takes_string))
            .and_then(|c| c.try_then(takes_i64));
        assert!(chain.is_ok());
    }

    #[test]
    fn test_then_rejects_missing_type() {
        let err = Chain::new().try_then(takes_string).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("String"), "message was: {msg}");
        assert!(msg.contains("1st parameter"), "message was: {msg}");

        // bool isn't provided anywhere.
        let err = Chain::new()
            .then(gives_string)
            .then(takes_string)
            .try_then(takes_bool)
            .unwrap_err();
        assert!(err.to_string().contains("bool"));
    }

    #[test]
    fn test_provide_makes_type_available() {
        assert!(Chain::new().try_then(takes_string).is_err());
        assert!(Chain::new()
            .provide("x".to_string())
            .try_then(takes_string)
            .is_ok());
    }

    #[test]
    fn test_arg_makes_type_available() {
        assert!(Chain::new().arg::<String>().try_then(takes_string).is_ok());
    }

    #[test]
    fn test_missing_type_lists_provided() {
        let err = Chain::new()
            .provide(7i64)
            .provide(true)
            .try_then(takes_string)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bool"));
        assert!(msg.contains("i64"));
    }

    #[test]
    fn test_error_handler_can_take_failure() {
        let chain = Chain::new().try_on_err(|_err: crate::Failure| {});
        assert!(chain.is_ok());
    }

    #[test]
    fn test_error_handler_params_must_be_available() {
        // Even error handlers need proper provisioning.
        let err = Chain::new()
            .try_on_err(|_s: String, _err: crate::Failure| {})
            .unwrap_err();
        assert!(err.to_string().contains("error handler"));
    }

    #[test]
    fn test_error_handler_may_not_return() {
        let err = Chain::new()
            .try_on_err(|_err: crate::Failure| true)
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("may not have any return values"));
    }

    #[test]
    fn test_defer_may_not_return() {
        let err = Chain::new().try_defer(|| "x".to_string()).unwrap_err();
        assert!(err.to_string().contains("deferred handler"));
    }

    #[test]
    fn test_defer_params_must_be_available() {
        assert!(Chain::new().try_defer(|_s: String| {}).is_err());
        assert!(Chain::new()
            .provide("x".to_string())
            .try_defer(|_s: String| {})
            .is_ok());
    }

    #[test]
    fn test_operations_return_new_chains() {
        let base = Chain::new().provide(1i64);
        let extended = base.clone().then(takes_i64);
        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
    }

    #[test]
    fn test_trait_object_suggestion() {
        use std::sync::Arc;

        trait Db: Send + Sync {}
        struct Sqlite;
        impl Db for Sqlite {}

        let err = Chain::new()
            .provide(Arc::new(Sqlite))
            .try_then(|_db: Arc<dyn Db>| {})
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("provide_as"), "message was: {msg}");
    }

    #[test]
    fn test_signature_rendering() {
        let sig = render_signature(
            &[TypeHandle::of::<String>(), TypeHandle::of::<i64>()],
            &[TypeHandle::of::<bool>(), TypeHandle::of::<Failure>()],
            true,
        );
        assert_eq!(sig, "fn(String, i64) -> Result<bool, _>");

        let sig = render_signature(&[], &[TypeHandle::of::<String>()], false);
        assert_eq!(sig, "fn() -> String");
    }
}
