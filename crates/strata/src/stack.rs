//! The middleware facade: a chain pre-wired for HTTP handling.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use strata_chain::{Args, Chain, Handler, Injectable};

use crate::env::Env;
use crate::error::handle_error;
use crate::request::Request;
use crate::writer::{ResponseWriter, Rw};
use crate::logger::log_requests;
use crate::response_writer::wrap_response_writer;
use crate::wrap::{ChainSetup, Wrap};

/// A middleware stack: a [`Chain`] that already declares the two values
/// every HTTP handler starts from, the response writer handle [`Rw`] and
/// the [`Request`].
///
/// Like the underlying chain, a `Stack` is immutable; every operation
/// returns a new stack, so shared prefixes are free:
///
/// ```rust
/// use strata::{Env, Request, Rw, Stack};
///
/// fn hello(rw: Rw) {
///     let _ = rw.write_str("Hello world!");
/// }
///
/// let stack = Stack::the_usual(Env::shared()).then(hello);
///
/// # let recorder = strata::testing::ResponseRecorder::new();
/// stack.serve(recorder.clone(), Request::get("/"));
/// # assert_eq!(recorder.body_string(), "Hello world!");
/// ```
#[derive(Clone)]
pub struct Stack {
    chain: Chain,
    env: Arc<Env>,
}

impl Stack {
    /// A bare stack: no logging, no response tracking, no error handler.
    #[must_use]
    pub fn new(env: Arc<Env>) -> Self {
        let chain = Chain::with_hooks(env.hooks.clone())
            .arg::<Rw>()
            .arg::<Request>();
        Self { chain, env }
    }

    /// The popular preset: response-size/status tracking, request
    /// logging with deferred commit, and the plain-text error handler.
    #[must_use]
    pub fn the_usual(env: Arc<Env>) -> Self {
        let logging = log_requests(&env);
        Self::new(env)
            .then(wrap_response_writer)
            .with(&logging)
            .on_err(handle_error)
    }

    /// Makes a value available to all subsequent handlers under its
    /// concrete type.
    #[must_use]
    pub fn provide<T: Injectable>(self, value: T) -> Self {
        self.map(|c| c.provide(value))
    }

    /// Makes a value available under a trait-object type.
    #[must_use]
    pub fn provide_as<I: ?Sized + Send + Sync + 'static>(self, value: Arc<I>) -> Self {
        self.map(|c| c.provide_as::<I>(value))
    }

    /// Appends a handler.
    ///
    /// # Panics
    ///
    /// Panics if the handler's parameter types are not all available; see
    /// [`Chain::then`].
    #[must_use]
    pub fn then<M, H: Handler<M>>(self, handler: H) -> Self {
        self.map(|c| c.then(handler))
    }

    /// Registers the error handler for subsequent handlers.
    ///
    /// # Panics
    ///
    /// Panics on invalid construction; see [`Chain::on_err`].
    #[must_use]
    pub fn on_err<M, H: Handler<M>>(self, handler: H) -> Self {
        self.map(|c| c.on_err(handler))
    }

    /// Registers a deferred handler.
    ///
    /// # Panics
    ///
    /// Panics on invalid construction; see [`Chain::defer`].
    #[must_use]
    pub fn defer<M, H: Handler<M>>(self, handler: H) -> Self {
        self.map(|c| c.defer(handler))
    }

    /// Registers a before/after pair: `before` now, `after` deferred.
    ///
    /// # Panics
    ///
    /// Panics on invalid construction of either half.
    #[must_use]
    pub fn wrap<MB, MA>(
        self,
        before: impl Handler<MB> + Clone,
        after: impl Handler<MA> + Clone,
    ) -> Self {
        self.with(&Wrap::new(before, after))
    }

    /// Registers only a deferred `after` handler (a wrap with no before
    /// half).
    ///
    /// # Panics
    ///
    /// Panics on invalid construction.
    #[must_use]
    pub fn wrap_after<MA>(self, after: impl Handler<MA> + Clone) -> Self {
        self.with(&Wrap::after_only(after))
    }

    /// Applies a [`ChainSetup`].
    #[must_use]
    pub fn with(self, setup: &dyn ChainSetup) -> Self {
        let env = self.env.clone();
        Self {
            chain: setup.apply(self.chain),
            env,
        }
    }

    fn map(self, f: impl FnOnce(Chain) -> Chain) -> Self {
        Self {
            chain: f(self.chain),
            env: self.env,
        }
    }

    /// Runs the stack for one request.
    ///
    /// # Panics
    ///
    /// Panics only if the stack's declared args were tampered with (a
    /// `ChainSetup` added an `arg`), which is a construction bug.
    pub fn serve(&self, writer: impl ResponseWriter + 'static, req: Request) {
        self.serve_rw(Rw::new(writer), req);
    }

    /// [`serve`](Stack::serve) with an existing writer handle.
    pub fn serve_rw(&self, rw: Rw, req: Request) {
        self.chain.must_run(Args::new().with(rw).with(req));
    }

    /// The process context this stack was built with.
    #[must_use]
    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// Writes the reflection-free source form of this stack; see
    /// [`Chain::code`].
    ///
    /// # Errors
    ///
    /// Forwards formatting errors from the writer.
    pub fn code(&self, name: &str, module: &str, w: &mut dyn fmt::Write) -> fmt::Result {
        self.chain.code(name, module, w)
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut steps = String::new();
        let _ = write!(steps, "{:?}", self.chain);
        f.debug_struct("Stack").field("chain", &steps).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ResponseRecorder;
    use http::StatusCode;

    fn say(s: &'static str) -> impl Fn(Rw) + Clone + Send + Sync + 'static {
        move |rw: Rw| {
            let _ = rw.write_str(s);
            let _ = rw.write_str(":");
        }
    }

    #[test]
    fn test_wrap_order() {
        let stack = Stack::new(Env::shared())
            .then(say("a"))
            .wrap(say("b"), say("e"))
            .wrap(say("c"), say("d"));

        let recorder = ResponseRecorder::new();
        stack.serve(recorder.clone(), Request::get("/"));
        assert_eq!(recorder.body_string(), "a:b:c:d:e:");
    }

    #[test]
    fn test_the_usual_writes_response() {
        let captured = crate::testing::CapturedLog::new();
        let env = Arc::new(
            Env::default().with_log_sink(captured.sink()),
        );
        let stack = Stack::the_usual(env).then(|rw: Rw| {
            let _ = rw.write_str("Hello world!");
        });

        let recorder = ResponseRecorder::new();
        stack.serve(recorder.clone(), Request::get("/"));

        assert_eq!(recorder.body_string(), "Hello world!");
        let entries = captured.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status_code, 200);
        assert_eq!(entries[0].response_size, 12);
    }

    #[test]
    fn test_stack_error_short_circuits() {
        let env = Arc::new(Env::default().with_log_sink(Arc::new(|_| {})));
        let stack = Stack::the_usual(env)
            .then(|| -> Result<(), crate::Error> {
                Err(crate::Error::new(StatusCode::UNAUTHORIZED, "Invalid id: ghost"))
            })
            .then(say("never"));

        let recorder = ResponseRecorder::new();
        stack.serve(recorder.clone(), Request::get("/"));

        assert_eq!(recorder.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(recorder.body_string(), "Invalid id: ghost\n");
    }

    #[test]
    fn test_stack_is_immutable() {
        let base = Stack::new(Env::shared());
        let extended = base.clone().then(say("x"));

        let recorder = ResponseRecorder::new();
        base.serve(recorder.clone(), Request::get("/"));
        assert_eq!(recorder.body_string(), "");

        let recorder = ResponseRecorder::new();
        extended.serve(recorder.clone(), Request::get("/"));
        assert_eq!(recorder.body_string(), "x:");
    }
}
