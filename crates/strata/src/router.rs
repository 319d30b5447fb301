//! Method-aware routing over request chains, with prefix-scoped
//! sub-routers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::{Method, StatusCode};
use strata_chain::{Args, Chain, Handler, Injectable};
use strata_router::{Mux, Params, PatternError};
use thiserror::Error;

use crate::env::Env;
use crate::error::handle_error;
use crate::request::Request;
use crate::writer::{ResponseWriter, Rw};
use crate::logger::log_requests;
use crate::response_writer::wrap_response_writer;
use crate::wrap::{ChainSetup, Wrap};

/// What can be mounted at a route: a handler, a tuple of handlers run in
/// order, or a [`Wrap`].
///
/// The `M` type parameter is an inference marker; callers never name it.
pub trait Route<M> {
    /// Extends the route's base chain with this route's steps.
    fn attach(self, chain: Chain) -> Chain;
}

impl<M, H: Handler<M>> Route<(M,)> for H {
    fn attach(self, chain: Chain) -> Chain {
        chain.then(self)
    }
}

macro_rules! impl_route_for_tuple {
    ($(($H:ident, $M:ident, $idx:tt)),+) => {
        impl<$($M,)+ $($H: Handler<$M>,)+> Route<($($M,)+)> for ($($H,)+) {
            fn attach(self, chain: Chain) -> Chain {
                $(let chain = chain.then(self.$idx);)+
                chain
            }
        }
    };
}

impl_route_for_tuple!((H1, M1, 0), (H2, M2, 1));
impl_route_for_tuple!((H1, M1, 0), (H2, M2, 1), (H3, M3, 2));
impl_route_for_tuple!((H1, M1, 0), (H2, M2, 1), (H3, M3, 2), (H4, M4, 3));

/// Marker for mounting a [`Wrap`] as a route step.
#[derive(Debug)]
pub struct WrapRoute(());

impl Route<WrapRoute> for Wrap {
    fn attach(self, chain: Chain) -> Chain {
        ChainSetup::apply(&self, chain)
    }
}

/// Sub-router prefixes on one router must not overlap.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("sub-router prefix `{prefix}` conflicts with existing sub-router prefix `{existing}`")]
pub struct PrefixConflict {
    /// The prefix being registered (normalized with a trailing `/`).
    pub prefix: String,
    /// The already-registered prefix it overlaps.
    pub existing: String,
}

type NotFoundHandler = Arc<dyn Fn(Rw, Request) + Send + Sync>;

/// An HTTP router dispatching to per-route chains.
///
/// Every route's chain starts from the router's base chain, which
/// pre-declares [`Rw`], [`Request`], and [`Params`]. Values and
/// middleware added to the router extend the base used by *subsequent*
/// registrations; routes already registered are unaffected (chains are
/// immutable).
///
/// ```rust
/// use strata::{Env, Params, Request, Router, Rw};
///
/// fn show_user(rw: Rw, params: Params) {
///     let _ = rw.write_str(&format!("user {}", params.get("id").unwrap()));
/// }
///
/// let mut router = Router::the_usual(Env::shared());
/// router.get("/user/:id", show_user);
///
/// # let recorder = strata::testing::ResponseRecorder::new();
/// router.serve(recorder.clone(), Request::get("/user/7"));
/// # assert_eq!(recorder.body_string(), "user 7");
/// ```
pub struct Router {
    base: Chain,
    env: Arc<Env>,
    by_method: HashMap<Method, Mux<Chain>>,
    any_method: Mux<Chain>,
    sub_routers: Vec<(String, Router)>,
    not_found: Option<NotFoundHandler>,
}

impl Router {
    /// A minimal router with no initial middleware.
    #[must_use]
    pub fn new(env: Arc<Env>) -> Self {
        let base = Chain::with_hooks(env.hooks.clone())
            .arg::<Rw>()
            .arg::<Request>()
            .arg::<Params>();
        Self {
            base,
            env,
            by_method: HashMap::new(),
            any_method: Mux::new(),
            sub_routers: Vec::new(),
            not_found: None,
        }
    }

    /// A router with the usual middleware installed: response tracking,
    /// request logging, and the plain-text error handler.
    #[must_use]
    pub fn the_usual(env: Arc<Env>) -> Self {
        let logging = log_requests(&env);
        let mut router = Self::new(env);
        router.use_handler(wrap_response_writer);
        router.with(&logging);
        router.on_err(handle_error);
        router
    }

    /// Makes a value available to handlers on subsequently registered
    /// routes.
    pub fn provide<T: Injectable>(&mut self, value: T) {
        self.base = self.base.clone().provide(value);
    }

    /// Makes a value available under a trait-object type.
    pub fn provide_as<I: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<I>) {
        self.base = self.base.clone().provide_as::<I>(value);
    }

    /// Adds middleware invoked for all subsequently registered routes.
    ///
    /// # Panics
    ///
    /// Panics on invalid construction; see [`Chain::then`].
    pub fn use_handler<M, H: Handler<M>>(&mut self, handler: H) {
        self.base = self.base.clone().then(handler);
    }

    /// Applies a [`ChainSetup`] (such as a [`Wrap`]) to the base chain.
    pub fn with(&mut self, setup: &dyn ChainSetup) {
        self.base = setup.apply(self.base.clone());
    }

    /// Installs the error handler for subsequently registered routes.
    ///
    /// # Panics
    ///
    /// Panics on invalid construction; see [`Chain::on_err`].
    pub fn on_err<M, H: Handler<M>>(&mut self, handler: H) {
        self.base = self.base.clone().on_err(handler);
    }

    /// Replaces the not-found response.
    pub fn not_found(&mut self, handler: impl Fn(Rw, Request) + Send + Sync + 'static) {
        self.not_found = Some(Arc::new(handler));
    }

    /// Registers a route for one method.
    ///
    /// # Panics
    ///
    /// Panics on a [`PatternError`] or invalid handler construction; see
    /// [`try_on`](Router::try_on).
    pub fn on<M>(&mut self, method: Method, path: &str, route: impl Route<M>) {
        if let Err(err) = self.try_on(method, path, route) {
            panic!("cannot register route: {err}");
        }
    }

    /// Fallible form of [`on`](Router::on).
    ///
    /// # Errors
    ///
    /// Returns the [`PatternError`] produced by the underlying trie.
    pub fn try_on<M>(
        &mut self,
        method: Method,
        path: &str,
        route: impl Route<M>,
    ) -> Result<(), PatternError> {
        let chain = route.attach(self.base.clone());
        self.by_method
            .entry(method)
            .or_default()
            .register(path, chain)
    }

    /// Registers a route for any method not explicitly handled.
    ///
    /// A wildcard registration always loses to a method-specific
    /// registration for the same path.
    ///
    /// # Panics
    ///
    /// Panics on a [`PatternError`] or invalid handler construction.
    pub fn any<M>(&mut self, path: &str, route: impl Route<M>) {
        let chain = route.attach(self.base.clone());
        if let Err(err) = self.any_method.register(path, chain) {
            panic!("cannot register route: {err}");
        }
    }

    /// Shorthand for [`on`](Router::on) with `GET`.
    ///
    /// # Panics
    ///
    /// As [`on`](Router::on).
    pub fn get<M>(&mut self, path: &str, route: impl Route<M>) {
        self.on(Method::GET, path, route);
    }

    /// Shorthand for [`on`](Router::on) with `POST`.
    ///
    /// # Panics
    ///
    /// As [`on`](Router::on).
    pub fn post<M>(&mut self, path: &str, route: impl Route<M>) {
        self.on(Method::POST, path, route);
    }

    /// Shorthand for [`on`](Router::on) with `PUT`.
    ///
    /// # Panics
    ///
    /// As [`on`](Router::on).
    pub fn put<M>(&mut self, path: &str, route: impl Route<M>) {
        self.on(Method::PUT, path, route);
    }

    /// Shorthand for [`on`](Router::on) with `PATCH`.
    ///
    /// # Panics
    ///
    /// As [`on`](Router::on).
    pub fn patch<M>(&mut self, path: &str, route: impl Route<M>) {
        self.on(Method::PATCH, path, route);
    }

    /// Shorthand for [`on`](Router::on) with `DELETE`.
    ///
    /// # Panics
    ///
    /// As [`on`](Router::on).
    pub fn delete<M>(&mut self, path: &str, route: impl Route<M>) {
        self.on(Method::DELETE, path, route);
    }

    /// Derives a router handling all paths under `prefix`.
    ///
    /// The sub-router starts from a copy of this router's current base
    /// chain and not-found handler; later changes to the parent do not
    /// flow into it.
    ///
    /// # Panics
    ///
    /// Panics on a [`PrefixConflict`]; see
    /// [`try_sub_router`](Router::try_sub_router).
    pub fn sub_router(&mut self, prefix: &str) -> &mut Router {
        match self.try_sub_router(prefix) {
            Ok(sub) => sub,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible form of [`sub_router`](Router::sub_router).
    ///
    /// # Errors
    ///
    /// Returns [`PrefixConflict`] when `prefix` equals, contains, or is
    /// contained in an already-registered prefix.
    pub fn try_sub_router(&mut self, prefix: &str) -> Result<&mut Router, PrefixConflict> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        for (existing, _) in &self.sub_routers {
            if *existing == prefix
                || existing.starts_with(prefix.as_str())
                || prefix.starts_with(existing.as_str())
            {
                return Err(PrefixConflict {
                    prefix,
                    existing: existing.clone(),
                });
            }
        }
        let sub = Router {
            base: self.base.clone(),
            env: self.env.clone(),
            by_method: HashMap::new(),
            any_method: Mux::new(),
            sub_routers: Vec::new(),
            not_found: self.not_found.clone(),
        };
        self.sub_routers.push((prefix, sub));
        Ok(&mut self
            .sub_routers
            .last_mut()
            .expect("just pushed a sub-router")
            .1)
    }

    fn find(&self, method: &Method, path: &str, params: &mut Params) -> Option<&Chain> {
        for (prefix, sub) in &self.sub_routers {
            if let Some(rest) = path.strip_prefix(prefix.as_str()) {
                return sub.find(method, rest, params);
            }
        }
        if let Some(mux) = self.by_method.get(method) {
            if let Some(chain) = mux.find(path, params) {
                return Some(chain);
            }
        }
        self.any_method.find(path, params)
    }

    /// Dispatches one request.
    ///
    /// # Panics
    ///
    /// Panics only if a route chain's declared args were tampered with,
    /// which is a construction bug.
    pub fn serve(&self, writer: impl ResponseWriter + 'static, req: Request) {
        self.serve_rw(Rw::new(writer), req);
    }

    /// [`serve`](Router::serve) with an existing writer handle.
    pub fn serve_rw(&self, rw: Rw, req: Request) {
        let mut params = Params::new();
        let path = req.path().to_string();
        match self.find(req.method(), &path, &mut params) {
            Some(chain) => {
                chain.must_run(Args::new().with(rw).with(req).with(params));
            }
            None => {
                tracing::debug!(method = %req.method(), path = %path, "no route matched");
                match &self.not_found {
                    Some(handler) => handler(rw, req),
                    None => {
                        rw.set_header("content-type", "text/plain; charset=utf-8");
                        rw.write_status(StatusCode::NOT_FOUND);
                        let _ = rw.write_str("Not found\n");
                    }
                }
            }
        }
    }

    /// The process context this router was built with.
    #[must_use]
    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.by_method.len())
            .field("sub_routers", &self.sub_routers.len())
            .finish_non_exhaustive()
    }
}
