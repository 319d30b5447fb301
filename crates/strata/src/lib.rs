//! # Strata
//!
//! A layered middleware and routing toolkit for writing testable HTTP
//! servers.
//!
//! Strata lets you write small, independently testable handler functions
//! and wires them together by type:
//!
//! - no globals: per-request state flows automatically from one handler
//!   to the next;
//! - handlers declare the parameters they need instead of type-asserting
//!   out of an untyped request context;
//! - request handling aborts by returning an error.
//!
//! A basic PAT-style router dispatches requests to per-route chains.
//!
//! ## Example
//!
//! ```rust
//! use strata::{Env, Request, Router, Rw};
//!
//! let mut router = Router::the_usual(Env::shared());
//! router.get("/", |rw: Rw| {
//!     let _ = rw.write_str("Hello world!");
//! });
//!
//! // Hand `router` to your transport layer; every connection calls
//! // `router.serve(writer, request)`.
//! # let recorder = strata::testing::ResponseRecorder::new();
//! # router.serve(recorder.clone(), Request::get("/"));
//! # assert_eq!(recorder.body_string(), "Hello world!");
//! ```
//!
//! ## Providing values
//!
//! Values registered on a router or stack are injected into any handler
//! that asks for their type, an excellent alternative to globals that
//! keeps handlers easy to test:
//!
//! ```rust
//! use std::sync::Arc;
//! use strata::{Env, Router, Rw};
//!
//! struct Database;
//! impl Database {
//!     fn motd(&self) -> &str {
//!         "hi"
//!     }
//! }
//!
//! let mut router = Router::the_usual(Env::shared());
//! router.provide(Arc::new(Database));
//! router.get("/", |rw: Rw, db: Arc<Database>| {
//!     let _ = rw.write_str(db.motd());
//! });
//! ```
//!
//! ## Handler chains
//!
//! Routes take several handlers; earlier outputs feed later inputs. When
//! a handler returns an error, the chain stops and the active error
//! handler responds:
//!
//! ```rust
//! use strata::{Env, Error, Request, Router, Rw};
//! use http::StatusCode;
//!
//! #[derive(Clone)]
//! struct User(String);
//! impl strata::Injectable for User {}
//!
//! fn parse_user(req: Request) -> Result<User, Error> {
//!     req.form_value("user")
//!         .map(User)
//!         .ok_or_else(|| Error::new(StatusCode::BAD_REQUEST, "missing user"))
//! }
//!
//! fn say_hi(rw: Rw, user: User) {
//!     let _ = rw.write_str(&format!("Hello {}", user.0));
//! }
//!
//! let mut router = Router::the_usual(Env::shared());
//! router.get("/", (parse_user, say_hi));
//! ```
//!
//! The wiring is checked when the route is registered: if `say_hi` asked
//! for a type nothing earlier produces, registration panics immediately
//! instead of surprising you while the server is running.
//!
//! ## Wrapping
//!
//! [`Wrap`] registers a pair of handlers around the rest of the chain:
//! one now, one deferred until after everything else (error handling
//! included) has finished. The built-in request logging and response
//! tracking are both wraps; gzip-style body filters follow the same
//! shape.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod env;
mod error;
mod logger;
mod request;
mod response_writer;
mod router;
mod stack;
pub mod testing;
mod wrap;
mod writer;

pub use env::{Clock, Env, LogSink};
pub use error::{handle_error, handle_error_json, Done, Error};
pub use request::{Request, RequestBuilder};
pub use writer::{ResponseWriter, Rw};
pub use logger::{log_requests, no_log, Log, LogEntry};
pub use response_writer::{wrap_response_writer, Recorded};
pub use router::{PrefixConflict, Route, Router, WrapRoute};
pub use stack::Stack;
pub use wrap::{ChainSetup, Wrap};

pub use strata_chain::{
    Args, ArgMismatch, Chain, ConstructionError, Failure, Handler, Hooks, Injectable,
    PanicFailure,
};
pub use strata_router::{Mux, Params, PatternError, PatternErrorKind};
