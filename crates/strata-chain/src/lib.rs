//! # Strata Chain
//!
//! A type-directed dependency-injected chain of functions, the engine
//! underneath the `strata` middleware toolkit.
//!
//! A [`Chain`] is a declarative sequence of handlers plus an initial set of
//! inputs. The parameters of each handler are supplied automatically from
//! either the initial inputs or the return values of earlier handlers in
//! the sequence, matched by type.
//!
//! In contrast to resolution-based dependency-injection frameworks, a
//! chain never searches for a way to satisfy a dependency; it simply uses
//! the most recently provided value of each type. That restriction is what
//! lets every wiring mistake surface immediately at construction time: a
//! chain that was built without panicking can always be executed.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_chain::{Args, Chain, Failure};
//!
//! #[derive(Clone)]
//! struct UserId(String);
//! impl strata_chain::Injectable for UserId {}
//!
//! #[derive(Clone)]
//! struct User(String);
//! impl strata_chain::Injectable for User {}
//!
//! trait UserDb: Send + Sync {
//!     fn lookup(&self, id: &UserId) -> User;
//! }
//!
//! struct MemoryDb;
//! impl UserDb for MemoryDb {
//!     fn lookup(&self, id: &UserId) -> User {
//!         User(format!("user-{}", id.0))
//!     }
//! }
//!
//! fn get_user(db: Arc<dyn UserDb>, id: UserId) -> User {
//!     db.lookup(&id)
//! }
//!
//! let chain = Chain::new()
//!     .arg::<UserId>()                         // supplied to run()
//!     .provide_as::<dyn UserDb>(Arc::new(MemoryDb))
//!     .then(get_user)                          // takes Arc<dyn UserDb> + UserId
//!     .then(|u: User| assert_eq!(u.0, "user-bob"))
//!     .on_err(|e: Failure| eprintln!("failed: {e}"));
//!
//! chain.run(Args::new().with(UserId("bob".to_string()))).unwrap();
//! ```
//!
//! Had `get_user` been registered before `provide_as`, construction would
//! have panicked with a message listing the available types, long before
//! any request traffic.
//!
//! ## Execution phases
//!
//! A run proceeds in three phases: normal handlers in registration order;
//! then, if a handler failed, the most recently registered error handler;
//! then every deferred handler that had been registered before the failure
//! point, in reverse registration order. Panics inside handlers are
//! captured into a [`PanicFailure`] carrying the executed middleware stack
//! and are routed through the same error path; they never escape
//! [`Chain::run`].

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod chain;
mod codegen;
mod error;
mod handle;
mod handler;
mod hooks;
mod inject;
mod naming;
mod ordinal;
mod registry;
mod run;

pub use chain::Chain;
pub use error::{ArgMismatch, ConstructionError, Failure, PanicFailure, StepInfo};
pub use handle::TypeHandle;
pub use handler::{Callable, Handler};
pub use hooks::Hooks;
pub use inject::{Args, Injectable, ValueMap};
pub use naming::{display_fn, display_type, NameMapper};
