//! # Strata Router
//!
//! A multi-method path-pattern trie for the `strata` middleware toolkit.
//!
//! The router's job is deliberately small: turn a registered set of
//! patterns into an unambiguous decision procedure over request paths.
//! All of the subtlety lives in the registration rules: conflicting
//! patterns are rejected when they are added, so matching never has to
//! guess.
//!
//! # Pattern grammar
//!
//! | Segment | Matches |
//! |---|---|
//! | `literal` | itself |
//! | `:name` | exactly one segment, bound as `name` |
//! | `:name*` | one or more segments, bound slash-joined |
//! | `::literal` | the literal `:literal` |
//!
//! # Example
//!
//! ```rust
//! use strata_router::{Mux, Params};
//!
//! let mut mux = Mux::new();
//! mux.register("/user/:id", "show").unwrap();
//! mux.register("/user/:id/:cmd*", "act").unwrap();
//!
//! let mut params = Params::new();
//! let handler = mux.find("/user/7/rename/bob", &mut params).unwrap();
//! assert_eq!(*handler, "act");
//! assert_eq!(params.get("id"), Some("7"));
//! assert_eq!(params.get("cmd"), Some("rename/bob"));
//!
//! // Conflicting registrations are rejected up front:
//! assert!(mux.register("/user/:other", "oops").is_err());
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod mux;
mod params;

pub use error::{PatternError, PatternErrorKind};
pub use mux::Mux;
pub use params::Params;
