//! Registration-time pattern errors.

use thiserror::Error;

/// A pattern could not be registered.
///
/// All conflicts are detected when the route is registered, never while
/// matching, so a router that finished construction serves every request
/// deterministically.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("`{pattern}`: bad pattern: {kind}")]
pub struct PatternError {
    /// The offending pattern as passed to registration.
    pub pattern: String,
    /// What rule the pattern violated.
    pub kind: PatternErrorKind,
}

impl PatternError {
    pub(crate) fn new(pattern: &str, kind: PatternErrorKind) -> Self {
        Self {
            pattern: pattern.to_string(),
            kind,
        }
    }
}

/// The specific registration rule a pattern violated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PatternErrorKind {
    /// Patterns must begin with `/`.
    #[error("patterns must begin with /")]
    NoLeadingSlash,

    /// The same pattern was registered twice.
    #[error("repeated entry")]
    Duplicate,

    /// A parameter name appears more than once within one pattern.
    #[error("param {name:?} used twice")]
    DuplicateParam {
        /// The repeated name.
        name: String,
    },

    /// More than one greedy parameter in one pattern.
    #[error("only one greedy param allowed per pattern: {name:?}")]
    MultipleGreedy {
        /// The second greedy name encountered.
        name: String,
    },

    /// A name registered both greedy and non-greedy at the same depth.
    #[error("param {name:?} is sometimes greedy and sometimes not")]
    GreedyMismatch {
        /// The conflicted name.
        name: String,
    },

    /// Two sibling parameters lead to indistinguishable terminals.
    #[error("ambiguous route")]
    Ambiguous,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_pattern() {
        let err = PatternError::new("/a/:x/:x", PatternErrorKind::DuplicateParam {
            name: "x".to_string(),
        });
        assert_eq!(err.to_string(), "`/a/:x/:x`: bad pattern: param \"x\" used twice");
    }
}
