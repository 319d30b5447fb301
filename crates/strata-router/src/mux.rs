//! The path-pattern trie: registration, conflict detection, and matching.

use std::collections::HashSet;

use crate::error::{PatternError, PatternErrorKind};
use crate::params::Params;

/// A single-method pattern trie.
///
/// Patterns are slash-separated segment lists where a segment is either a
/// literal, a named parameter `:name`, a greedy parameter `:name*`
/// (matching one or more segments), or `::literal` (an escape matching the
/// literal `:literal`). The trie is generic over its terminal handler so
/// the HTTP facade can store request chains while tests store markers.
///
/// # Matching priority
///
/// 1. Literal children.
/// 2. Non-greedy parameter children, in registration order.
/// 3. Greedy parameter children; the pattern tail after the greedy
///    parameter is matched from the *end* of the path, and the greedy
///    parameter receives the slash-joined middle.
///
/// Backtracking only happens between siblings; a failed branch never
/// leaks parameter bindings.
///
/// # Example
///
/// ```rust
/// use strata_router::{Mux, Params};
///
/// let mut mux = Mux::new();
/// mux.register("/user/:id", "get-user").unwrap();
/// mux.register("/files/:path*", "serve").unwrap();
///
/// let mut params = Params::new();
/// let handler = mux.find("/files/css/site.css", &mut params).unwrap();
/// assert_eq!(*handler, "serve");
/// assert_eq!(params.get("path"), Some("css/site.css"));
/// ```
#[derive(Debug, Clone)]
pub struct Mux<H> {
    /// Literal children, sorted by segment for binary search.
    statics: Vec<(String, Mux<H>)>,
    /// Parameter children, in registration order.
    params: Vec<ParamChild<H>>,
    handler: Option<H>,
}

#[derive(Debug, Clone)]
struct ParamChild<H> {
    name: String,
    greedy: bool,
    node: Mux<H>,
}

impl<H> Default for Mux<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Mux<H> {
    /// Creates an empty trie.
    #[must_use]
    pub fn new() -> Self {
        Self {
            statics: Vec::new(),
            params: Vec::new(),
            handler: None,
        }
    }

    /// Registers `pattern`, enforcing the conflict rules.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] naming the violated rule: duplicate
    /// registration, repeated or greedy/non-greedy-conflicted parameter
    /// names, multiple greedy parameters, or sibling-parameter ambiguity.
    pub fn register(&mut self, pattern: &str, handler: H) -> Result<(), PatternError> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(PatternError::new(pattern, PatternErrorKind::NoLeadingSlash));
        };
        let segments: Vec<&str> = rest.split('/').collect();
        let mut state = RegisterState::default();
        state
            .register_segments(self, &segments, handler)
            .map_err(|kind| PatternError::new(pattern, kind))
    }

    /// Matches `path`, binding parameters into `params` on success.
    ///
    /// `params` is only written when a handler is returned; a failed match
    /// leaves it untouched.
    pub fn find(&self, path: &str, params: &mut Params) -> Option<&H> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let segments: Vec<&str> = path.split('/').collect();
        self.match_prefix(&segments, params)
    }

    /// Returns `true` if no patterns are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statics.is_empty() && self.params.is_empty() && self.handler.is_none()
    }

    fn static_child(&self, segment: &str) -> Option<&Mux<H>> {
        self.statics
            .binary_search_by(|(s, _)| s.as_str().cmp(segment))
            .ok()
            .map(|i| &self.statics[i].1)
    }

    fn match_prefix(&self, segments: &[&str], params: &mut Params) -> Option<&H> {
        let Some((&segment, rest)) = segments.split_first() else {
            return self.handler.as_ref();
        };

        if let Some(child) = self.static_child(segment) {
            let mut scratch = params.clone();
            if let Some(handler) = child.match_prefix(rest, &mut scratch) {
                *params = scratch;
                return Some(handler);
            }
        }

        for child in self.params.iter().filter(|p| !p.greedy) {
            let mut scratch = params.clone();
            if let Some(handler) = child.node.match_prefix(rest, &mut scratch) {
                scratch.set(&child.name, segment);
                *params = scratch;
                return Some(handler);
            }
        }

        for child in self.params.iter().filter(|p| p.greedy) {
            let mut scratch = params.clone();
            if let Some((handler, used)) = child.node.match_suffix(rest, &mut scratch) {
                let middle = segments[..segments.len() - used].join("/");
                scratch.set(&child.name, middle);
                *params = scratch;
                return Some(handler);
            }
        }

        None
    }

    /// Matches the pattern tail below a greedy parameter against the end
    /// of `segments`, returning the handler and how many trailing segments
    /// the tail consumed.
    fn match_suffix<'a>(
        &'a self,
        segments: &[&str],
        params: &mut Params,
    ) -> Option<(&'a H, usize)> {
        let n = segments.len();
        if n == 0 {
            return self.handler.as_ref().map(|h| (h, 0));
        }

        for (name, child) in &self.statics {
            let mut scratch = params.clone();
            let Some((handler, depth)) = child.match_suffix(segments, &mut scratch) else {
                continue;
            };
            let depth = depth + 1;
            if depth > n || segments[n - depth] != name {
                continue;
            }
            *params = scratch;
            return Some((handler, depth));
        }

        for child in &self.params {
            let mut scratch = params.clone();
            let Some((handler, depth)) = child.node.match_suffix(segments, &mut scratch) else {
                continue;
            };
            let depth = depth + 1;
            if depth > n {
                continue;
            }
            scratch.set(&child.name, segments[n - depth]);
            *params = scratch;
            return Some((handler, depth));
        }

        // The greedy parameter swallows everything up to here.
        self.handler.as_ref().map(|h| (h, 0))
    }

    /// Checks whether registering `segments` under a *different* parameter
    /// sibling would create two indistinguishable terminals.
    fn check_ambiguous(&self, segments: &[&str]) -> Result<(), PatternErrorKind> {
        let Some((&next, rest)) = segments.split_first() else {
            if self.handler.is_some() {
                return Err(PatternErrorKind::Ambiguous);
            }
            return Ok(());
        };
        match parse_segment(next) {
            Segment::Literal(name) => {
                if let Some(child) = self.static_child(name) {
                    return child.check_ambiguous(rest);
                }
                Ok(())
            }
            Segment::Param { .. } => {
                for child in &self.params {
                    child.node.check_ambiguous(rest)?;
                }
                Ok(())
            }
        }
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Param { name: &'a str, greedy: bool },
}

fn parse_segment(entry: &str) -> Segment<'_> {
    if entry.starts_with("::") {
        // Double colon escapes to a single-colon literal.
        Segment::Literal(&entry[1..])
    } else if let Some(spec) = entry.strip_prefix(':') {
        let greedy = spec.ends_with('*');
        Segment::Param {
            name: spec.trim_end_matches('*'),
            greedy,
        }
    } else {
        Segment::Literal(entry)
    }
}

/// Per-registration bookkeeping for the single-pattern rules.
#[derive(Default)]
struct RegisterState {
    seen_params: HashSet<String>,
    seen_greedy: bool,
}

impl RegisterState {
    fn register_segments<H>(
        &mut self,
        node: &mut Mux<H>,
        segments: &[&str],
        handler: H,
    ) -> Result<(), PatternErrorKind> {
        let Some((&next, rest)) = segments.split_first() else {
            if node.handler.is_some() {
                return Err(PatternErrorKind::Duplicate);
            }
            node.handler = Some(handler);
            return Ok(());
        };
        match parse_segment(next) {
            Segment::Literal(name) => self.register_static(node, name, rest, handler),
            Segment::Param { name, greedy } => {
                self.register_param(node, name, greedy, rest, handler)
            }
        }
    }

    fn register_static<H>(
        &mut self,
        node: &mut Mux<H>,
        segment: &str,
        rest: &[&str],
        handler: H,
    ) -> Result<(), PatternErrorKind> {
        match node
            .statics
            .binary_search_by(|(s, _)| s.as_str().cmp(segment))
        {
            Ok(i) => self.register_segments(&mut node.statics[i].1, rest, handler),
            Err(i) => {
                let mut child = Mux::new();
                self.register_segments(&mut child, rest, handler)?;
                node.statics.insert(i, (segment.to_string(), child));
                Ok(())
            }
        }
    }

    fn register_param<H>(
        &mut self,
        node: &mut Mux<H>,
        name: &str,
        greedy: bool,
        rest: &[&str],
        handler: H,
    ) -> Result<(), PatternErrorKind> {
        if greedy && self.seen_greedy {
            return Err(PatternErrorKind::MultipleGreedy {
                name: name.to_string(),
            });
        }
        if self.seen_params.contains(name) {
            return Err(PatternErrorKind::DuplicateParam {
                name: name.to_string(),
            });
        }
        self.seen_params.insert(name.to_string());
        self.seen_greedy |= greedy;

        // A sibling already using this name must agree on greediness; the
        // new pattern then extends that sibling's subtree.
        if let Some(i) = node.params.iter().position(|p| p.name == name) {
            if node.params[i].greedy != greedy {
                return Err(PatternErrorKind::GreedyMismatch {
                    name: name.to_string(),
                });
            }
            return self.register_segments(&mut node.params[i].node, rest, handler);
        }

        for sibling in &node.params {
            sibling.node.check_ambiguous(rest)?;
        }

        let mut child = Mux::new();
        self.register_segments(&mut child, rest, handler)?;
        node.params.push(ParamChild {
            name: name.to_string(),
            greedy,
            node: child,
        });
        Ok(())
    }
}
