//! Extracted route parameters.

use smallvec::SmallVec;

/// Pairs stored inline before spilling to the heap; most routes bind one
/// or two parameters.
const INLINE_PARAMS: usize = 4;

/// The name→value map of parameters bound by a route match.
///
/// Keys are the names written in the pattern, without the leading `:` or
/// trailing `*`: matching `/user/:id/files/:path*` against
/// `/user/7/files/a/b` binds `id = "7"` and `path = "a/b"`.
///
/// `Params` is cheap to clone and is handed to chain handlers as an
/// ordinary injectable value.
///
/// # Example
///
/// ```rust
/// use strata_router::Params;
///
/// let mut params = Params::new();
/// params.set("id", "7");
/// params.set("path", "a/b");
///
/// assert_eq!(params.get("id"), Some("7"));
/// assert_eq!(params.get("missing"), None);
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    pairs: SmallVec<[(String, String); INLINE_PARAMS]>,
}

impl Params {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`, replacing any existing binding.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(pair) = self.pairs.iter_mut().find(|(n, _)| *n == name) {
            pair.1 = value;
        } else {
            self.pairs.push((name, value));
        }
    }

    /// Returns the value bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` when no parameters are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Iterates over `(name, value)` pairs in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl strata_chain::Injectable for Params {}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a str, &'a str);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, String)>,
        fn(&'a (String, String)) -> (&'a str, &'a str),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.set(name, value);
        }
        params
    }
}
