//! Before/after pairs and direct chain customization.

use std::sync::Arc;

use strata_chain::{Chain, Handler};

/// Something that customizes a chain directly.
///
/// This is the advanced escape hatch: most middleware is just a handler,
/// but a setup can append several steps at once (see [`Wrap`]) or
/// otherwise restructure the tail of the chain. Don't declare new args
/// from a setup; that would break the routers' dispatch call.
pub trait ChainSetup: Send + Sync {
    /// Returns the extended chain.
    fn apply(&self, chain: Chain) -> Chain;
}

/// A before/after handler pair.
///
/// `before` runs in the normal phase; `after` is deferred and runs once
/// the rest of the chain (including any error handler) has finished.
/// Anything `before` returns is available to `after`, which makes `Wrap`
/// the natural shape for timing, logging, and acquire/release middleware:
///
/// ```rust
/// use strata_chain::{Chain, Failure};
/// use strata::Wrap;
///
/// #[derive(Clone)]
/// struct Started(std::time::Instant);
/// impl strata_chain::Injectable for Started {}
///
/// let timing = Wrap::new(
///     || Started(std::time::Instant::now()),
///     |started: Started, _err: Failure| {
///         eprintln!("took {:?}", started.0.elapsed());
///     },
/// );
/// # let _ = timing;
/// ```
///
/// Because `after` is deferred, it still runs when a later handler fails;
/// it may accept [`Failure`](strata_chain::Failure) to observe the
/// outcome. If `before` itself fails, `after` was never registered and
/// does not run.
#[derive(Clone)]
pub struct Wrap {
    apply: Arc<dyn Fn(Chain) -> Chain + Send + Sync>,
}

impl Wrap {
    /// Pairs a normal handler with a deferred one.
    #[must_use]
    pub fn new<MB, MA>(
        before: impl Handler<MB> + Clone,
        after: impl Handler<MA> + Clone,
    ) -> Self {
        Self {
            apply: Arc::new(move |chain: Chain| {
                chain.then(before.clone()).defer(after.clone())
            }),
        }
    }

    /// A wrap with only a deferred half.
    #[must_use]
    pub fn after_only<MA>(after: impl Handler<MA> + Clone) -> Self {
        Self {
            apply: Arc::new(move |chain: Chain| chain.defer(after.clone())),
        }
    }
}

impl ChainSetup for Wrap {
    fn apply(&self, chain: Chain) -> Chain {
        (self.apply)(chain)
    }
}

impl std::fmt::Debug for Wrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wrap").finish_non_exhaustive()
    }
}
