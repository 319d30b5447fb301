//! Construction-time bookkeeping of which value types are available.

use indexmap::IndexMap;
use std::any::TypeId;

use crate::handle::TypeHandle;

/// Tracks, at a given construction point, the set of types producible by
/// earlier steps of a chain.
///
/// The registry only exists while a chain operation validates its handler;
/// it is rebuilt from the step list on every mutation so that chains stay
/// plain immutable data. Insertion order is preserved so diagnostic
/// messages are deterministic.
#[derive(Debug, Default)]
pub(crate) struct TypeRegistry {
    available: IndexMap<TypeId, &'static str>,
}

impl TypeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, handle: TypeHandle) {
        self.available.insert(handle.id(), handle.name());
    }

    pub(crate) fn contains(&self, handle: &TypeHandle) -> bool {
        self.available.contains_key(&handle.id())
    }

    /// All available type names, sorted for stable error messages.
    pub(crate) fn provided_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.available.values().copied().collect();
        names.sort_unstable();
        names
    }

    /// Builds the suggestion clause appended to a missing-type error.
    ///
    /// Trait objects cannot be enumerated from concrete values at runtime,
    /// so when the missing type is a trait object the message points at the
    /// `Arc`-wrapped values that were registered and recommends
    /// `provide_as`.
    pub(crate) fn suggestion(&self, missing: &TypeHandle) -> String {
        if !missing.is_trait_object() {
            return String::new();
        }
        let candidates: Vec<&str> = self
            .available
            .values()
            .filter(|name| name.starts_with("alloc::sync::Arc<") && !name.contains("dyn "))
            .copied()
            .collect();
        match candidates.len() {
            0 => format!(
                " Type `{missing}` is a trait object and is not provided by any \
                 registered value; trait objects must be registered explicitly \
                 with `provide_as`."
            ),
            1 => format!(
                " Type `{missing}` is a trait object; the provided `{}` may \
                 implement it. Did you mean to register it with \
                 `provide_as::<{missing}>(value)` instead of `provide(value)`?",
                candidates[0]
            ),
            n => format!(
                " Type `{missing}` is a trait object; {n} provided values may \
                 implement it: [{}]. Register the intended one with \
                 `provide_as::<{missing}>(value)`.",
                candidates.join(", ")
            ),
        }
    }
}
