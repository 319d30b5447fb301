//! Opaque type identifiers used as keys into the per-run value map.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// An opaque identifier for a value type.
///
/// Two handles compare equal iff the underlying Rust types are identical:
/// `Arc<dyn Db>` is distinct from `Arc<DbImpl>`, and `&T` is distinct from
/// `T`. The rendered name is carried alongside the id purely for
/// diagnostics and code generation.
///
/// # Example
///
/// ```rust
/// use strata_chain::TypeHandle;
///
/// let a = TypeHandle::of::<String>();
/// let b = TypeHandle::of::<String>();
/// let c = TypeHandle::of::<bool>();
///
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// assert!(a.name().ends_with("String"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TypeHandle {
    id: TypeId,
    name: &'static str,
}

impl TypeHandle {
    /// Creates the handle for `T`.
    ///
    /// `T` may be unsized, so trait objects work: `TypeHandle::of::<dyn
    /// std::fmt::Debug>()` is a valid (and distinct) handle.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Returns the type id backing this handle.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the fully-qualified rendered type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if the handle names a trait object (directly or
    /// behind a wrapper such as `Arc<dyn T>`).
    ///
    /// Used only for diagnostics: trait objects cannot be recovered from a
    /// concrete value once registered, so missing-type messages steer the
    /// caller towards `provide_as`.
    #[must_use]
    pub fn is_trait_object(&self) -> bool {
        self.name.contains("dyn ")
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
