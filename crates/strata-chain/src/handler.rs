//! The bridge between typed handler functions and the erased step machinery.
//!
//! Rust has no runtime reflection over function signatures, so each handler
//! is decomposed at registration time: its parameter and output types are
//! recorded as [`TypeHandle`]s for construction-time validation and code
//! generation, and the function itself is wrapped into a pre-computed
//! closure over the per-run [`ValueMap`]. Execution never inspects types
//! again.
//!
//! The [`Handler`] trait is implemented for functions and closures of up to
//! seven parameters returning:
//!
//! - nothing,
//! - a single injectable value,
//! - a tuple of up to three injectable values,
//! - or any of the above wrapped in `Result<_, E>` where `E` is a standard
//!   error. An `Err` sets the run's pending failure and aborts the normal
//!   phase.
//!
//! The `M` type parameter is an inference marker encoding the accepted
//! signature shape; callers never name it.

use std::sync::Arc;

use crate::error::Failure;
use crate::handle::TypeHandle;
use crate::inject::{Injectable, ValueMap};

/// A type-erased step invocation: resolves inputs from the map, calls the
/// handler, binds outputs, and reports a pending failure if one occurred.
pub type Callable = Arc<dyn Fn(&mut ValueMap) -> Option<Failure> + Send + Sync>;

/// A function usable as a chain step.
///
/// Implemented for `Fn` items and closures whose parameters are all
/// [`Injectable`] and whose return shape is one of the forms documented at
/// the [module level](self).
pub trait Handler<M>: Send + Sync + 'static {
    /// Parameter type handles, in declaration order.
    fn params() -> Vec<TypeHandle>;

    /// Output type handles bound on success. For fallible handlers the
    /// [`Failure`] handle appears last, mirroring the error-last return
    /// convention.
    fn outputs() -> Vec<TypeHandle>;

    /// Whether the handler returns a `Result`.
    fn fallible() -> bool;

    /// The handler's registered display name.
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Erases the handler into a map-to-map closure.
    fn erase(self) -> Callable;
}

macro_rules! resolve_params {
    ($map:ident, $name:expr, $pos:expr ;) => {};
    ($map:ident, $name:expr, $pos:expr ; $head:ident $(, $tail:ident)*) => {
        let $head: $head = $map.resolve::<$head>($pos, $name);
        resolve_params!($map, $name, $pos + 1 ; $($tail),*);
    };
}

macro_rules! impl_handler {
    // Handlers with no outputs.
    ([$($A:ident),*]) => {
        #[allow(non_snake_case)]
        impl<F, $($A,)*> Handler<(($($A,)*), ())> for F
        where
            F: Fn($($A),*) + Send + Sync + 'static,
            $($A: Injectable,)*
        {
            fn params() -> Vec<TypeHandle> {
                vec![$(TypeHandle::of::<$A>()),*]
            }

            fn outputs() -> Vec<TypeHandle> {
                Vec::new()
            }

            fn fallible() -> bool {
                false
            }

            fn erase(self) -> Callable {
                let f = self;
                Arc::new(move |map: &mut ValueMap| {
                    let name = std::any::type_name::<F>();
                    let _ = name;
                    resolve_params!(map, name, 1 ; $($A),*);
                    f($($A),*);
                    None
                })
            }
        }

        #[allow(non_snake_case)]
        impl<F, E, $($A,)*> Handler<(($($A,)*), (), E)> for F
        where
            F: Fn($($A),*) -> Result<(), E> + Send + Sync + 'static,
            E: std::error::Error + Send + Sync + 'static,
            $($A: Injectable,)*
        {
            fn params() -> Vec<TypeHandle> {
                vec![$(TypeHandle::of::<$A>()),*]
            }

            fn outputs() -> Vec<TypeHandle> {
                vec![TypeHandle::of::<Failure>()]
            }

            fn fallible() -> bool {
                true
            }

            fn erase(self) -> Callable {
                let f = self;
                Arc::new(move |map: &mut ValueMap| {
                    let name = std::any::type_name::<F>();
                    let _ = name;
                    resolve_params!(map, name, 1 ; $($A),*);
                    match f($($A),*) {
                        Ok(()) => {
                            map.bind(Failure::none());
                            None
                        }
                        Err(e) => {
                            let failure = Failure::of(e);
                            map.bind(failure.clone());
                            Some(failure)
                        }
                    }
                })
            }
        }
    };

    // Handlers with a single (bare) output.
    ([$($A:ident),*] -> $O1:ident) => {
        #[allow(non_snake_case)]
        impl<F, $O1, $($A,)*> Handler<(($($A,)*), ($O1,))> for F
        where
            F: Fn($($A),*) -> $O1 + Send + Sync + 'static,
            $O1: Injectable,
            $($A: Injectable,)*
        {
            fn params() -> Vec<TypeHandle> {
                vec![$(TypeHandle::of::<$A>()),*]
            }

            fn outputs() -> Vec<TypeHandle> {
                vec![TypeHandle::of::<$O1>()]
            }

            fn fallible() -> bool {
                false
            }

            fn erase(self) -> Callable {
                let f = self;
                Arc::new(move |map: &mut ValueMap| {
                    let name = std::any::type_name::<F>();
                    let _ = name;
                    resolve_params!(map, name, 1 ; $($A),*);
                    let out = f($($A),*);
                    map.bind(out);
                    None
                })
            }
        }

        #[allow(non_snake_case)]
        impl<F, E, $O1, $($A,)*> Handler<(($($A,)*), ($O1,), E)> for F
        where
            F: Fn($($A),*) -> Result<$O1, E> + Send + Sync + 'static,
            E: std::error::Error + Send + Sync + 'static,
            $O1: Injectable,
            $($A: Injectable,)*
        {
            fn params() -> Vec<TypeHandle> {
                vec![$(TypeHandle::of::<$A>()),*]
            }

            fn outputs() -> Vec<TypeHandle> {
                vec![TypeHandle::of::<$O1>(), TypeHandle::of::<Failure>()]
            }

            fn fallible() -> bool {
                true
            }

            fn erase(self) -> Callable {
                let f = self;
                Arc::new(move |map: &mut ValueMap| {
                    let name = std::any::type_name::<F>();
                    let _ = name;
                    resolve_params!(map, name, 1 ; $($A),*);
                    match f($($A),*) {
                        Ok(out) => {
                            map.bind(out);
                            map.bind(Failure::none());
                            None
                        }
                        Err(e) => {
                            let failure = Failure::of(e);
                            map.bind(failure.clone());
                            Some(failure)
                        }
                    }
                })
            }
        }
    };

    // Handlers with multiple (tuple) outputs.
    ([$($A:ident),*] -> ($($O:ident),+)) => {
        #[allow(non_snake_case)]
        impl<F, $($O,)+ $($A,)*> Handler<(($($A,)*), ($($O,)+))> for F
        where
            F: Fn($($A),*) -> ($($O,)+) + Send + Sync + 'static,
            $($O: Injectable,)+
            $($A: Injectable,)*
        {
            fn params() -> Vec<TypeHandle> {
                vec![$(TypeHandle::of::<$A>()),*]
            }

            fn outputs() -> Vec<TypeHandle> {
                vec![$(TypeHandle::of::<$O>()),+]
            }

            fn fallible() -> bool {
                false
            }

            fn erase(self) -> Callable {
                let f = self;
                Arc::new(move |map: &mut ValueMap| {
                    let name = std::any::type_name::<F>();
                    let _ = name;
                    resolve_params!(map, name, 1 ; $($A),*);
                    let ($($O,)+) = f($($A),*);
                    $(map.bind($O);)+
                    None
                })
            }
        }

        #[allow(non_snake_case)]
        impl<F, E, $($O,)+ $($A,)*> Handler<(($($A,)*), ($($O,)+), E)> for F
        where
            F: Fn($($A),*) -> Result<($($O,)+), E> + Send + Sync + 'static,
            E: std::error::Error + Send + Sync + 'static,
            $($O: Injectable,)+
            $($A: Injectable,)*
        {
            fn params() -> Vec<TypeHandle> {
                vec![$(TypeHandle::of::<$A>()),*]
            }

            fn outputs() -> Vec<TypeHandle> {
                vec![$(TypeHandle::of::<$O>(),)+ TypeHandle::of::<Failure>()]
            }

            fn fallible() -> bool {
                true
            }

            fn erase(self) -> Callable {
                let f = self;
                Arc::new(move |map: &mut ValueMap| {
                    let name = std::any::type_name::<F>();
                    let _ = name;
                    resolve_params!(map, name, 1 ; $($A),*);
                    match f($($A),*) {
                        Ok(($($O,)+)) => {
                            $(map.bind($O);)+
                            map.bind(Failure::none());
                            None
                        }
                        Err(e) => {
                            let failure = Failure::of(e);
                            map.bind(failure.clone());
                            Some(failure)
                        }
                    }
                })
            }
        }
    };
}

macro_rules! impl_handlers_for_arity {
    ($($A:ident),*) => {
        impl_handler!([$($A),*]);
        impl_handler!([$($A),*] -> O1);
        impl_handler!([$($A),*] -> (O1, O2));
        impl_handler!([$($A),*] -> (O1, O2, O3));
    };
}

impl_handlers_for_arity!();
impl_handlers_for_arity!(A1);
impl_handlers_for_arity!(A1, A2);
impl_handlers_for_arity!(A1, A2, A3);
impl_handlers_for_arity!(A1, A2, A3, A4);
impl_handlers_for_arity!(A1, A2, A3, A4, A5);
impl_handlers_for_arity!(A1, A2, A3, A4, A5, A6);
impl_handlers_for_arity!(A1, A2, A3, A4, A5, A6, A7);
