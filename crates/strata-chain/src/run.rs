//! Chain execution: arg binding, the three phases, and panic capture.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::chain::{Chain, Step, StepKind};
use crate::error::{ArgMismatch, Failure, PanicFailure, StepInfo};
use crate::inject::{Args, ValueMap};
use crate::ordinal::ordinalize;

/// Whether a captured panic becomes the run's pending error or is only
/// reported through the process hooks.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Normal,
    Recovery,
}

impl Chain {
    /// Executes the chain.
    ///
    /// All declared args must be supplied, in declaration order, via
    /// `args`. The returned error is exclusively about the shape of that
    /// argument list; failures of the functions *in* the chain are routed
    /// to the registered error handlers and never surface here. Likewise a
    /// panicking handler does not propagate: the panic is captured,
    /// wrapped into a [`PanicFailure`], and delivered to the active error
    /// handler.
    ///
    /// Each run owns its own type→value map, so any number of concurrent
    /// runs may share one chain.
    pub fn run(&self, args: Args) -> Result<(), ArgMismatch> {
        let mut map = ValueMap::new();
        self.bind_args(&mut map, args)?;

        let mut executed: Vec<StepInfo> = Vec::new();
        let mut deferred: Vec<&Step> = Vec::new();
        let mut error_handler: Option<&Step> = None;
        let mut pending: Option<Failure> = None;

        for step in &self.steps {
            match step.kind {
                // Bound during arg processing above.
                StepKind::Arg => {}
                StepKind::Value => {
                    if let (Some(handle), Some(value)) = (step.declared, &step.value) {
                        map.bind_erased(handle.id(), value.clone());
                    }
                }
                StepKind::Pre => {
                    if let Some(failure) =
                        self.invoke(step, &mut map, &mut executed, Phase::Normal)
                    {
                        pending = Some(failure);
                        break;
                    }
                }
                StepKind::Post => deferred.push(step),
                StepKind::Err => error_handler = Some(step),
            }
        }

        if let Some(failure) = &pending {
            match error_handler {
                Some(step) => {
                    self.invoke(step, &mut map, &mut executed, Phase::Recovery);
                }
                None => (self.hooks.on_unhandled)(failure),
            }
        } else if map.get::<Failure>().is_none() {
            // Defers may accept Failure even when nothing failed.
            map.bind(Failure::none());
        }

        for step in deferred.iter().rev() {
            self.invoke(step, &mut map, &mut executed, Phase::Recovery);
        }

        Ok(())
    }

    /// Like [`run`](Chain::run), but panics on an argument mismatch.
    ///
    /// Intended for dispatch sites that constructed the argument list from
    /// the chain's own declarations, where a mismatch is a programming
    /// error.
    ///
    /// # Panics
    ///
    /// Panics with the [`ArgMismatch`] message.
    pub fn must_run(&self, args: Args) {
        if let Err(err) = self.run(args) {
            panic!("{err}");
        }
    }

    fn bind_args(&self, map: &mut ValueMap, args: Args) -> Result<(), ArgMismatch> {
        let supplied = args.into_entries();
        let mut index = 0usize;
        let mut missing: Vec<&'static str> = Vec::new();
        let mut expected = 0usize;

        for step in &self.steps {
            if step.kind != StepKind::Arg {
                continue;
            }
            let declared = step
                .declared
                .expect("arg step always carries its declared handle");
            expected += 1;
            let Some((handle, value)) = supplied.get(index) else {
                missing.push(declared.name());
                continue;
            };
            index += 1;
            if *handle != declared {
                return Err(ArgMismatch::WrongType {
                    ordinal: ordinalize(index),
                    expected: declared.name(),
                    got: handle.name(),
                });
            }
            map.bind_erased(declared.id(), value.clone());
        }

        if !missing.is_empty() {
            return Err(ArgMismatch::Missing { types: missing });
        }
        if index != supplied.len() {
            return Err(ArgMismatch::TooMany {
                expected,
                got: supplied.len(),
            });
        }
        Ok(())
    }

    fn invoke(
        &self,
        step: &Step,
        map: &mut ValueMap,
        executed: &mut Vec<StepInfo>,
        phase: Phase,
    ) -> Option<Failure> {
        let call = step
            .call
            .as_ref()
            .expect("handler steps always carry a callable");
        executed.push(step.info());
        match catch_unwind(AssertUnwindSafe(|| call(map))) {
            Ok(outcome) => match phase {
                Phase::Normal => outcome,
                Phase::Recovery => None,
            },
            Err(payload) => {
                let failure = Failure::of(PanicFailure::new(payload.as_ref(), executed));
                match phase {
                    Phase::Normal => {
                        map.bind(failure.clone());
                        Some(failure)
                    }
                    Phase::Recovery => {
                        (self.hooks.on_swallowed)(&failure);
                        None
                    }
                }
            }
        }
    }
}
