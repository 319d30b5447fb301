//! Source-level projection of a chain into a plain handler function.
//!
//! [`Chain::code`] writes Rust source for a function that performs the
//! same calls as the reflective executor, with all type resolution
//! flattened into ordinary variables:
//!
//! ```text
//! pub fn NAME(<one param per provided value>) -> impl Fn(<declared args>) {
//!     move |...| { ... }
//! }
//! ```
//!
//! The generated function assumes the referenced types and any
//! foreign-module functions are in scope in the target module; handlers
//! must be named functions (a closure's type name is not utterable in
//! source). Deferred handlers are projected as closures pushed onto a
//! `deferred` vector at their registration point and drained in reverse at
//! the end, which preserves both the LIFO order and the rule that a defer
//! registered after the failing step never runs. Unlike the executor, a
//! projected defer captures its non-failure inputs at registration.

use std::fmt::{self, Write};

use crate::chain::{Chain, Step, StepKind};
use crate::error::Failure;
use crate::handle::TypeHandle;
use crate::naming::{display_fn, display_type, NameMapper};

impl Chain {
    /// Writes the reflection-free source form of this chain.
    ///
    /// `name` is the emitted function name and `module` the path of the
    /// module the source will live in; functions defined in `module` are
    /// emitted unqualified.
    ///
    /// # Errors
    ///
    /// Forwards formatting errors from the writer.
    pub fn code(&self, name: &str, module: &str, w: &mut dyn Write) -> fmt::Result {
        let mut vars = NameMapper::new();
        let failure = TypeHandle::of::<Failure>();

        let values: Vec<&Step> = self
            .steps
            .iter()
            .filter(|s| s.kind == StepKind::Value)
            .collect();
        let args: Vec<&Step> = self
            .steps
            .iter()
            .filter(|s| s.kind == StepKind::Arg)
            .collect();
        let has_fallible = self.steps.iter().any(|s| s.fallible);
        let has_post = self.steps.iter().any(|s| s.kind == StepKind::Post);

        if has_fallible || has_post {
            // Claim the canonical failure name before any other type can.
            vars.name_for(&failure);
        }

        writeln!(w, "pub fn {name}(")?;
        for step in &values {
            let handle = step.declared.expect("value steps carry a handle");
            writeln!(
                w,
                "    {}: {},",
                vars.name_for(&handle),
                display_type(handle.name())
            )?;
        }
        let arg_types: Vec<String> = args
            .iter()
            .map(|s| display_type(s.declared.expect("arg steps carry a handle").name()))
            .collect();
        writeln!(w, ") -> impl Fn({}) {{", arg_types.join(", "))?;

        let arg_params: Vec<String> = args
            .iter()
            .map(|s| {
                let handle = s.declared.expect("arg steps carry a handle");
                format!("{}: {}", vars.name_for(&handle), display_type(handle.name()))
            })
            .collect();
        if arg_params.is_empty() {
            writeln!(w, "    move || {{")?;
        } else {
            writeln!(w, "    move |{}| {{", arg_params.join(", "))?;
        }

        let err_name = if has_fallible || has_post {
            vars.name_for(&failure)
        } else {
            String::new()
        };
        if has_post {
            writeln!(
                w,
                "        let mut deferred: Vec<Box<dyn FnOnce(&Failure)>> = Vec::new();"
            )?;
        }
        if has_fallible {
            writeln!(w, "        let mut {err_name} = Failure::none();")?;
        } else if has_post {
            writeln!(w, "        let {err_name} = Failure::none();")?;
        }
        if has_fallible {
            writeln!(w, "        'run: {{")?;
        }
        let indent = if has_fallible {
            "            "
        } else {
            "        "
        };

        let mut error_handler: Option<&Step> = None;
        let mut first = true;
        for step in &self.steps {
            match step.kind {
                StepKind::Arg | StepKind::Value => {}
                StepKind::Err => error_handler = Some(step),
                StepKind::Pre => {
                    if !first {
                        writeln!(w)?;
                    }
                    first = false;
                    self.emit_pre(w, step, &mut vars, module, error_handler, &err_name, indent)?;
                }
                StepKind::Post => {
                    if !first {
                        writeln!(w)?;
                    }
                    first = false;
                    emit_post(w, step, &mut vars, module, &err_name, indent)?;
                }
            }
        }

        if has_fallible {
            writeln!(w, "        }}")?;
        }
        if has_post {
            writeln!(w, "        while let Some(defer) = deferred.pop() {{")?;
            writeln!(w, "            defer(&{err_name});")?;
            writeln!(w, "        }}")?;
        }
        writeln!(w, "    }}")?;
        writeln!(w, "}}")?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_pre(
        &self,
        w: &mut dyn Write,
        step: &Step,
        vars: &mut NameMapper,
        module: &str,
        error_handler: Option<&Step>,
        err_name: &str,
        indent: &str,
    ) -> fmt::Result {
        let failure = TypeHandle::of::<Failure>();
        let call = render_call(step, vars, module);
        let outs: Vec<String> = step
            .outputs
            .iter()
            .filter(|o| **o != failure)
            .map(|o| vars.name_for(o))
            .collect();
        let binding = match outs.len() {
            0 => String::new(),
            1 => outs[0].clone(),
            _ => format!("({})", outs.join(", ")),
        };

        if !step.fallible {
            if binding.is_empty() {
                writeln!(w, "{indent}{call};")?;
            } else {
                writeln!(w, "{indent}let {binding} = {call};")?;
            }
            return Ok(());
        }

        let recover = render_error_call(error_handler, vars, module, err_name);
        if binding.is_empty() {
            writeln!(w, "{indent}if let Err(e) = {call} {{")?;
            writeln!(w, "{indent}    {err_name} = Failure::of(e);")?;
            writeln!(w, "{indent}    {recover}")?;
            writeln!(w, "{indent}    break 'run;")?;
            writeln!(w, "{indent}}}")?;
        } else {
            writeln!(w, "{indent}let {binding} = match {call} {{")?;
            writeln!(w, "{indent}    Ok(value) => value,")?;
            writeln!(w, "{indent}    Err(e) => {{")?;
            writeln!(w, "{indent}        {err_name} = Failure::of(e);")?;
            writeln!(w, "{indent}        {recover}")?;
            writeln!(w, "{indent}        break 'run;")?;
            writeln!(w, "{indent}    }}")?;
            writeln!(w, "{indent}}};")?;
        }
        Ok(())
    }
}

fn render_call(step: &Step, vars: &mut NameMapper, module: &str) -> String {
    let args: Vec<String> = step
        .params
        .iter()
        .map(|p| format!("{}.clone()", vars.name_for(p)))
        .collect();
    format!("{}({})", display_fn(step.name, module), args.join(", "))
}

fn render_error_call(
    handler: Option<&Step>,
    vars: &mut NameMapper,
    module: &str,
    err_name: &str,
) -> String {
    match handler {
        Some(step) => {
            let failure = TypeHandle::of::<Failure>();
            let args: Vec<String> = step
                .params
                .iter()
                .map(|p| {
                    if *p == failure {
                        format!("{err_name}.clone()")
                    } else {
                        format!("{}.clone()", vars.name_for(p))
                    }
                })
                .collect();
            format!("{}({});", display_fn(step.name, module), args.join(", "))
        }
        None => format!("panic!(\"unhandled chain failure: {{}}\", {err_name});"),
    }
}

fn emit_post(
    w: &mut dyn Write,
    step: &Step,
    vars: &mut NameMapper,
    module: &str,
    err_name: &str,
    indent: &str,
) -> fmt::Result {
    let failure = TypeHandle::of::<Failure>();
    let mut captures: Vec<String> = Vec::new();
    let mut takes_failure = false;
    let args: Vec<String> = step
        .params
        .iter()
        .map(|p| {
            if *p == failure {
                takes_failure = true;
                format!("{err_name}.clone()")
            } else {
                let name = vars.name_for(p);
                if !captures.contains(&name) {
                    captures.push(name.clone());
                }
                name
            }
        })
        .collect();
    let call = format!("{}({})", display_fn(step.name, module), args.join(", "));
    let param = if takes_failure {
        err_name.to_string()
    } else {
        format!("_{err_name}")
    };

    if captures.is_empty() {
        writeln!(
            w,
            "{indent}deferred.push(Box::new(move |{param}: &Failure| {call}));"
        )?;
    } else {
        writeln!(w, "{indent}deferred.push(Box::new({{")?;
        for capture in &captures {
            writeln!(w, "{indent}    let {capture} = {capture}.clone();")?;
        }
        writeln!(w, "{indent}    move |{param}: &Failure| {call}")?;
        writeln!(w, "{indent}}}));")?;
    }
    Ok(())
}
