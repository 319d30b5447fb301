//! Variable naming for generated source.
//!
//! The name mapper assigns one short, stable identifier per type handle.
//! Well-known chain types get canonical names (`rw`, `req`, `err`, ...);
//! everything else is derived from the type name with wrapper prefixes
//! (`p_` for references, `vec_of_`, `opt_`), falling back to module-token
//! disambiguation and finally `__varN__`. Rust keywords and primitive type
//! names are never produced.

use std::collections::{HashMap, HashSet};

use crate::handle::TypeHandle;

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "union", "unsafe", "use", "where", "while", "abstract", "become", "box", "do",
    "final", "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

const PRIMITIVES: &[&str] = &[
    "bool", "char", "str", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32",
    "u64", "u128", "usize", "f32", "f64",
];

fn disallowed(name: &str) -> bool {
    KEYWORDS.contains(&name) || PRIMITIVES.contains(&name)
}

/// Simplifies a fully-qualified type name for emission: every path is
/// reduced to its final segment, while generics, references, and `dyn`
/// markers are preserved. `alloc::sync::Arc<dyn app::db::UserDb>` becomes
/// `Arc<dyn UserDb>`.
///
/// Generated source therefore assumes the referenced types are in scope in
/// the target module.
#[must_use]
pub fn display_type(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut segment = String::new();
    for c in name.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            segment.push(c);
        } else {
            flush_segment(&mut out, &mut segment);
            out.push(c);
        }
    }
    flush_segment(&mut out, &mut segment);
    out
}

fn flush_segment(out: &mut String, segment: &mut String) {
    if segment.is_empty() {
        return;
    }
    let last = segment.rsplit("::").next().unwrap_or(segment);
    out.push_str(last);
    segment.clear();
}

/// Renders a function path for emission in `module`: the module's own
/// functions are emitted bare, everything else stays fully qualified.
#[must_use]
pub fn display_fn(name: &str, module: &str) -> String {
    if module.is_empty() {
        return name.to_string();
    }
    match name.strip_prefix(module) {
        Some(rest) => rest.strip_prefix("::").unwrap_or(rest).to_string(),
        None => name.to_string(),
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_numeric());
            let next_lower = i + 1 < chars.len() && chars[i + 1].is_lowercase();
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c.is_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    collapse_underscores(&out)
}

fn collapse_underscores(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_underscore = false;
    for c in s.chars() {
        if c == '_' {
            if !prev_underscore {
                out.push(c);
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }
    out.trim_matches('_').to_string()
}

fn extract_caps(name: &str) -> String {
    if name.contains('_') {
        return String::new();
    }
    let mut caps = String::new();
    for (i, c) in name.chars().enumerate() {
        if i == 0 || c.is_uppercase() || c.is_numeric() {
            caps.extend(c.to_lowercase());
        }
    }
    caps
}

fn assemble(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}_{name}")
    }
}

/// Splits off wrapper constructors, returning a variable-name prefix and
/// the innermost base type name.
fn unwrap_type(display: &str) -> (String, String) {
    let mut prefix = String::new();
    let mut rest = display.trim();
    loop {
        if let Some(inner) = rest.strip_prefix('&') {
            prefix = join_prefix(&prefix, "p");
            rest = inner.trim_start().trim_start_matches("mut ").trim_start();
        } else if let Some(inner) = strip_wrapper(rest, "Arc") {
            rest = inner;
        } else if let Some(inner) = strip_wrapper(rest, "Box") {
            rest = inner;
        } else if let Some(inner) = strip_wrapper(rest, "Vec") {
            prefix = join_prefix(&prefix, "vec_of");
            rest = inner;
        } else if let Some(inner) = strip_wrapper(rest, "Option") {
            prefix = join_prefix(&prefix, "opt");
            rest = inner;
        } else if let Some(inner) = rest.strip_prefix("dyn ") {
            rest = inner.trim_start();
        } else {
            break;
        }
    }
    (prefix, rest.to_string())
}

fn join_prefix(existing: &str, next: &str) -> String {
    if existing.is_empty() {
        next.to_string()
    } else {
        format!("{existing}_{next}")
    }
}

fn strip_wrapper<'a>(s: &'a str, wrapper: &str) -> Option<&'a str> {
    s.strip_prefix(wrapper)
        .and_then(|rest| rest.strip_prefix('<'))
        .and_then(|rest| rest.strip_suffix('>'))
}

fn well_known(base: &str) -> &'static [&'static str] {
    match base {
        "Rw" => &["rw", "w"],
        "Request" => &["req", "r"],
        "Params" => &["params"],
        "Failure" => &["err", "failure"],
        "String" => &["str", "s", "text"],
        "bool" => &["flag", "b"],
        _ => &[],
    }
}

/// The module token immediately preceding `base` in the raw type path, if
/// any: for `app::store::UserDb` with base `UserDb` this is `store`.
fn module_token(raw: &str, base: &str) -> Option<String> {
    let pos = raw.rfind(base)?;
    let head = raw[..pos].strip_suffix("::")?;
    let token = head
        .rsplit(|c: char| !(c.is_alphanumeric() || c == '_' || c == ':'))
        .next()?
        .rsplit("::")
        .next()?;
    if token.is_empty() {
        None
    } else {
        Some(token.to_lowercase())
    }
}

/// Assigns short, stable variable names per type handle.
#[derive(Debug, Default)]
pub struct NameMapper {
    assigned: HashMap<TypeHandle, String>,
    used: HashSet<String>,
}

impl NameMapper {
    /// Creates an empty mapper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a name has already been assigned for the handle.
    #[must_use]
    pub fn has(&self, handle: &TypeHandle) -> bool {
        self.assigned.contains_key(handle)
    }

    /// Marks a name as taken without binding it to a type.
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    /// Returns the variable name for the handle, assigning one on first
    /// use.
    pub fn name_for(&mut self, handle: &TypeHandle) -> String {
        if let Some(existing) = self.assigned.get(handle) {
            return existing.clone();
        }
        let name = self
            .options(handle)
            .into_iter()
            .find(|candidate| !candidate.is_empty() && !disallowed(candidate) && !self.used.contains(candidate))
            .unwrap_or_else(|| format!("__var{}__", self.used.len()));
        self.used.insert(name.clone());
        self.assigned.insert(*handle, name.clone());
        name
    }

    fn options(&self, handle: &TypeHandle) -> Vec<String> {
        let display = display_type(handle.name());
        let (prefix, base) = unwrap_type(&display);

        let mut options: Vec<String> = well_known(&base)
            .iter()
            .map(|name| assemble(&prefix, name))
            .collect();

        let snake = snake_case(&base);
        if !snake.is_empty() {
            options.push(assemble(&prefix, &snake));
            if let Some(token) = module_token(handle.name(), &base) {
                options.push(assemble(&prefix, &format!("{token}_{snake}")));
            }
            let caps = extract_caps(&base);
            if !caps.is_empty() {
                options.push(assemble(&prefix, &caps));
                if let Some(first) = caps.chars().next() {
                    options.push(assemble(&prefix, &first.to_string()));
                }
            }
        }
        options
    }
}
