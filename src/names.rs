//! Module name allocation.
//!
//! Every module (local and external) gets a unique identifier used to
//! prefix deconflicted bindings and to name externals in the wrappers.
//! Default-import aliases are adopted when free; otherwise names derive
//! from path components, longest-suffix-first, sanitized into identifiers.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;

use crate::errors::{CompileError, Result};
use crate::graph::ModuleGraph;

lazy_static! {
    /// Identifiers claimed by the host environment or the wrappers
    /// themselves; never handed out and always treated as conflicting.
    pub static ref RESERVED: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for name in [
            "Array", "ArrayBuffer", "Boolean", "DataView", "Date", "Error", "EvalError",
            "Float32Array", "Float64Array", "Function", "Infinity", "Int8Array", "Int16Array",
            "Int32Array", "JSON", "Map", "Math", "NaN", "Number", "Object", "Promise", "Proxy",
            "RangeError", "ReferenceError", "Reflect", "RegExp", "Set", "String", "Symbol",
            "SyntaxError", "TypeError", "URIError", "Uint8Array", "Uint8ClampedArray",
            "Uint16Array", "Uint32Array", "WeakMap", "WeakSet", "console", "decodeURI",
            "decodeURIComponent", "define", "document", "encodeURI", "encodeURIComponent",
            "escape", "eval", "exports", "global", "globalThis", "isFinite", "isNaN", "module",
            "parseFloat", "parseInt", "require", "undefined", "unescape", "window",
        ] {
            s.insert(name);
        }
        s
    };

    /// ECMAScript reserved words; sanitized path components that collide
    /// with one get an underscore prefix.
    static ref KEYWORDS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for word in [
            "break", "case", "catch", "class", "const", "continue", "debugger", "default",
            "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for",
            "function", "if", "import", "in", "instanceof", "let", "new", "null", "return",
            "static", "super", "switch", "this", "throw", "true", "try", "typeof", "var",
            "void", "while", "with", "yield",
        ] {
            s.insert(word);
        }
        s
    };
}

pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') && !KEYWORDS.contains(name)
}

/// Squeeze a path component into identifier characters; reserved words get
/// an underscore prefix.
pub fn sanitize(part: &str) -> String {
    let mut out: String = part
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if KEYWORDS.contains(out.as_str()) {
        out.insert(0, '_');
    }
    out
}

/// Derive a unique name from a module id's path components.
pub fn name_from_path(id: &str, used: &HashSet<String>) -> String {
    let parts: Vec<String> = id
        .split(['/', '\\'])
        .filter(|p| !p.is_empty() && *p != "." && *p != "..")
        .map(sanitize)
        .collect();
    if parts.is_empty() {
        let mut name = "_module".to_string();
        while used.contains(&name) || RESERVED.contains(name.as_str()) {
            name.insert(0, '_');
        }
        return name;
    }
    for start in (0..parts.len()).rev() {
        let candidate = parts[start..].join("_");
        if !used.contains(&candidate) && !RESERVED.contains(candidate.as_str()) {
            return candidate;
        }
    }
    let mut name = parts.join("_");
    while used.contains(&name) || RESERVED.contains(name.as_str()) {
        name.insert(0, '_');
    }
    name
}

/// Assign a unique `name` to every module and external in the graph.
pub fn allocate(
    graph: &mut ModuleGraph,
    user_names: &HashMap<String, String>,
    hook: Option<&dyn Fn(&str) -> Option<String>>,
) -> Result<()> {
    let mut used: HashSet<String> = RESERVED.iter().map(|s| s.to_string()).collect();

    // User-supplied names bind first.
    for index in 0..graph.modules.len() {
        let id = graph.modules[index].id.clone();
        if let Some(name) = supplied_name(&id, user_names, hook, &mut used)? {
            graph.modules[index].name = name;
        }
    }
    for index in 0..graph.externals.len() {
        let id = graph.externals[index].id.clone();
        if let Some(name) = supplied_name(&id, user_names, hook, &mut used)? {
            graph.externals[index].name = name;
        }
    }

    // Adopt default-import aliases where they are free.
    let mut adoptions: Vec<(bool, usize, String)> = Vec::new();
    for module in &graph.modules {
        for import in module.imports.iter().filter(|i| !i.passthrough) {
            let Some(id) = &import.id else { continue };
            for spec in &import.specifiers {
                let crate::declarations::ImportSpec::Default { local } = spec else {
                    continue;
                };
                if let Some(&index) = graph.lookup.get(id) {
                    adoptions.push((false, index, local.clone()));
                } else if let Some(&index) = graph.external_lookup.get(id) {
                    adoptions.push((true, index, local.clone()));
                }
            }
        }
    }
    for (external, index, alias) in adoptions {
        let slot = if external {
            &mut graph.externals[index].name
        } else {
            &mut graph.modules[index].name
        };
        if slot.is_empty() && !used.contains(&alias) && is_valid_identifier(&alias) {
            used.insert(alias.clone());
            *slot = alias;
        }
    }

    // Everything else derives from the path.
    for index in 0..graph.modules.len() {
        if graph.modules[index].name.is_empty() {
            let name = name_from_path(&graph.modules[index].id, &used);
            used.insert(name.clone());
            graph.modules[index].name = name;
        }
    }
    for index in 0..graph.externals.len() {
        if graph.externals[index].name.is_empty() {
            let name = name_from_path(&graph.externals[index].id, &used);
            used.insert(name.clone());
            graph.externals[index].name = name;
        }
    }

    Ok(())
}

fn supplied_name(
    id: &str,
    user_names: &HashMap<String, String>,
    hook: Option<&dyn Fn(&str) -> Option<String>>,
    used: &mut HashSet<String>,
) -> Result<Option<String>> {
    let name = user_names
        .get(id)
        .cloned()
        .or_else(|| hook.and_then(|f| f(id)));
    match name {
        Some(name) => {
            if used.contains(&name) {
                return Err(CompileError::NamingCollision { name });
            }
            used.insert(name.clone());
            Ok(Some(name))
        }
        None => Ok(None),
    }
}

/// Name the imports of a standalone module: path-derived, never colliding
/// with the module's own top-level declarations. Returns names keyed by the
/// import path as written.
pub fn single_module_names(
    module: &crate::module::Module,
    user_names: &HashMap<String, String>,
    hook: Option<&dyn Fn(&str) -> Option<String>>,
) -> Result<HashMap<String, String>> {
    let mut used: HashSet<String> = RESERVED.iter().map(|s| s.to_string()).collect();
    used.extend(module.analysis.top_level_names.iter().cloned());

    let mut names: HashMap<String, String> = HashMap::new();
    for import in &module.imports {
        if names.contains_key(&import.path) || import.is_empty() {
            continue;
        }
        let id = crate::resolve::amd_path(&import.path);
        if let Some(name) = supplied_name(&id, user_names, hook, &mut used)? {
            names.insert(import.path.clone(), name);
            continue;
        }
        let adopted = import.specifiers.iter().find_map(|s| match s {
            crate::declarations::ImportSpec::Default { local } => Some(local.clone()),
            _ => None,
        });
        let name = match adopted {
            Some(alias) if !used.contains(&alias) => alias,
            _ => name_from_path(&id, &used),
        };
        used.insert(name.clone());
        names.insert(import.path.clone(), name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("foo-bar"), "foo_bar");
        assert_eq!(sanitize("class"), "_class");
        assert_eq!(sanitize("3d"), "_3d");
    }

    #[test]
    fn test_name_from_path_prefers_short_suffix() {
        let used = HashSet::new();
        assert_eq!(name_from_path("utils/math", &used), "math");
        let mut used = HashSet::new();
        used.insert("math".to_string());
        assert_eq!(name_from_path("utils/math", &used), "utils_math");
        used.insert("utils_math".to_string());
        assert_eq!(name_from_path("utils/math", &used), "_utils_math");
    }

    #[test]
    fn test_reserved_never_allocated() {
        let used = HashSet::new();
        assert_eq!(name_from_path("module", &used), "_module");
    }
}
