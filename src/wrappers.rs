//! Wrapper emitters.
//!
//! Builds the define-style, require/exports and universal preambles and
//! postambles around a rewritten body. Bodies inside a factory function are
//! indented one tab; the indentation itself is applied by the edit buffer so
//! template literals stay untouched.

use serde::{Deserialize, Serialize};

use crate::errors::{CompileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Amd,
    Cjs,
    Umd,
}

/// One external dependency of the output artifact.
#[derive(Debug, Clone)]
pub struct Dep {
    /// Path for the define-style dependency array.
    pub amd_path: String,
    /// Path handed to `require`.
    pub require_path: String,
    /// Name read off the global object in the universal fallback.
    pub global_name: String,
    /// Factory parameter; bare side-effect imports have none.
    pub name: Option<String>,
    /// Needs the default/named interop alias in strict emissions.
    pub interop: bool,
}

#[derive(Debug, Default)]
pub struct WrapperSpec<'a> {
    pub format: Option<Format>,
    /// The output writes to an `exports` object.
    pub has_exports: bool,
    /// Global name for the universal wrapper.
    pub name: Option<&'a str>,
    /// Module id passed as the first `define` argument.
    pub amd_name: Option<&'a str>,
    pub deps: Vec<Dep>,
    /// Single-file CJS keeps requires at the original import sites.
    pub requires_in_body: bool,
    /// Strict bundles: chained exports read through accessors.
    pub getters: Vec<(String, String)>,
    /// Early exports, hoisted for cyclic dependents.
    pub hoisted: Vec<(String, String)>,
    /// Defaults mode: identifier returned / assigned to `module.exports`.
    pub trailing_default: Option<String>,
}

#[derive(Debug)]
pub struct Wrapper {
    pub intro: String,
    pub outro: String,
    pub body_indent: Option<&'static str>,
}

pub fn build(spec: &WrapperSpec<'_>) -> Result<Wrapper> {
    match spec.format {
        Some(Format::Amd) => build_amd(spec),
        Some(Format::Cjs) => Ok(build_cjs(spec)),
        Some(Format::Umd) => build_umd(spec),
        None => Ok(build_concat(spec)),
    }
}

fn named_deps<'s>(spec: &'s WrapperSpec<'_>) -> Vec<&'s Dep> {
    spec.deps.iter().filter(|d| d.name.is_some()).collect()
}

fn bare_deps<'s>(spec: &'s WrapperSpec<'_>) -> Vec<&'s Dep> {
    spec.deps.iter().filter(|d| d.name.is_none()).collect()
}

fn amd_dep_array(spec: &WrapperSpec<'_>) -> String {
    let mut paths: Vec<String> = Vec::new();
    if spec.has_exports {
        paths.push("'exports'".to_string());
    }
    for dep in named_deps(spec) {
        paths.push(format!("'{}'", dep.amd_path));
    }
    for dep in bare_deps(spec) {
        paths.push(format!("'{}'", dep.amd_path));
    }
    paths.join(", ")
}

fn factory_params(spec: &WrapperSpec<'_>) -> String {
    let mut params: Vec<&str> = Vec::new();
    if spec.has_exports {
        params.push("exports");
    }
    for dep in named_deps(spec) {
        params.push(dep.name.as_deref().unwrap_or_default());
    }
    params.join(", ")
}

/// Interop aliases, accessor getters and hoisted exports, one per line.
fn preamble_lines(spec: &WrapperSpec<'_>, indent: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for dep in named_deps(spec).iter().filter(|d| d.interop) {
        let name = dep.name.as_deref().unwrap_or_default();
        lines.push(format!(
            "var {name}__default = ('default' in {name} ? {name}['default'] : {name});"
        ));
    }
    for (exported, repl) in &spec.getters {
        lines.push(format!(
            "Object.defineProperty(exports, '{exported}', {{ get: function () {{ return {repl}; }}, enumerable: true }});"
        ));
    }
    for (exported, repl) in &spec.hoisted {
        lines.push(format!("exports.{exported} = {repl};"));
    }
    if lines.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for line in lines {
        out.push_str(indent);
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATES
// ═══════════════════════════════════════════════════════════════════════════════

fn build_amd(spec: &WrapperSpec<'_>) -> Result<Wrapper> {
    let id = match spec.amd_name {
        Some(name) => format!("'{name}', "),
        None => String::new(),
    };
    let intro = format!(
        "define({id}[{deps}], function ({params}) {{\n\n\t'use strict';\n\n{preamble}",
        deps = amd_dep_array(spec),
        params = factory_params(spec),
        preamble = preamble_lines(spec, "\t"),
    );
    let outro = match &spec.trailing_default {
        Some(value) => format!("\n\n\treturn {value};\n\n}});\n"),
        None => "\n\n});\n".to_string(),
    };
    Ok(Wrapper {
        intro,
        outro,
        body_indent: Some("\t"),
    })
}

fn build_cjs(spec: &WrapperSpec<'_>) -> Wrapper {
    let mut intro = String::from("'use strict';\n\n");
    if !spec.requires_in_body {
        let mut wrote = false;
        for dep in &spec.deps {
            match &dep.name {
                Some(name) => {
                    intro.push_str(&format!("var {} = require('{}');\n", name, dep.require_path))
                }
                None => intro.push_str(&format!("require('{}');\n", dep.require_path)),
            }
            wrote = true;
        }
        if wrote {
            intro.push('\n');
        }
    }
    intro.push_str(&preamble_lines(spec, ""));
    let outro = match &spec.trailing_default {
        Some(value) => format!("\n\nmodule.exports = {value};\n"),
        None => "\n".to_string(),
    };
    Wrapper {
        intro,
        outro,
        body_indent: None,
    }
}

fn build_umd(spec: &WrapperSpec<'_>) -> Result<Wrapper> {
    let name = spec.name.ok_or(CompileError::MissingName)?;

    let requires: Vec<String> = spec
        .deps
        .iter()
        .map(|d| format!("require('{}')", d.require_path))
        .collect();
    let globals: Vec<String> = spec
        .deps
        .iter()
        .map(|d| format!("global.{}", d.global_name))
        .collect();
    let define_id = match spec.amd_name {
        Some(amd_name) => format!("'{amd_name}', "),
        None => String::new(),
    };

    let (cjs_branch, amd_branch, global_branch) = if spec.has_exports {
        let mut factory_args = vec!["exports".to_string()];
        factory_args.extend(requires);
        let mut global_args = vec![format!("(global.{name} = {{}})")];
        global_args.extend(globals);
        (
            format!("factory({})", factory_args.join(", ")),
            format!("define({define_id}[{}], factory)", amd_dep_array(spec)),
            format!("(factory({}))", global_args.join(", ")),
        )
    } else {
        (
            format!("module.exports = factory({})", requires.join(", ")),
            format!("define({define_id}[{}], factory)", amd_dep_array(spec)),
            format!("(global.{name} = factory({}))", globals.join(", ")),
        )
    };

    let intro = format!(
        "(function (global, factory) {{\n\
         \ttypeof exports === 'object' && typeof module !== 'undefined' ? {cjs_branch} :\n\
         \ttypeof define === 'function' && define.amd ? {amd_branch} :\n\
         \t{global_branch};\n\
         }}(this, function ({params}) {{\n\n\t'use strict';\n\n{preamble}",
        params = factory_params(spec),
        preamble = preamble_lines(spec, "\t"),
    );
    let outro = match &spec.trailing_default {
        Some(value) => format!("\n\n\treturn {value};\n\n}}));\n"),
        None => "\n\n}));\n".to_string(),
    };
    Ok(Wrapper {
        intro,
        outro,
        body_indent: Some("\t"),
    })
}

/// The IIFE used by `concat`; intro/outro are overridable by the caller.
fn build_concat(spec: &WrapperSpec<'_>) -> Wrapper {
    let _ = spec;
    Wrapper {
        intro: "(function () { 'use strict';\n\n".to_string(),
        outro: "\n\n})();\n".to_string(),
        body_indent: Some("\t"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(path: &str, name: Option<&str>) -> Dep {
        Dep {
            amd_path: path.to_string(),
            require_path: path.to_string(),
            global_name: name.unwrap_or("dep").to_string(),
            name: name.map(|n| n.to_string()),
            interop: false,
        }
    }

    #[test]
    fn test_amd_prepends_exports() {
        let wrapper = build(&WrapperSpec {
            format: Some(Format::Amd),
            has_exports: true,
            deps: vec![dep("./a", Some("a"))],
            ..WrapperSpec::default()
        })
        .unwrap();
        assert!(wrapper
            .intro
            .starts_with("define(['exports', './a'], function (exports, a) {"));
        assert!(wrapper.intro.contains("'use strict';"));
    }

    #[test]
    fn test_amd_name_and_bare_deps() {
        let wrapper = build(&WrapperSpec {
            format: Some(Format::Amd),
            amd_name: Some("my/mod"),
            deps: vec![dep("./a", Some("a")), dep("./polyfill", None)],
            trailing_default: Some("a".to_string()),
            ..WrapperSpec::default()
        })
        .unwrap();
        assert!(wrapper
            .intro
            .starts_with("define('my/mod', ['./a', './polyfill'], function (a) {"));
        assert!(wrapper.outro.contains("return a;"));
    }

    #[test]
    fn test_cjs_requires() {
        let wrapper = build(&WrapperSpec {
            format: Some(Format::Cjs),
            has_exports: true,
            deps: vec![dep("ext", Some("ext")), dep("./side", None)],
            ..WrapperSpec::default()
        })
        .unwrap();
        assert!(wrapper.intro.starts_with("'use strict';\n\n"));
        assert!(wrapper.intro.contains("var ext = require('ext');\n"));
    }

    #[test]
    fn test_umd_requires_name() {
        let err = build(&WrapperSpec {
            format: Some(Format::Umd),
            has_exports: true,
            ..WrapperSpec::default()
        })
        .unwrap_err();
        assert!(matches!(err, CompileError::MissingName));
    }

    #[test]
    fn test_umd_strict_branches() {
        let wrapper = build(&WrapperSpec {
            format: Some(Format::Umd),
            has_exports: true,
            name: Some("Lib"),
            deps: vec![dep("ext", Some("ext"))],
            ..WrapperSpec::default()
        })
        .unwrap();
        assert!(wrapper.intro.contains("factory(exports, require('ext'))"));
        assert!(wrapper.intro.contains("define(['exports', 'ext'], factory)"));
        assert!(wrapper.intro.contains("(factory((global.Lib = {}), global.ext))"));
    }

    #[test]
    fn test_umd_defaults_branches() {
        let wrapper = build(&WrapperSpec {
            format: Some(Format::Umd),
            name: Some("Lib"),
            deps: vec![dep("ext", Some("ext"))],
            trailing_default: Some("lib".to_string()),
            ..WrapperSpec::default()
        })
        .unwrap();
        assert!(wrapper.intro.contains("module.exports = factory(require('ext'))"));
        assert!(wrapper.intro.contains("(global.Lib = factory(global.ext))"));
        assert!(wrapper.outro.contains("return lib;"));
    }

    #[test]
    fn test_interop_and_getters() {
        let mut external = dep("ext", Some("ext"));
        external.interop = true;
        let wrapper = build(&WrapperSpec {
            format: Some(Format::Cjs),
            has_exports: true,
            deps: vec![external],
            getters: vec![("v".to_string(), "a__v".to_string())],
            hoisted: vec![("bar".to_string(), "a__bar".to_string())],
            ..WrapperSpec::default()
        })
        .unwrap();
        assert!(wrapper
            .intro
            .contains("var ext__default = ('default' in ext ? ext['default'] : ext);"));
        assert!(wrapper.intro.contains(
            "Object.defineProperty(exports, 'v', { get: function () { return a__v; }, enumerable: true });"
        ));
        assert!(wrapper.intro.contains("exports.bar = a__bar;"));
    }
}
