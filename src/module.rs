//! Module loading.
//!
//! One load runs the parser adapter, scope annotator, fact collector and
//! declaration extractor inside a single allocator scope and distils the
//! result into a `Module` holding plain data only, no borrowed tree.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use oxc_allocator::Allocator;
use oxc_ast_visit::Visit;
use tracing::debug;

use crate::analyze::{Analysis, FactCollector};
use crate::declarations::{ExportDecl, ImportDecl};
use crate::errors::{CompileError, Result};
use crate::parse;
use crate::scope::ScopeBuilder;

// ═══════════════════════════════════════════════════════════════════════════════
// READER SEAM
// ═══════════════════════════════════════════════════════════════════════════════

/// Where module source comes from. The bundler only ever asks for exact
/// candidate paths, so this is the whole filesystem surface.
pub trait ModuleReader {
    fn read(&self, path: &str) -> io::Result<String>;
}

pub struct FsReader {
    pub base: PathBuf,
}

impl FsReader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        FsReader { base: base.into() }
    }
}

impl ModuleReader for FsReader {
    fn read(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(self.base.join(path))
    }
}

/// In-memory reader, the test seam.
#[derive(Default)]
pub struct MemoryReader {
    pub files: HashMap<String, String>,
}

impl MemoryReader {
    pub fn new<I, K, V>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        MemoryReader {
            files: files
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ModuleReader for MemoryReader {
    fn read(&self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODULE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct Module {
    pub id: String,
    /// The path the source was read from, used for source-map provenance.
    pub file: String,
    pub source: String,
    pub imports: Vec<ImportDecl>,
    pub exports: Vec<ExportDecl>,
    pub default_export: Option<usize>,
    pub does_export: Vec<String>,
    pub analysis: Analysis,
    /// Unique identifier prefix, assigned by the name allocator.
    pub name: String,
    /// True when another module imports or re-exports this one as a
    /// namespace.
    pub exports_namespace: bool,
}

impl Module {
    pub fn has_default(&self) -> bool {
        self.default_export.is_some()
    }

    /// Local name behind an exported name, for declaration-bodied exports.
    pub fn local_of_export(&self, exported: &str) -> Option<String> {
        for export in &self.exports {
            match export.declared_name() {
                Some(name) if !export.is_default && name == exported => {
                    return Some(name.to_string());
                }
                _ => {}
            }
            if let crate::declarations::ExportKind::Named { specifiers, .. } = &export.kind {
                for spec in specifiers {
                    if spec.exported == exported {
                        return Some(spec.name.clone());
                    }
                }
            }
        }
        None
    }
}

/// Parse and analyze one source file into a Module.
pub fn analyze_module(id: &str, file: &str, source: String) -> Result<Module> {
    debug!(id, file, "loading module");
    let (mut analysis, declarations) = {
        let allocator = Allocator::default();
        let program = parse::parse_program(&allocator, &source, file)?;

        let mut builder = ScopeBuilder::new();
        builder.visit_program(&program);
        let (tree, top_level_functions) = builder.finish();

        let mut collector = FactCollector::new(&tree);
        collector.visit_program(&program);
        let mut analysis = collector.finish();
        analysis.top_level_names = tree.root_names().to_vec();
        analysis.top_level_functions = top_level_functions;

        let declarations = crate::declarations::extract(&program, &source, id)?;
        (analysis, declarations)
    };
    analysis.sourcemap_comments = parse::sourcemap_comment_spans(&source);

    if analysis.this_member.is_some() {
        return Err(CompileError::TopLevelThisMember);
    }

    let mut default_export = None;
    let mut does_export = Vec::new();
    for (index, export) in declarations.exports.iter().enumerate() {
        if export.is_default {
            default_export = Some(index);
            does_export.push("default".to_string());
            continue;
        }
        match &export.kind {
            crate::declarations::ExportKind::Named { specifiers, .. } => {
                for spec in specifiers {
                    does_export.push(spec.exported.clone());
                }
            }
            other => {
                if let Some(name) = match other {
                    crate::declarations::ExportKind::VarDeclaration { name, .. }
                    | crate::declarations::ExportKind::NamedFunction { name, .. }
                    | crate::declarations::ExportKind::NamedClass { name, .. } => Some(name),
                    _ => None,
                } {
                    does_export.push(name.clone());
                }
            }
        }
    }

    Ok(Module {
        id: id.to_string(),
        file: file.to_string(),
        source,
        imports: declarations.imports,
        exports: declarations.exports,
        default_export,
        does_export,
        analysis,
        name: String::new(),
        exports_namespace: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_does_export_order() {
        let module = analyze_module(
            "m",
            "m.js",
            "export var a = 1;\nexport function b() {}\nexport default 3;\nexport { a as c };\n"
                .to_string(),
        )
        .unwrap();
        assert_eq!(module.does_export, ["a", "b", "default", "c"]);
        assert!(module.has_default());
        assert_eq!(module.local_of_export("c").as_deref(), Some("a"));
    }

    #[test]
    fn test_duplicate_default_rejected() {
        // Either our extractor or the parser itself reports this; both are
        // fatal, which is all the contract promises.
        assert!(analyze_module(
            "m",
            "m.js",
            "export default 1;\nexport default 2;\n".to_string(),
        )
        .is_err());
    }

    #[test]
    fn test_top_level_this_member_rejected() {
        let err = analyze_module("m", "m.js", "this.x = 1;\n".to_string()).unwrap_err();
        assert!(matches!(err, CompileError::TopLevelThisMember));
    }

    #[test]
    fn test_export_all_rejected() {
        let err = analyze_module("m", "m.js", "export * from './a';\n".to_string()).unwrap_err();
        assert!(matches!(err, CompileError::BatchExport { .. }));
    }
}
