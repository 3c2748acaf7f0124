//! Import/export declaration extraction.
//!
//! A linear pass over a module's top-level statements normalizes every
//! `import`/`export` node into plain records the resolver and rewriter work
//! from. Re-export-from forms yield both an ExportDecl and a passthrough
//! ImportDecl over the same span.

use oxc_ast::ast::*;
use oxc_span::GetSpan;
use std::collections::HashSet;

use crate::errors::{CompileError, Result};
use crate::scope::collect_pattern_names;

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSpec {
    Default { local: String },
    Namespace { local: String },
    Named { imported: String, local: String },
}

impl ImportSpec {
    pub fn local(&self) -> &str {
        match self {
            ImportSpec::Default { local }
            | ImportSpec::Namespace { local }
            | ImportSpec::Named { local, .. } => local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    /// The module path as written in the source.
    pub path: String,
    /// Canonical id, filled in by the graph resolver.
    pub id: Option<String>,
    pub specifiers: Vec<ImportSpec>,
    pub passthrough: bool,
    pub start: u32,
    pub end: u32,
    pub next: u32,
}

impl ImportDecl {
    pub fn is_empty(&self) -> bool {
        self.specifiers.is_empty()
    }

    pub fn has_named(&self) -> bool {
        self.specifiers
            .iter()
            .any(|s| matches!(s, ImportSpec::Named { .. }))
    }

    pub fn has_namespace(&self) -> bool {
        self.specifiers
            .iter()
            .any(|s| matches!(s, ImportSpec::Namespace { .. }))
    }
}

#[derive(Debug, Clone)]
pub struct ExportSpec {
    /// Local name on this side of the export.
    pub name: String,
    /// Name the binding is exported as.
    pub exported: String,
}

#[derive(Debug, Clone)]
pub enum ExportKind {
    VarDeclaration { name: String, value_start: u32 },
    NamedFunction { name: String, value_start: u32 },
    NamedClass { name: String, value_start: u32 },
    Named { specifiers: Vec<ExportSpec>, source: Option<String> },
    AnonFunction { value_start: u32 },
    AnonClass { value_start: u32 },
    Expression { value_start: u32 },
}

#[derive(Debug, Clone)]
pub struct ExportDecl {
    pub kind: ExportKind,
    pub is_default: bool,
    pub start: u32,
    pub end: u32,
    pub next: u32,
}

impl ExportDecl {
    /// The declared local name, for declaration-bodied exports.
    pub fn declared_name(&self) -> Option<&str> {
        match &self.kind {
            ExportKind::VarDeclaration { name, .. }
            | ExportKind::NamedFunction { name, .. }
            | ExportKind::NamedClass { name, .. } => Some(name),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

pub struct Declarations {
    pub imports: Vec<ImportDecl>,
    pub exports: Vec<ExportDecl>,
}

pub fn extract(program: &Program<'_>, source: &str, id: &str) -> Result<Declarations> {
    let mut imports = Vec::new();
    let mut exports = Vec::new();
    let mut seen_default = false;

    for statement in &program.body {
        match statement {
            Statement::ImportDeclaration(import) => {
                imports.push(extract_import(import, source));
            }
            Statement::ExportNamedDeclaration(export) => {
                extract_named_export(export, source, &mut imports, &mut exports);
            }
            Statement::ExportDefaultDeclaration(export) => {
                if seen_default {
                    return Err(CompileError::DuplicateDefaultExport { id: id.to_string() });
                }
                seen_default = true;
                exports.push(extract_default_export(export, source));
            }
            Statement::ExportAllDeclaration(_) => {
                return Err(CompileError::BatchExport { id: id.to_string() });
            }
            _ => {}
        }
    }

    check_unique_aliases(&imports, id)?;

    Ok(Declarations { imports, exports })
}

fn extract_import(import: &ImportDeclaration<'_>, source: &str) -> ImportDecl {
    let mut specifiers = Vec::new();
    if let Some(specs) = &import.specifiers {
        for spec in specs {
            match spec {
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    specifiers.push(ImportSpec::Default {
                        local: s.local.name.to_string(),
                    });
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    specifiers.push(ImportSpec::Namespace {
                        local: s.local.name.to_string(),
                    });
                }
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    specifiers.push(ImportSpec::Named {
                        imported: export_name(&s.imported),
                        local: s.local.name.to_string(),
                    });
                }
            }
        }
    }
    ImportDecl {
        path: import.source.value.to_string(),
        id: None,
        specifiers,
        passthrough: false,
        start: import.span.start,
        end: import.span.end,
        next: statement_next(source, import.span.end),
    }
}

fn extract_named_export(
    export: &ExportNamedDeclaration<'_>,
    source: &str,
    imports: &mut Vec<ImportDecl>,
    exports: &mut Vec<ExportDecl>,
) {
    let start = export.span.start;
    let end = export.span.end;
    let next = statement_next(source, end);

    if let Some(declaration) = &export.declaration {
        let kind = match declaration {
            Declaration::VariableDeclaration(var) => {
                let mut names = Vec::new();
                if let Some(first) = var.declarations.first() {
                    collect_pattern_names(&first.id, &mut names);
                }
                match names.into_iter().next() {
                    Some(name) => ExportKind::VarDeclaration {
                        name,
                        value_start: var.span.start,
                    },
                    None => return,
                }
            }
            Declaration::FunctionDeclaration(func) => match &func.id {
                Some(id) => ExportKind::NamedFunction {
                    name: id.name.to_string(),
                    value_start: func.span.start,
                },
                None => return,
            },
            Declaration::ClassDeclaration(class) => match &class.id {
                Some(id) => ExportKind::NamedClass {
                    name: id.name.to_string(),
                    value_start: class.span.start,
                },
                None => return,
            },
            _ => return,
        };
        exports.push(ExportDecl {
            kind,
            is_default: false,
            start,
            end,
            next,
        });
        return;
    }

    let specifiers: Vec<ExportSpec> = export
        .specifiers
        .iter()
        .map(|s| ExportSpec {
            name: export_name(&s.local),
            exported: export_name(&s.exported),
        })
        .collect();
    let source_path = export.source.as_ref().map(|s| s.value.to_string());

    if let Some(path) = &source_path {
        // The passthrough import side; its aliases are the exported names.
        imports.push(ImportDecl {
            path: path.clone(),
            id: None,
            specifiers: specifiers
                .iter()
                .map(|s| ImportSpec::Named {
                    imported: s.name.clone(),
                    local: s.exported.clone(),
                })
                .collect(),
            passthrough: true,
            start,
            end,
            next,
        });
    }

    exports.push(ExportDecl {
        kind: ExportKind::Named {
            specifiers,
            source: source_path,
        },
        is_default: false,
        start,
        end,
        next,
    });
}

fn extract_default_export(export: &ExportDefaultDeclaration<'_>, source: &str) -> ExportDecl {
    let kind = match &export.declaration {
        ExportDefaultDeclarationKind::FunctionDeclaration(func) => match &func.id {
            Some(id) => ExportKind::NamedFunction {
                name: id.name.to_string(),
                value_start: func.span.start,
            },
            None => ExportKind::AnonFunction {
                value_start: func.span.start,
            },
        },
        ExportDefaultDeclarationKind::ClassDeclaration(class) => match &class.id {
            Some(id) => ExportKind::NamedClass {
                name: id.name.to_string(),
                value_start: class.span.start,
            },
            None => ExportKind::AnonClass {
                value_start: class.span.start,
            },
        },
        other => ExportKind::Expression {
            value_start: other.span().start,
        },
    };
    ExportDecl {
        kind,
        is_default: true,
        start: export.span.start,
        end: export.span.end,
        next: statement_next(source, export.span.end),
    }
}

fn check_unique_aliases(imports: &[ImportDecl], id: &str) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for import in imports.iter().filter(|i| !i.passthrough) {
        for spec in &import.specifiers {
            if !seen.insert(spec.local()) {
                return Err(CompileError::DuplicateImport {
                    id: id.to_string(),
                    alias: spec.local().to_string(),
                });
            }
        }
    }
    Ok(())
}

fn export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

/// Offset one past the statement's trailing semicolon, horizontal
/// whitespace, and a single line break.
pub fn statement_next(source: &str, end: u32) -> u32 {
    let bytes = source.as_bytes();
    let mut i = end as usize;
    while i < bytes.len() && matches!(bytes[i], b';' | b' ' | b'\t') {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'\r' {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'\n' {
        i += 1;
    }
    i as u32
}
