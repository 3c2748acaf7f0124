//! The body rewriter.
//!
//! Consumes the load-time facts and the emission plan, and turns them into
//! offset-keyed edits over each module's original source: reference and
//! binding renames, reassignment guards, export mirroring, top-level `this`
//! replacement, import/export deletion, namespace getter objects and the
//! final export block.

use std::collections::{HashMap, HashSet};

use crate::analyze::AssignKind;
use crate::declarations::ExportKind;
use crate::errors::{CompileError, Result};
use crate::graph::ModuleGraph;
use crate::module::Module;
use crate::plan::{OwnedExport, Plan, SinglePlan};
use crate::source_buffer::SourceBuffer;
use crate::wrappers::Format;

fn accessor(exported: &str) -> String {
    if exported == "default" {
        "exports['default']".to_string()
    } else {
        format!("exports.{exported}")
    }
}

struct MirrorEntry<'p> {
    accessor: String,
    local_repl: &'p str,
    exported: &'p str,
}

fn mirror_map<'p>(exports: &'p [OwnedExport]) -> HashMap<&'p str, MirrorEntry<'p>> {
    exports
        .iter()
        .filter(|e| !e.chained)
        .filter_map(|e| {
            e.local_name.as_deref().map(|local| {
                (
                    local,
                    MirrorEntry {
                        accessor: accessor(&e.exported),
                        local_repl: &e.local_repl,
                        exported: &e.exported,
                    },
                )
            })
        })
        .collect()
}

/// Everything shared by the single-file and bundle variants: template
/// exclusion, sourceMappingURL removal, top-level `this`, reassignment
/// guards, reference/binding renames and export mirroring.
fn apply_common(
    buffer: &mut SourceBuffer,
    module: &Module,
    replacements: &HashMap<String, String>,
    mirror: &HashMap<&str, MirrorEntry<'_>>,
) -> Result<HashSet<String>> {
    let facts = &module.analysis;

    for &(start, end) in &facts.template_ranges {
        buffer.exclude_indent(start, end);
    }
    for &(start, end) in &facts.sourcemap_comments {
        buffer.remove(start, end);
    }
    for &(start, end) in &facts.this_spans {
        buffer.replace(start, end, "undefined");
    }

    let mut imported: HashSet<&str> = HashSet::new();
    let mut namespaces: HashSet<&str> = HashSet::new();
    for import in module.imports.iter().filter(|i| !i.passthrough) {
        for spec in &import.specifiers {
            imported.insert(spec.local());
            if matches!(spec, crate::declarations::ImportSpec::Namespace { .. }) {
                namespaces.insert(spec.local());
            }
        }
    }

    for assignment in &facts.assignments {
        if !assignment.shadowed && imported.contains(assignment.name.as_str()) {
            return Err(CompileError::IllegalReassignment {
                name: assignment.name.clone(),
            });
        }
    }
    for target in &facts.namespace_targets {
        if !target.shadowed && namespaces.contains(target.object.as_str()) {
            return Err(CompileError::NamespaceReassignment {
                name: target.object.clone(),
            });
        }
    }

    for reference in &facts.references {
        if reference.shadowed {
            continue;
        }
        let Some(replacement) = replacements.get(&reference.name) else {
            continue;
        };
        if replacement == &reference.name && !reference.shorthand {
            continue;
        }
        if reference.shorthand {
            if replacement != &reference.name {
                buffer.replace(
                    reference.start,
                    reference.end,
                    format!("{}: {}", reference.name, replacement),
                );
            }
        } else {
            buffer.replace(reference.start, reference.end, replacement.clone());
        }
    }

    for binding in &facts.top_level_bindings {
        if let Some(replacement) = replacements.get(&binding.name) {
            if replacement != &binding.name {
                buffer.replace(binding.start, binding.end, replacement.clone());
            }
        }
    }

    let mut mirrored = HashSet::new();
    for assignment in &facts.assignments {
        if assignment.shadowed {
            continue;
        }
        let Some(entry) = mirror.get(assignment.name.as_str()) else {
            continue;
        };
        match assignment.kind {
            AssignKind::Assign | AssignKind::UpdatePrefix => {
                buffer.insert(assignment.start, format!("{} = ", entry.accessor));
            }
            AssignKind::UpdatePostfix => match assignment.declaration_end {
                Some(end) => {
                    buffer.insert(end, format!("; {} = {};", entry.accessor, entry.local_repl));
                }
                None => {
                    buffer.insert(
                        assignment.end,
                        format!(", {} = {}", entry.accessor, entry.local_repl),
                    );
                }
            },
        }
        mirrored.insert(entry.exported.to_string());
    }

    Ok(mirrored)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUNDLE VARIANT
// ═══════════════════════════════════════════════════════════════════════════════

pub fn rewrite_bundle_module(
    module: &Module,
    graph: &ModuleGraph,
    plan: &Plan,
    index: usize,
) -> Result<SourceBuffer> {
    let mut buffer = SourceBuffer::new(module.source.clone());
    buffer.trim();

    let is_entry = index == graph.entry_index();
    let mirror = if plan.strict && is_entry {
        mirror_map(&plan.entry_exports)
    } else {
        HashMap::new()
    };
    let mirrored = apply_common(&mut buffer, module, &plan.replacements[index], &mirror)?;

    for import in module.imports.iter().filter(|i| !i.passthrough) {
        buffer.remove(import.start, import.next);
    }

    let default_name = plan.default_names[index]
        .clone()
        .unwrap_or_else(|| module.name.clone());
    for export in &module.exports {
        match &export.kind {
            ExportKind::Named { .. } => buffer.remove(export.start, export.next),
            ExportKind::AnonFunction { value_start }
            | ExportKind::AnonClass { value_start }
            | ExportKind::Expression { value_start } => {
                buffer.replace(export.start, *value_start, format!("var {default_name} = "));
            }
            ExportKind::VarDeclaration { value_start, .. }
            | ExportKind::NamedFunction { value_start, .. }
            | ExportKind::NamedClass { value_start, .. } => {
                buffer.remove(export.start, *value_start);
            }
        }
    }

    if module.exports_namespace {
        buffer.prepend(&namespace_block(module, graph, plan, index));
    }

    if is_entry {
        for owned in &plan.entry_exports {
            if owned.chained || owned.hoist || mirrored.contains(&owned.exported) {
                continue;
            }
            if owned.is_default && !plan.strict {
                // The wrapper emits `module.exports` / `return` instead.
                continue;
            }
            buffer.append(&format!(
                "\n{} = {};",
                accessor(&owned.exported),
                owned.local_repl
            ));
        }
    }

    Ok(buffer)
}

fn namespace_block(module: &Module, graph: &ModuleGraph, plan: &Plan, index: usize) -> String {
    let mut getters: Vec<String> = Vec::new();
    for exported in &module.does_export {
        let key = if exported == "default" {
            "'default'".to_string()
        } else {
            exported.clone()
        };
        let value = plan.export_reference(graph, index, exported);
        getters.push(format!("\tget {key} () {{ return {value}; }}"));
    }
    format!(
        "var {} = {{\n{}\n}};\n\n",
        module.name,
        getters.join(",\n")
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// SINGLE-FILE VARIANT
// ═══════════════════════════════════════════════════════════════════════════════

pub fn rewrite_single(
    module: &Module,
    plan: &SinglePlan,
    format: Format,
) -> Result<SourceBuffer> {
    let mut buffer = SourceBuffer::new(module.source.clone());
    buffer.trim();

    let mirror = if plan.strict {
        mirror_map(&plan.exports)
    } else {
        HashMap::new()
    };
    let mirrored = apply_common(&mut buffer, module, &plan.replacements, &mirror)?;

    let mut required: HashSet<&str> = HashSet::new();
    for import in &module.imports {
        if format != Format::Cjs {
            if !import.passthrough {
                buffer.remove(import.start, import.next);
            }
            continue;
        }
        let first = required.insert(import.path.as_str());
        if !first {
            if !import.passthrough {
                buffer.remove(import.start, import.next);
            }
            continue;
        }
        let line = match plan.module_names.get(&import.path) {
            Some(name) if !import.is_empty() => {
                format!("var {} = require('{}');", name, import.path)
            }
            _ => format!("require('{}');", import.path),
        };
        if import.passthrough {
            // The export side of the statement owns the deletion.
            buffer.insert(import.start, format!("{line}\n"));
        } else {
            buffer.replace(import.start, import.next, format!("{line}\n"));
        }
    }

    for export in &module.exports {
        match (&export.kind, export.is_default) {
            (ExportKind::Named { .. }, _) => buffer.remove(export.start, export.next),
            (
                ExportKind::VarDeclaration { value_start, .. }
                | ExportKind::NamedFunction { value_start, .. }
                | ExportKind::NamedClass { value_start, .. },
                false,
            ) => {
                buffer.remove(export.start, *value_start);
            }
            (
                ExportKind::NamedFunction { name, value_start }
                | ExportKind::NamedClass { name, value_start },
                true,
            ) => {
                buffer.remove(export.start, *value_start);
                if !plan.strict {
                    buffer.append(&trailing_default(format, name));
                }
            }
            (
                ExportKind::AnonFunction { value_start }
                | ExportKind::AnonClass { value_start }
                | ExportKind::Expression { value_start },
                true,
            ) => {
                let lead = if plan.strict {
                    "exports['default'] = ".to_string()
                } else {
                    match format {
                        Format::Cjs => "module.exports = ".to_string(),
                        Format::Amd | Format::Umd => "return ".to_string(),
                    }
                };
                buffer.replace(export.start, *value_start, lead);
            }
            _ => {}
        }
    }

    if plan.strict {
        for owned in &plan.exports {
            if mirrored.contains(&owned.exported) {
                continue;
            }
            buffer.append(&format!(
                "\n{} = {};",
                accessor(&owned.exported),
                owned.local_repl
            ));
        }
    }

    Ok(buffer)
}

fn trailing_default(format: Format, name: &str) -> String {
    match format {
        Format::Cjs => format!("\nmodule.exports = {name};"),
        Format::Amd | Format::Umd => format!("\nreturn {name};"),
    }
}
