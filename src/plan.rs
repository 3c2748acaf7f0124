//! Export planning.
//!
//! Decides, per emission, the final output identifier for every top-level
//! binding and import alias, the identifier each module's default value
//! lives under, and how each of the entry's exports is emitted: hoisted
//! early (top-level functions), appended late, or, for bindings owned by
//! another module, read through a getter in the wrapper preamble.

use std::collections::HashMap;

use crate::declarations::{ExportKind, ImportSpec};
use crate::errors::{CompileError, Result};
use crate::graph::ModuleGraph;
use crate::module::Module;
use crate::names::RESERVED;

#[derive(Debug, Clone)]
pub struct OwnedExport {
    /// Output export name.
    pub exported: String,
    /// Local top-level name in the entry, when reassignments must mirror.
    pub local_name: Option<String>,
    /// Final identifier expression the export reads.
    pub local_repl: String,
    /// Owned by a module other than the entry; strict emissions read these
    /// through an accessor in the preamble.
    pub chained: bool,
    /// Emitted at the top of the body so cyclic dependents see it.
    pub hoist: bool,
    pub is_default: bool,
}

#[derive(Debug)]
pub struct Plan {
    pub strict: bool,
    /// Per module (parallel to `graph.modules`): local name → output name.
    pub replacements: Vec<HashMap<String, String>>,
    /// Per module: identifier its default-export value lives under.
    pub default_names: Vec<Option<String>>,
    /// The entry's output exports.
    pub entry_exports: Vec<OwnedExport>,
    /// Per external: identifier default-import specifiers resolve to.
    pub ext_default_ref: Vec<String>,
}

pub fn plan(graph: &ModuleGraph, strict: bool) -> Result<Plan> {
    let entry_index = graph.entry_index();
    let module_names: Vec<&str> = graph
        .modules
        .iter()
        .map(|m| m.name.as_str())
        .chain(graph.externals.iter().map(|e| e.name.as_str()))
        .collect();

    let mut declaration_counts: HashMap<&str, usize> = HashMap::new();
    for module in &graph.modules {
        for name in &module.analysis.top_level_names {
            *declaration_counts.entry(name.as_str()).or_default() += 1;
        }
    }

    // Identifiers that are already spoken for in the output: requires for
    // externals and namespace getter objects use the module names directly.
    let mut claimed: std::collections::HashSet<String> =
        RESERVED.iter().map(|s| s.to_string()).collect();
    for external in &graph.externals {
        claimed.insert(external.name.clone());
    }
    for module in graph.modules.iter().filter(|m| m.exports_namespace) {
        claimed.insert(module.name.clone());
    }

    // The entry keeps names that conflict with nothing; everything else is
    // prefixed with its module name.
    let entry = &graph.modules[entry_index];
    let entry_keeps = |name: &str| -> bool {
        !entry.exports_namespace
            && !RESERVED.contains(name)
            && !module_names.contains(&name)
            && declaration_counts.get(name).copied().unwrap_or(0) <= 1
    };
    for name in &entry.analysis.top_level_names {
        if entry_keeps(name) {
            claimed.insert(name.clone());
        }
    }

    let mut replacements: Vec<HashMap<String, String>> = Vec::with_capacity(graph.modules.len());
    for (index, module) in graph.modules.iter().enumerate() {
        let mut map = HashMap::new();
        for name in &module.analysis.top_level_names {
            let replacement = if index == entry_index && entry_keeps(name) {
                name.clone()
            } else {
                let mut candidate = format!("{}__{}", module.name, name);
                while claimed.contains(&candidate) {
                    candidate.insert(0, '_');
                }
                claimed.insert(candidate.clone());
                candidate
            };
            map.insert(name.clone(), replacement);
        }
        replacements.push(map);
    }

    // Identifier each default-export value lives under.
    let mut default_names: Vec<Option<String>> = Vec::with_capacity(graph.modules.len());
    for (index, module) in graph.modules.iter().enumerate() {
        let name = module.default_export.map(|export_index| {
            let export = &module.exports[export_index];
            match export.declared_name() {
                Some(local) => replacements[index]
                    .get(local)
                    .cloned()
                    .unwrap_or_else(|| local.to_string()),
                None => {
                    let mut candidate = module.name.clone();
                    if claimed.contains(&candidate) {
                        candidate = format!("{}__default", module.name);
                    }
                    while claimed.contains(&candidate) {
                        candidate.insert(0, '_');
                    }
                    claimed.insert(candidate.clone());
                    candidate
                }
            }
        });
        default_names.push(name);
    }

    let ext_default_ref: Vec<String> = graph
        .externals
        .iter()
        .map(|e| {
            if strict && e.needs_default && e.needs_named {
                format!("{}__default", e.name)
            } else {
                e.name.clone()
            }
        })
        .collect();

    let mut plan = Plan {
        strict,
        replacements,
        default_names,
        entry_exports: Vec::new(),
        ext_default_ref,
    };

    // Import alias resolution, chains followed to their terminal binding.
    for index in 0..graph.modules.len() {
        let mut resolved: Vec<(String, String)> = Vec::new();
        for import in graph.modules[index].imports.iter().filter(|i| !i.passthrough) {
            let Some(target) = &import.id else { continue };
            for spec in &import.specifiers {
                let (local, replacement) = match spec {
                    ImportSpec::Namespace { local } => {
                        (local.clone(), plan.terminal_reference(graph, target, "*"))
                    }
                    ImportSpec::Default { local } => {
                        let terminal = graph.resolve_chain(target, "default");
                        (
                            local.clone(),
                            plan.terminal_reference(graph, &terminal.0, &terminal.1),
                        )
                    }
                    ImportSpec::Named { imported, local } => {
                        let terminal = graph.resolve_chain(target, imported);
                        (
                            local.clone(),
                            plan.terminal_reference(graph, &terminal.0, &terminal.1),
                        )
                    }
                };
                resolved.push((local, replacement));
            }
        }
        plan.replacements[index].extend(resolved);
    }

    // The entry's output exports.
    for exported in &graph.entry().does_export {
        if !strict && exported != "default" {
            return Err(CompileError::StrictModeRequired);
        }
        let (terminal_id, terminal_name) = graph.resolve_chain(&graph.entry_id, exported);
        let owned = match graph.lookup.get(&terminal_id) {
            Some(&owner) => {
                let owner_module = &graph.modules[owner];
                if terminal_name == "default" {
                    // A named default declaration mirrors reassignments like
                    // any other owned export; anonymous defaults have no
                    // source identifier to watch.
                    let local_name = owner_module
                        .default_export
                        .and_then(|i| owner_module.exports[i].declared_name())
                        .map(str::to_string);
                    OwnedExport {
                        exported: exported.clone(),
                        local_name: if owner == entry_index { local_name } else { None },
                        local_repl: plan.default_names[owner]
                            .clone()
                            .unwrap_or_else(|| owner_module.name.clone()),
                        chained: false,
                        hoist: false,
                        is_default: exported == "default",
                    }
                } else if terminal_name == "*" {
                    OwnedExport {
                        exported: exported.clone(),
                        local_name: None,
                        local_repl: owner_module.name.clone(),
                        chained: owner != entry_index,
                        hoist: false,
                        is_default: exported == "default",
                    }
                } else {
                    let local = owner_module
                        .local_of_export(&terminal_name)
                        .unwrap_or_else(|| terminal_name.clone());
                    let local_repl = plan.replacements[owner]
                        .get(&local)
                        .cloned()
                        .unwrap_or_else(|| local.clone());
                    let chained = owner != entry_index;
                    OwnedExport {
                        exported: exported.clone(),
                        local_name: if chained { None } else { Some(local.clone()) },
                        local_repl,
                        chained,
                        hoist: !chained
                            && exported != "default"
                            && owner_module
                                .analysis
                                .top_level_functions
                                .iter()
                                .any(|f| f == &local),
                        is_default: exported == "default",
                    }
                }
            }
            None => OwnedExport {
                exported: exported.clone(),
                local_name: None,
                local_repl: plan.terminal_reference(graph, &terminal_id, &terminal_name),
                chained: true,
                hoist: false,
                is_default: exported == "default",
            },
        };
        plan.entry_exports.push(owned);
    }

    Ok(plan)
}

impl Plan {
    /// Final identifier expression for a terminal `(module, name)` binding.
    fn terminal_reference(&self, graph: &ModuleGraph, id: &str, name: &str) -> String {
        if let Some(&index) = graph.lookup.get(id) {
            let module = &graph.modules[index];
            if name == "*" {
                return module.name.clone();
            }
            if name == "default" {
                return self.default_names[index]
                    .clone()
                    .unwrap_or_else(|| module.name.clone());
            }
            let local = module
                .local_of_export(name)
                .unwrap_or_else(|| name.to_string());
            return self.replacements[index]
                .get(&local)
                .cloned()
                .unwrap_or(local);
        }
        if let Some(&index) = graph.external_lookup.get(id) {
            let external = &graph.externals[index];
            return match name {
                "default" => self.ext_default_ref[index].clone(),
                "*" => external.name.clone(),
                other => format!("{}.{}", external.name, other),
            };
        }
        name.to_string()
    }

    /// Final identifier an exported name of `module_index` resolves to,
    /// following chains; used for namespace getter objects.
    pub fn export_reference(
        &self,
        graph: &ModuleGraph,
        module_index: usize,
        exported: &str,
    ) -> String {
        let module = &graph.modules[module_index];
        if exported == "default" {
            if let Some(name) = &self.default_names[module_index] {
                return name.clone();
            }
        }
        let (terminal_id, terminal_name) = graph.resolve_chain(&module.id, exported);
        self.terminal_reference(graph, &terminal_id, &terminal_name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SINGLE-FILE PLANNING
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct SinglePlan {
    pub strict: bool,
    pub replacements: HashMap<String, String>,
    /// Import path → allocated module name.
    pub module_names: HashMap<String, String>,
    /// Late exports (strict mode only).
    pub exports: Vec<OwnedExport>,
}

pub fn plan_single(
    module: &Module,
    module_names: HashMap<String, String>,
    strict: bool,
) -> Result<SinglePlan> {
    if !strict {
        for import in module.imports.iter().filter(|i| !i.passthrough) {
            if import.has_named() {
                return Err(CompileError::StrictModeRequired);
            }
        }
        for export in &module.exports {
            if !export.is_default {
                return Err(CompileError::StrictModeRequired);
            }
        }
    }

    let mut replacements = HashMap::new();
    for import in &module.imports {
        let Some(name) = module_names.get(&import.path) else {
            continue;
        };
        for spec in &import.specifiers {
            match spec {
                ImportSpec::Default { local } | ImportSpec::Namespace { local } => {
                    replacements.insert(local.clone(), name.clone());
                }
                ImportSpec::Named { imported, local } => {
                    replacements.insert(local.clone(), format!("{name}.{imported}"));
                }
            }
        }
    }

    let mut exports = Vec::new();
    if strict {
        for export in &module.exports {
            match (&export.kind, export.is_default) {
                (ExportKind::Named { specifiers, source: Some(path) }, _) => {
                    let name = module_names
                        .get(path)
                        .cloned()
                        .unwrap_or_else(|| path.clone());
                    for spec in specifiers {
                        exports.push(OwnedExport {
                            exported: spec.exported.clone(),
                            local_name: None,
                            local_repl: format!("{}.{}", name, spec.name),
                            chained: false,
                            hoist: false,
                            is_default: false,
                        });
                    }
                }
                (ExportKind::Named { specifiers, source: None }, _) => {
                    for spec in specifiers {
                        exports.push(OwnedExport {
                            exported: spec.exported.clone(),
                            local_name: Some(spec.name.clone()),
                            local_repl: replacements
                                .get(&spec.name)
                                .cloned()
                                .unwrap_or_else(|| spec.name.clone()),
                            chained: false,
                            hoist: false,
                            is_default: false,
                        });
                    }
                }
                (kind, false) => {
                    if let Some(name) = match kind {
                        ExportKind::VarDeclaration { name, .. }
                        | ExportKind::NamedFunction { name, .. }
                        | ExportKind::NamedClass { name, .. } => Some(name.clone()),
                        _ => None,
                    } {
                        exports.push(OwnedExport {
                            exported: name.clone(),
                            local_name: Some(name.clone()),
                            local_repl: name,
                            chained: false,
                            hoist: false,
                            is_default: false,
                        });
                    }
                }
                (kind, true) => {
                    // Named default declarations keep their binding, export
                    // late and mirror reassignments; anonymous forms are
                    // rewritten in place.
                    if let ExportKind::NamedFunction { name, .. }
                    | ExportKind::NamedClass { name, .. } = kind
                    {
                        exports.push(OwnedExport {
                            exported: "default".to_string(),
                            local_name: Some(name.clone()),
                            local_repl: name.clone(),
                            chained: false,
                            hoist: false,
                            is_default: true,
                        });
                    }
                }
            }
        }
    }

    Ok(SinglePlan {
        strict,
        replacements,
        module_names,
        exports,
    })
}
