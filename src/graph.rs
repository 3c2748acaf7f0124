//! Module graph resolution.
//!
//! Walks imports breadth-first from the entry, classifying anything that
//! cannot be probed on disk as external, then topologically sorts the local
//! modules and computes the re-export chain map the export planner follows.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;

use tracing::{debug, warn};

use crate::declarations::{ExportKind, ImportSpec};
use crate::errors::{CompileError, Result};
use crate::module::{analyze_module, Module, ModuleReader};
use crate::resolve;

// ═══════════════════════════════════════════════════════════════════════════════
// GRAPH
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct ExternalModule {
    pub id: String,
    pub name: String,
    pub needs_default: bool,
    pub needs_named: bool,
}

#[derive(Debug, Default)]
pub struct ModuleGraph {
    pub entry_id: String,
    /// Topological order; the entry module is last.
    pub modules: Vec<Module>,
    pub lookup: HashMap<String, usize>,
    pub externals: Vec<ExternalModule>,
    pub external_lookup: HashMap<String, usize>,
    /// `(module, exportedName)` → `(sourceModule, sourceName)`; the source
    /// name `*` stands for a namespace binding.
    pub chains: HashMap<(String, String), (String, String)>,
}

impl ModuleGraph {
    pub fn entry(&self) -> &Module {
        &self.modules[self.lookup[&self.entry_id]]
    }

    pub fn entry_index(&self) -> usize {
        self.lookup[&self.entry_id]
    }

    /// Follow the chain map from `(id, name)` to its terminal binding.
    pub fn resolve_chain(&self, id: &str, name: &str) -> (String, String) {
        let mut current = (id.to_string(), name.to_string());
        let mut seen = HashSet::new();
        while let Some(next) = self.chains.get(&current) {
            if !seen.insert(current.clone()) {
                break;
            }
            current = next.clone();
        }
        current
    }
}

pub struct LoadHooks<'a> {
    pub skip: &'a HashSet<String>,
    pub transform: Option<&'a dyn Fn(&str, &str) -> String>,
    pub resolve_path: Option<&'a dyn Fn(&str, &str) -> Option<String>>,
}

impl Default for LoadHooks<'_> {
    fn default() -> Self {
        static EMPTY: std::sync::OnceLock<HashSet<String>> = std::sync::OnceLock::new();
        LoadHooks {
            skip: EMPTY.get_or_init(HashSet::new),
            transform: None,
            resolve_path: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════════════════════════════════════════

fn probe(reader: &dyn ModuleReader, id: &str) -> Result<Option<(String, String)>> {
    for candidate in [format!("{id}.js"), format!("{id}/index.js")] {
        match reader.read(&candidate) {
            Ok(source) => return Ok(Some((candidate, source))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(CompileError::Read {
                    path: candidate,
                    source: e,
                })
            }
        }
    }
    Ok(None)
}

pub fn load(entry: &str, reader: &dyn ModuleReader, hooks: &LoadHooks<'_>) -> Result<ModuleGraph> {
    let entry_id = resolve::entry_id(entry);
    let mut graph = ModuleGraph {
        entry_id: entry_id.clone(),
        ..ModuleGraph::default()
    };
    let mut queue: VecDeque<(String, String, String)> = VecDeque::new();

    let (file, source) = probe(reader, &entry_id)?.ok_or_else(|| CompileError::EntryNotFound {
        entry: entry.to_string(),
    })?;
    let module = load_one(&entry_id, &file, source, hooks, &mut queue)?;
    graph.lookup.insert(entry_id, graph.modules.len());
    graph.modules.push(module);

    while let Some((id, path, importer)) = queue.pop_front() {
        if graph.lookup.contains_key(&id) || graph.external_lookup.contains_key(&id) {
            continue;
        }
        if hooks.skip.contains(&id) {
            debug!(id = %id, "skipped; treated as external");
            add_external(&mut graph, id);
            continue;
        }
        let probed = match probe(reader, &id)? {
            Some(found) => Some(found),
            None => match hooks.resolve_path.and_then(|f| f(&path, &importer)) {
                Some(custom) => match reader.read(&custom) {
                    Ok(source) => Some((custom, source)),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                    Err(e) => {
                        return Err(CompileError::Read {
                            path: custom,
                            source: e,
                        })
                    }
                },
                None => None,
            },
        };
        match probed {
            Some((file, source)) => {
                let module = load_one(&id, &file, source, hooks, &mut queue)?;
                graph.lookup.insert(id, graph.modules.len());
                graph.modules.push(module);
            }
            None => {
                debug!(id = %id, "not found locally; treated as external");
                add_external(&mut graph, id);
            }
        }
    }

    sort_modules(&mut graph);
    mark_namespaces(&mut graph);
    build_chains(&mut graph);
    mark_external_usage(&mut graph);
    check_exports(&graph)?;

    Ok(graph)
}

fn load_one(
    id: &str,
    file: &str,
    source: String,
    hooks: &LoadHooks<'_>,
    queue: &mut VecDeque<(String, String, String)>,
) -> Result<Module> {
    let source = match hooks.transform {
        Some(transform) => transform(&source, id),
        None => source,
    };
    let mut module = analyze_module(id, file, source)?;
    for import in &mut module.imports {
        let resolved = resolve::resolve(&import.path, id);
        if resolved == id {
            return Err(CompileError::SelfImport { id: id.to_string() });
        }
        queue.push_back((resolved.clone(), import.path.clone(), id.to_string()));
        import.id = Some(resolved);
    }
    Ok(module)
}

fn add_external(graph: &mut ModuleGraph, id: String) {
    graph.external_lookup.insert(id.clone(), graph.externals.len());
    graph.externals.push(ExternalModule {
        id,
        name: String::new(),
        needs_default: false,
        needs_named: false,
    });
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORDERING & CHAINS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

fn sort_modules(graph: &mut ModuleGraph) {
    let count = graph.modules.len();
    let mut marks = vec![Mark::Unvisited; count];
    let mut order = Vec::with_capacity(count);

    fn visit(
        index: usize,
        graph: &ModuleGraph,
        marks: &mut [Mark],
        order: &mut Vec<usize>,
    ) {
        match marks[index] {
            Mark::Done => return,
            Mark::InProgress => {
                warn!(
                    id = %graph.modules[index].id,
                    "cyclic dependency; keeping best-effort order"
                );
                return;
            }
            Mark::Unvisited => {}
        }
        marks[index] = Mark::InProgress;
        let deps: Vec<usize> = graph.modules[index]
            .imports
            .iter()
            .filter_map(|i| i.id.as_deref())
            .filter_map(|id| graph.lookup.get(id).copied())
            .collect();
        for dep in deps {
            visit(dep, graph, marks, order);
        }
        marks[index] = Mark::Done;
        order.push(index);
    }

    // The entry is loaded first; visiting load order keeps cycles stable and
    // leaves the entry last within its own closure.
    for index in 0..count {
        visit(index, graph, &mut marks, &mut order);
    }

    let mut reordered: Vec<Option<Module>> =
        std::mem::take(&mut graph.modules).into_iter().map(Some).collect();
    graph.modules = order
        .iter()
        .filter_map(|&i| reordered[i].take())
        .collect();
    graph.lookup = graph
        .modules
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.clone(), i))
        .collect();
}

fn mark_namespaces(graph: &mut ModuleGraph) {
    let mut targets = Vec::new();
    for module in &graph.modules {
        for import in module.imports.iter().filter(|i| !i.passthrough) {
            if import.has_namespace() {
                if let Some(id) = &import.id {
                    if let Some(&index) = graph.lookup.get(id) {
                        targets.push(index);
                    }
                }
            }
        }
    }
    for index in targets {
        graph.modules[index].exports_namespace = true;
    }
}

fn build_chains(graph: &mut ModuleGraph) {
    let mut chains = HashMap::new();
    let mut namespace_reexports = Vec::new();

    for module in &graph.modules {
        // Local alias → (source id, source name or "*").
        let mut bindings: HashMap<&str, (String, String)> = HashMap::new();
        for import in module.imports.iter().filter(|i| !i.passthrough) {
            let Some(source_id) = &import.id else { continue };
            for spec in &import.specifiers {
                let resolved = match spec {
                    ImportSpec::Default { local } => (local, "default".to_string()),
                    ImportSpec::Namespace { local } => (local, "*".to_string()),
                    ImportSpec::Named { imported, local } => (local, imported.clone()),
                };
                bindings.insert(resolved.0, (source_id.clone(), resolved.1));
            }
        }

        for export in &module.exports {
            let ExportKind::Named { specifiers, source } = &export.kind else {
                continue;
            };
            if let Some(source) = source {
                let source_id = resolve::resolve(source, &module.id);
                for spec in specifiers {
                    chains.insert(
                        (module.id.clone(), spec.exported.clone()),
                        (source_id.clone(), spec.name.clone()),
                    );
                }
            } else {
                for spec in specifiers {
                    if let Some((source_id, source_name)) = bindings.get(spec.name.as_str()) {
                        if source_name == "*" {
                            if let Some(&index) = graph.lookup.get(source_id.as_str()) {
                                namespace_reexports.push(index);
                            }
                        }
                        chains.insert(
                            (module.id.clone(), spec.exported.clone()),
                            (source_id.clone(), source_name.clone()),
                        );
                    }
                }
            }
        }
    }

    for index in namespace_reexports {
        graph.modules[index].exports_namespace = true;
    }
    graph.chains = chains;
}

fn mark_external_usage(graph: &mut ModuleGraph) {
    let mut default_use = Vec::new();
    let mut named_use = Vec::new();
    for module in &graph.modules {
        for import in &module.imports {
            let Some(id) = &import.id else { continue };
            let Some(&index) = graph.external_lookup.get(id) else {
                continue;
            };
            for spec in &import.specifiers {
                match spec {
                    ImportSpec::Default { .. } => default_use.push(index),
                    ImportSpec::Named { .. } | ImportSpec::Namespace { .. } => {
                        named_use.push(index)
                    }
                }
            }
        }
    }
    for index in default_use {
        graph.externals[index].needs_default = true;
    }
    for index in named_use {
        graph.externals[index].needs_named = true;
    }
}

fn check_exports(graph: &ModuleGraph) -> Result<()> {
    for module in &graph.modules {
        for import in &module.imports {
            let Some(id) = &import.id else { continue };
            let Some(&index) = graph.lookup.get(id) else {
                continue;
            };
            let target = &graph.modules[index];
            for spec in &import.specifiers {
                let wanted = match spec {
                    ImportSpec::Default { .. } => "default",
                    ImportSpec::Named { imported, .. } => imported.as_str(),
                    ImportSpec::Namespace { .. } => continue,
                };
                if !target.does_export.iter().any(|e| e == wanted) {
                    return Err(CompileError::MissingExport {
                        importer: module.id.clone(),
                        id: target.id.clone(),
                        name: wanted.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::MemoryReader;

    fn graph_of(files: &[(&str, &str)], entry: &str) -> Result<ModuleGraph> {
        let reader = MemoryReader::new(files.iter().copied());
        load(entry, &reader, &LoadHooks::default())
    }

    #[test]
    fn test_topological_order() {
        let graph = graph_of(
            &[
                ("main.js", "import { a } from './a';\nimport { b } from './b';\n"),
                ("a.js", "import { b } from './b';\nexport var a = b;\n"),
                ("b.js", "export var b = 1;\n"),
            ],
            "main",
        )
        .unwrap();
        let order: Vec<&str> = graph.modules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order, ["b", "a", "main"]);
    }

    #[test]
    fn test_externals_and_usage_flags() {
        let graph = graph_of(
            &[("main.js", "import x from 'ext';\nimport { y } from 'ext';\nexport default x(y);\n")],
            "main",
        )
        .unwrap();
        assert_eq!(graph.externals.len(), 1);
        assert!(graph.externals[0].needs_default);
        assert!(graph.externals[0].needs_named);
    }

    #[test]
    fn test_entry_missing() {
        let err = graph_of(&[], "main").unwrap_err();
        assert!(matches!(err, CompileError::EntryNotFound { .. }));
    }

    #[test]
    fn test_self_import() {
        let err = graph_of(&[("main.js", "import { x } from './main';\n")], "main").unwrap_err();
        assert!(matches!(err, CompileError::SelfImport { .. }));
    }

    #[test]
    fn test_cycle_tolerated() {
        let graph = graph_of(
            &[
                ("main.js", "import { a } from './a';\nexport var m = a;\n"),
                ("a.js", "import { b } from './b';\nexport var a = 1;\n"),
                ("b.js", "import { a } from './a';\nexport var b = a;\n"),
            ],
            "main",
        )
        .unwrap();
        assert_eq!(graph.modules.len(), 3);
        assert_eq!(graph.modules.last().unwrap().id, "main");
    }

    #[test]
    fn test_reexport_chain() {
        let graph = graph_of(
            &[
                ("c.js", "export { v } from './b';\n"),
                ("b.js", "export { v } from './a';\n"),
                ("a.js", "export var v = 9;\n"),
            ],
            "c",
        )
        .unwrap();
        assert_eq!(graph.resolve_chain("c", "v"), ("a".to_string(), "v".to_string()));
    }

    #[test]
    fn test_missing_export() {
        let err = graph_of(
            &[
                ("main.js", "import { nope } from './a';\nnope();\n"),
                ("a.js", "export var yep = 1;\n"),
            ],
            "main",
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::MissingExport { .. }));
    }

    #[test]
    fn test_index_probe() {
        let graph = graph_of(
            &[
                ("main.js", "import { x } from './lib';\nexport default x;\n"),
                ("lib/index.js", "export var x = 1;\n"),
            ],
            "main",
        )
        .unwrap();
        assert!(graph.lookup.contains_key("lib"));
        assert_eq!(graph.modules[graph.lookup["lib"]].file, "lib/index.js");
    }
}
