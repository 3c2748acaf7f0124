//! Public surface.
//!
//! `transpile` rewrites one module; `bundle` loads a graph once and can then
//! emit it as AMD, CommonJS, UMD or a bare concatenation. Each emission
//! re-plans and re-renders from the immutable module sources, so repeated
//! emits with different options never interfere.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{CompileError, Result};
use crate::graph::{self, LoadHooks, ModuleGraph};
use crate::module::{analyze_module, FsReader, ModuleReader};
use crate::names;
use crate::plan;
use crate::resolve;
use crate::rewrite;
use crate::source_buffer::BundleBuffer;
use crate::source_map::SourceMap;
use crate::wrappers::{self, Dep, Format, WrapperSpec};

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapKind {
    File,
    Inline,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputOptions {
    pub strict: bool,
    pub name: Option<String>,
    pub amd_name: Option<String>,
    pub absolute_paths: bool,
    pub banner: Option<String>,
    pub footer: Option<String>,
    pub source_map: Option<SourceMapKind>,
    pub source_map_file: Option<String>,
    pub source_map_source: Option<String>,
}

pub struct TranspileOptions<'a> {
    pub format: Format,
    pub output: OutputOptions,
    pub names: HashMap<String, String>,
    pub get_module_name: Option<&'a dyn Fn(&str) -> Option<String>>,
}

impl TranspileOptions<'_> {
    pub fn new(format: Format) -> Self {
        TranspileOptions {
            format,
            output: OutputOptions::default(),
            names: HashMap::new(),
            get_module_name: None,
        }
    }
}

pub struct BundleOptions<'a> {
    pub entry: String,
    pub base: Option<PathBuf>,
    pub skip: HashSet<String>,
    pub names: HashMap<String, String>,
    pub get_module_name: Option<&'a dyn Fn(&str) -> Option<String>>,
    pub transform: Option<&'a dyn Fn(&str, &str) -> String>,
    pub resolve_path: Option<&'a dyn Fn(&str, &str) -> Option<String>>,
    pub reader: Option<&'a dyn ModuleReader>,
}

impl<'a> BundleOptions<'a> {
    pub fn new(entry: impl Into<String>) -> Self {
        BundleOptions {
            entry: entry.into(),
            base: None,
            skip: HashSet::new(),
            names: HashMap::new(),
            get_module_name: None,
            transform: None,
            resolve_path: None,
            reader: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConcatOptions {
    pub intro: Option<String>,
    pub outro: Option<String>,
    pub indent: Option<String>,
    pub source_map: Option<SourceMapKind>,
    pub source_map_file: Option<String>,
}

#[derive(Debug)]
pub struct Output {
    pub code: String,
    pub map: Option<SourceMap>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SINGLE-FILE TRANSPILE
// ═══════════════════════════════════════════════════════════════════════════════

pub fn transpile(source: &str, options: &TranspileOptions<'_>) -> Result<Output> {
    let output = &options.output;
    if output.source_map.is_some() && output.source_map_source.is_none() {
        return Err(CompileError::MissingSourceMapSource);
    }
    let file = output.source_map_source.as_deref().unwrap_or("input.js");

    let module = analyze_module("input", file, source.to_string())?;
    let module_names =
        names::single_module_names(&module, &options.names, options.get_module_name)?;
    let single = plan::plan_single(&module, module_names, output.strict)?;
    let mut buffer = rewrite::rewrite_single(&module, &single, options.format)?;

    let deps = single_deps(&module, &single.module_names, options.format, output)?;
    let has_exports = output.strict && !module.does_export.is_empty();
    let wrapper = wrappers::build(&WrapperSpec {
        format: Some(options.format),
        has_exports,
        name: output.name.as_deref(),
        amd_name: output.amd_name.as_deref(),
        deps,
        requires_in_body: options.format == Format::Cjs,
        ..WrapperSpec::default()
    })?;

    if let Some(indent) = wrapper.body_indent {
        buffer.indent(indent);
    }
    let mut body = BundleBuffer::new("\n\n");
    body.push(file, buffer);
    assemble(&body, &wrapper.intro, &wrapper.outro, output)
}

fn single_deps(
    module: &crate::module::Module,
    module_names: &HashMap<String, String>,
    format: Format,
    output: &OutputOptions,
) -> Result<Vec<Dep>> {
    let amd_like = matches!(format, Format::Amd | Format::Umd);
    if output.absolute_paths && amd_like && output.amd_name.is_none() {
        return Err(CompileError::MissingAmdName);
    }

    let mut seen = HashSet::new();
    let mut deps = Vec::new();
    for import in &module.imports {
        if !seen.insert(import.path.as_str()) {
            continue;
        }
        let id = resolve::amd_path(&import.path);
        let amd_path = if output.absolute_paths && import.path.starts_with('.') {
            match output.amd_name.as_deref() {
                Some(amd_name) => resolve::resolve(&import.path, amd_name),
                None => id.clone(),
            }
        } else {
            id.clone()
        };
        let name = module_names.get(&import.path).cloned();
        let global_name = name
            .clone()
            .unwrap_or_else(|| names::name_from_path(&id, &HashSet::new()));
        deps.push(Dep {
            amd_path,
            require_path: import.path.clone(),
            global_name,
            name,
            interop: false,
        });
    }
    Ok(deps)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUNDLES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn bundle(options: &BundleOptions<'_>) -> Result<Bundle> {
    let fs_reader;
    let reader: &dyn ModuleReader = match options.reader {
        Some(reader) => reader,
        None => {
            fs_reader = FsReader::new(
                options
                    .base
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(".")),
            );
            &fs_reader
        }
    };
    let hooks = LoadHooks {
        skip: &options.skip,
        transform: options.transform,
        resolve_path: options.resolve_path,
    };
    let mut graph = graph::load(&options.entry, reader, &hooks)?;
    names::allocate(&mut graph, &options.names, options.get_module_name)?;
    Ok(Bundle { graph })
}

#[derive(Debug)]
pub struct Bundle {
    graph: ModuleGraph,
}

impl Bundle {
    /// Ids of the modules that stay external to the bundle.
    pub fn imports(&self) -> Vec<&str> {
        self.graph.externals.iter().map(|e| e.id.as_str()).collect()
    }

    /// Names the entry module exports.
    pub fn exports(&self) -> Vec<&str> {
        self.graph.entry().does_export.iter().map(|s| s.as_str()).collect()
    }

    pub fn to_amd(&self, options: &OutputOptions) -> Result<Output> {
        self.emit(Format::Amd, options)
    }

    pub fn to_cjs(&self, options: &OutputOptions) -> Result<Output> {
        self.emit(Format::Cjs, options)
    }

    pub fn to_umd(&self, options: &OutputOptions) -> Result<Output> {
        self.emit(Format::Umd, options)
    }

    fn emit(&self, format: Format, options: &OutputOptions) -> Result<Output> {
        let graph = &self.graph;
        let amd_like = matches!(format, Format::Amd | Format::Umd);
        if options.absolute_paths && amd_like && options.amd_name.is_none() {
            return Err(CompileError::MissingAmdName);
        }

        let plan = plan::plan(graph, options.strict)?;

        let deps: Vec<Dep> = graph
            .externals
            .iter()
            .map(|e| Dep {
                amd_path: e.id.clone(),
                require_path: e.id.clone(),
                global_name: e.name.clone(),
                name: Some(e.name.clone()),
                interop: options.strict && e.needs_default && e.needs_named,
            })
            .collect();

        let getters: Vec<(String, String)> = if options.strict {
            plan.entry_exports
                .iter()
                .filter(|e| e.chained)
                .map(|e| (e.exported.clone(), e.local_repl.clone()))
                .collect()
        } else {
            Vec::new()
        };
        let hoisted: Vec<(String, String)> = plan
            .entry_exports
            .iter()
            .filter(|e| e.hoist)
            .map(|e| (e.exported.clone(), e.local_repl.clone()))
            .collect();
        let trailing_default = if options.strict {
            None
        } else {
            plan.entry_exports
                .iter()
                .find(|e| e.is_default)
                .map(|e| e.local_repl.clone())
        };

        let has_exports = options.strict && !graph.entry().does_export.is_empty();
        let wrapper = wrappers::build(&WrapperSpec {
            format: Some(format),
            has_exports,
            name: options.name.as_deref(),
            amd_name: options.amd_name.as_deref(),
            deps,
            requires_in_body: false,
            getters,
            hoisted,
            trailing_default,
        })?;

        let mut body = BundleBuffer::new("\n\n");
        for (index, module) in graph.modules.iter().enumerate() {
            let mut buffer = rewrite::rewrite_bundle_module(module, graph, &plan, index)?;
            if buffer.to_string().is_empty() {
                // Nothing left after rewriting, e.g. a pure re-export module.
                continue;
            }
            if let Some(indent) = wrapper.body_indent {
                buffer.indent(indent);
            }
            body.push(module.file.clone(), buffer);
        }

        assemble(&body, &wrapper.intro, &wrapper.outro, options)
    }

    /// Wrap the bundle body in a plain IIFE. Only available when nothing is
    /// imported or exported.
    pub fn concat(&self, options: &ConcatOptions) -> Result<Output> {
        let graph = &self.graph;
        if !graph.externals.is_empty() || !graph.entry().does_export.is_empty() {
            return Err(CompileError::ConcatUnsupported);
        }

        let plan = plan::plan(graph, true)?;
        let indent = options.indent.clone().unwrap_or_else(|| "\t".to_string());

        let mut body = BundleBuffer::new("\n\n");
        for (index, module) in graph.modules.iter().enumerate() {
            let mut buffer = rewrite::rewrite_bundle_module(module, graph, &plan, index)?;
            if buffer.to_string().is_empty() {
                continue;
            }
            if !indent.is_empty() {
                buffer.indent(&indent);
            }
            body.push(module.file.clone(), buffer);
        }

        let iife = wrappers::build(&WrapperSpec::default())?;
        let intro = options.intro.clone().unwrap_or(iife.intro);
        let outro = options.outro.clone().unwrap_or(iife.outro);
        let output = OutputOptions {
            source_map: options.source_map,
            source_map_file: options.source_map_file.clone(),
            ..OutputOptions::default()
        };
        assemble(&body, &intro, &outro, &output)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSEMBLY
// ═══════════════════════════════════════════════════════════════════════════════

fn assemble(
    body: &BundleBuffer,
    intro: &str,
    outro: &str,
    options: &OutputOptions,
) -> Result<Output> {
    let map_file = match options.source_map {
        Some(_) => match options.source_map_file.as_deref() {
            Some(file) => Some(basename(file).to_string()),
            None => return Err(CompileError::MissingSourceMapFile),
        },
        None => None,
    };

    let mut code = String::new();
    if let Some(banner) = &options.banner {
        code.push_str(banner);
        if !banner.ends_with('\n') {
            code.push('\n');
        }
    }
    let line_shift = code.matches('\n').count() as u32 + intro.matches('\n').count() as u32;
    code.push_str(intro);

    let rendered = body.render();
    code.push_str(&rendered.code);
    code.push_str(outro);

    if let Some(footer) = &options.footer {
        code.push_str(footer);
        if !footer.ends_with('\n') {
            code.push('\n');
        }
    }

    let map = match (options.source_map, map_file) {
        (Some(kind), Some(file)) => {
            let map = body.map(&rendered, &file, line_shift);
            let url = match kind {
                SourceMapKind::File => format!("{file}.map"),
                SourceMapKind::Inline => map.to_data_uri(),
            };
            code.push_str(&format!("//# sourceMappingURL={url}\n"));
            Some(map)
        }
        _ => None,
    };

    Ok(Output { code, map })
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
