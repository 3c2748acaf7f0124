mod analyze;
mod api;
mod declarations;
mod errors;
mod graph;
mod module;
mod names;
mod parse;
mod plan;
mod resolve;
mod rewrite;
mod scope;
mod source_buffer;
mod source_map;
mod wrappers;

#[cfg(feature = "napi")]
mod addon;

mod rewrite_tests;

pub use api::{
    bundle, transpile, Bundle, BundleOptions, ConcatOptions, Output, OutputOptions,
    SourceMapKind, TranspileOptions,
};
pub use errors::{CompileError, Result};
pub use module::{FsReader, MemoryReader, ModuleReader};
pub use source_map::SourceMap;
pub use wrappers::Format;
