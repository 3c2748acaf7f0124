//! Error taxonomy for nadir.
//!
//! Every failure is fatal to the operation that raised it; there is no
//! partial output. Each variant carries a stable diagnostic code so host
//! tooling can match on errors without parsing messages.

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_PARSE: &str = "N-ERR-PARSE";
pub const ERR_SELF_IMPORT: &str = "N-ERR-SELF-IMPORT";
pub const ERR_ENTRY: &str = "N-ERR-ENTRY";
pub const ERR_READ: &str = "N-ERR-READ";
pub const ERR_DUP_IMPORT: &str = "N-ERR-DUP-IMPORT";
pub const ERR_DUP_DEFAULT: &str = "N-ERR-DUP-DEFAULT";
pub const ERR_EXPORT_ALL: &str = "N-ERR-EXPORT-ALL";
pub const ERR_MISSING_EXPORT: &str = "N-ERR-MISSING-EXPORT";
pub const ERR_REASSIGN: &str = "N-ERR-REASSIGN";
pub const ERR_THIS: &str = "N-ERR-THIS";
pub const ERR_STRICT: &str = "N-ERR-STRICT";
pub const ERR_NAME: &str = "N-ERR-NAME";
pub const ERR_AMD_NAME: &str = "N-ERR-AMD-NAME";
pub const ERR_SOURCEMAP: &str = "N-ERR-SOURCEMAP";
pub const ERR_NAME_TAKEN: &str = "N-ERR-NAME-TAKEN";
pub const ERR_CONCAT: &str = "N-ERR-CONCAT";

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILE ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("module `{id}` imports itself")]
    SelfImport { id: String },

    #[error("could not find entry module `{entry}`")]
    EntryNotFound { entry: String },

    #[error("failed to read `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("duplicate import alias `{alias}` in `{id}`")]
    DuplicateImport { id: String, alias: String },

    #[error("duplicate default export in `{id}`")]
    DuplicateDefaultExport { id: String },

    #[error("`export *` is not supported (in `{id}`)")]
    BatchExport { id: String },

    #[error("module `{importer}` imports `{name}` from `{id}`, but `{id}` does not export it")]
    MissingExport {
        importer: String,
        id: String,
        name: String,
    },

    #[error("cannot reassign imported binding `{name}`")]
    IllegalReassignment { name: String },

    #[error("cannot reassign imported binding of namespace `{name}`")]
    NamespaceReassignment { name: String },

    #[error("`this` at the top level of a module is `undefined` and has no properties")]
    TopLevelThisMember,

    #[error("defaults mode supports a single default export only; pass `strict` to use named imports and exports")]
    StrictModeRequired,

    #[error("the universal wrapper needs a `name` option so the global fallback knows what to attach to")]
    MissingName,

    #[error("an `amd_name` is required to resolve absolute AMD dependency paths")]
    MissingAmdName,

    #[error("source maps need a `source_map_file` option")]
    MissingSourceMapFile,

    #[error("source maps for a single module need a `source_map_source` option")]
    MissingSourceMapSource,

    #[error("module name `{name}` is already in use")]
    NamingCollision { name: String },

    #[error("`concat` needs a bundle with no imports and no exports")]
    ConcatUnsupported,
}

impl CompileError {
    /// Stable diagnostic code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::Parse { .. } => ERR_PARSE,
            CompileError::SelfImport { .. } => ERR_SELF_IMPORT,
            CompileError::EntryNotFound { .. } => ERR_ENTRY,
            CompileError::Read { .. } => ERR_READ,
            CompileError::DuplicateImport { .. } => ERR_DUP_IMPORT,
            CompileError::DuplicateDefaultExport { .. } => ERR_DUP_DEFAULT,
            CompileError::BatchExport { .. } => ERR_EXPORT_ALL,
            CompileError::MissingExport { .. } => ERR_MISSING_EXPORT,
            CompileError::IllegalReassignment { .. } => ERR_REASSIGN,
            CompileError::NamespaceReassignment { .. } => ERR_REASSIGN,
            CompileError::TopLevelThisMember => ERR_THIS,
            CompileError::StrictModeRequired => ERR_STRICT,
            CompileError::MissingName => ERR_NAME,
            CompileError::MissingAmdName => ERR_AMD_NAME,
            CompileError::MissingSourceMapFile => ERR_SOURCEMAP,
            CompileError::MissingSourceMapSource => ERR_SOURCEMAP,
            CompileError::NamingCollision { .. } => ERR_NAME_TAKEN,
            CompileError::ConcatUnsupported => ERR_CONCAT,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
