// Error types for sitepack

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type returned by the bundler adapter
///
/// Individual error types are exposed through `From` conversions.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bundling failed: {0}")]
    Compile(#[from] CompileError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackError {
    /// The persistence failure carried by this error, if the run was aborted by one
    pub fn as_persist(&self) -> Option<&PipelineError> {
        match self {
            PackError::Compile(CompileError::Hook {
                source: HookError::Persist(err),
                ..
            }) => Some(err),
            _ => None,
        }
    }
}

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("TOML parsing error in {path}: {error}")]
    Toml { path: PathBuf, error: String },
}

/// Errors raised by a bundler run
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(
        "esbuild not found. Install it with: npm install -g esbuild\n\
         esbuild is required to bundle site assets."
    )]
    EsbuildNotFound,

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Invalid metafile: {0}")]
    Metafile(String),

    #[error("Hook '{plugin}' failed: {source}")]
    Hook {
        plugin: String,
        #[source]
        source: HookError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors a compiler hook can stop the run with
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Persisting assets failed: {0}")]
    Persist(#[from] PipelineError),

    #[error("Emitted asset missing from output filesystem: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("Hook invoked outside of an adapter invocation")]
    Inactive,
}

/// Errors from the host pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid source pattern: {0}")]
    Pattern(String),
}
