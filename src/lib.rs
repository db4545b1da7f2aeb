//! Runs a module bundler inside a static-site pipeline.
//!
//! The [`BundlerAdapter`] invokes a [`bundle::Compiler`] once per pipeline
//! pass, copies the assets it emits out of an in-memory output filesystem into
//! the pipeline's file set, and records an [`manifest::AssetManifest`] in the
//! pipeline metadata.

pub mod adapter;
pub mod bundle;
pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod paths;
pub mod pipeline;
pub mod stats;
pub mod terminal;

pub use adapter::{BundlerAdapter, EsbuildAdapter};
pub use config::PackConfig;
pub use error::{CompileError, ConfigError, HookError, PackError, PipelineError};
pub use manifest::{AssetManifest, MANIFEST_KEY};
pub use pipeline::{FileSet, Metadata, Pipeline, PipelineFile};
