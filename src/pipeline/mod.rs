// Host pipeline capability - the static-site generator side of the adapter

pub mod directory;

pub use directory::DirectoryPipeline;

use crate::error::PipelineError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Files flowing through the pipeline, keyed by path relative to the destination root
pub type FileSet = BTreeMap<String, PipelineFile>;

/// One file in the pipeline's virtual file set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineFile {
    pub contents: Vec<u8>,

    /// Absolute path the contents were read from, if any
    pub source_path: Option<PathBuf>,
}

impl PipelineFile {
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
            source_path: None,
        }
    }

    pub fn with_source(contents: impl Into<Vec<u8>>, source_path: PathBuf) -> Self {
        Self {
            contents: contents.into(),
            source_path: Some(source_path),
        }
    }
}

/// Shared build metadata
///
/// Cheap to clone; every clone sees the same map.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    inner: Arc<Mutex<Map<String, Value>>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().get(key).cloned()
    }

    /// Set `key`, replacing any previous value
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.lock().insert(key.into(), value)
    }

    /// Copy of the whole map
    pub fn snapshot(&self) -> Map<String, Value> {
        self.inner.lock().clone()
    }
}

/// The capabilities the adapter consumes from the host pipeline
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Shared metadata of the current build
    fn metadata(&self) -> Metadata;

    /// Absolute output directory
    fn destination(&self) -> PathBuf;

    /// Persist a file set under the destination in one batch
    async fn write(&self, files: &FileSet) -> Result<(), PipelineError>;
}
