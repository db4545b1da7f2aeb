// Configuration types for the bundler adapter

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use sugar_path::SugarPath;

/// Chunk name used when entries are not named
pub const DEFAULT_CHUNK: &str = "main";

/// Module entry point(s)
///
/// Mirrors the shapes bundlers accept: a single module, a list of modules
/// bundled into one chunk, or a table of named chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    Single(String),
    Multiple(Vec<String>),
    Named(BTreeMap<String, EntrySources>),
}

/// Sources of one named chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntrySources {
    One(String),
    Many(Vec<String>),
}

impl EntrySources {
    fn to_vec(&self) -> Vec<String> {
        match self {
            EntrySources::One(source) => vec![source.clone()],
            EntrySources::Many(sources) => sources.clone(),
        }
    }
}

impl Entry {
    /// Chunks this entry produces, as `(chunk name, sources)` pairs
    pub fn chunks(&self) -> Vec<(String, Vec<String>)> {
        match self {
            Entry::Single(source) => vec![(DEFAULT_CHUNK.to_string(), vec![source.clone()])],
            Entry::Multiple(sources) => vec![(DEFAULT_CHUNK.to_string(), sources.clone())],
            Entry::Named(named) => named
                .iter()
                .map(|(name, sources)| (name.clone(), sources.to_vec()))
                .collect(),
        }
    }

    /// Whether the entry names no module at all
    pub fn is_empty(&self) -> bool {
        self.chunks().iter().all(|(_, sources)| sources.is_empty())
    }
}

/// Output section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory, relative paths resolve against the working directory
    pub path: Option<PathBuf>,

    /// Naming pattern such as `[name].js` or `[name]-[hash].js`
    pub filename: Option<String>,

    /// Any other output option, passed to the bundler verbatim
    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

/// User-facing stats setting: a toggle or a table of overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatsConfig {
    Toggle(bool),
    Options(StatsOverrides),
}

/// Per-field overrides laid over the baseline stats options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsOverrides {
    /// Print machine-readable JSON instead of a report
    pub json: Option<bool>,
    pub colors: Option<bool>,
    pub chunks: Option<bool>,
    pub modules: Option<bool>,
    pub chunk_modules: Option<bool>,
    pub reasons: Option<bool>,
    pub cached: Option<bool>,
    pub cached_assets: Option<bool>,
    /// Module path fragments hidden from stats output
    pub exclude: Option<Vec<String>>,
}

/// Bundler adapter configuration
///
/// Loaded from `sitepack.toml` or built in code. Unknown keys are kept in
/// `options` and handed to the bundler untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    pub entry: Option<Entry>,

    /// Base directory entries resolve against
    pub context: Option<PathBuf>,

    pub output: OutputConfig,

    pub stats: Option<StatsConfig>,

    /// Always forced off; the adapter runs once per pipeline pass
    pub watch: bool,

    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

impl PackConfig {
    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Toml {
            path: "<string>".into(),
            error: e.to_string(),
        })
    }

    /// Whether both an entry and an output filename are configured
    ///
    /// An incomplete configuration turns the adapter into a pass-through.
    pub fn is_complete(&self) -> bool {
        let has_entry = self.entry.as_ref().is_some_and(|entry| !entry.is_empty());
        let has_filename = self
            .output
            .filename
            .as_deref()
            .is_some_and(|filename| !filename.is_empty());
        has_entry && has_filename
    }

    /// Resolve `context` and `output.path` to absolute paths and force watch off
    ///
    /// Unset paths default to `cwd`. Idempotent.
    pub fn normalize(mut self, cwd: &Path) -> Self {
        let resolve = |path: Option<PathBuf>| match path {
            Some(path) => path.absolutize_with(cwd),
            None => cwd.normalize(),
        };
        self.context = Some(resolve(self.context.take()));
        self.output.path = Some(resolve(self.output.path.take()));

        self.watch = false;
        self
    }

    /// Context directory, `.` before normalization
    pub fn context_dir(&self) -> PathBuf {
        self.context.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Output directory, `.` before normalization
    pub fn output_dir(&self) -> PathBuf {
        self.output.path.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
