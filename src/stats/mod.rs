// Build statistics snapshot and the options that control how it is reported

pub mod report;

pub use report::{format_size, render};

use crate::config::StatsConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Dependency directories hidden from stats when JSON output asks for a quiet baseline
pub const DEFAULT_EXCLUDE: [&str; 4] = ["node_modules", "bower_components", "jam", "components"];

/// Statistics snapshot of one bundler run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Content hash of the build; unchanged sources give an unchanged hash
    pub hash: String,

    /// Wall-clock duration of the run in milliseconds
    #[serde(rename = "time")]
    pub time_ms: u64,

    pub assets: Vec<AssetStats>,

    /// Asset file names per chunk; a string for one file, a list for several
    pub assets_by_chunk_name: BTreeMap<String, ChunkAssets>,

    pub chunks: Vec<ChunkStats>,

    pub modules: Vec<ModuleStats>,

    pub errors: Vec<String>,

    pub warnings: Vec<String>,
}

/// One output file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetStats {
    pub name: String,
    pub size: u64,
    /// Whether this run wrote the asset
    pub emitted: bool,
    pub chunk_names: Vec<String>,
}

/// Files produced for one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkAssets {
    One(String),
    Many(Vec<String>),
}

impl ChunkAssets {
    /// Collapse a single file into `One`
    pub fn from_files(mut files: Vec<String>) -> Self {
        if files.len() == 1 {
            ChunkAssets::One(files.remove(0))
        } else {
            ChunkAssets::Many(files)
        }
    }

    pub fn files(&self) -> Vec<&str> {
        match self {
            ChunkAssets::One(file) => vec![file.as_str()],
            ChunkAssets::Many(files) => files.iter().map(String::as_str).collect(),
        }
    }
}

/// One logical output unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkStats {
    pub name: String,
    pub files: Vec<String>,
    pub size: u64,
    /// Whether the chunk is an entry chunk
    pub entry: bool,
    /// Names of the modules bundled into this chunk
    pub modules: Vec<String>,
}

/// One source module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStats {
    pub name: String,
    pub size: u64,
    /// Whether the module was reused from an earlier build
    pub cached: bool,
    pub chunks: Vec<String>,
    pub reasons: Vec<Reason>,
}

/// Why a module is part of the build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reason {
    /// Importing module
    pub module: String,
    /// Import kind, e.g. `import-statement`
    #[serde(rename = "type")]
    pub kind: String,
}

/// Effective stats reporting options
#[derive(Debug, Clone, PartialEq)]
pub struct StatsOptions {
    /// `false` silences the human-readable report
    pub enabled: bool,
    pub json: bool,
    pub colors: bool,
    pub chunks: bool,
    pub modules: bool,
    pub chunk_modules: bool,
    pub reasons: bool,
    pub cached: bool,
    pub cached_assets: bool,
    pub exclude: Vec<String>,
}

impl StatsOptions {
    /// Baseline options before any user override
    pub fn baseline(colors: bool) -> Self {
        Self {
            enabled: true,
            json: false,
            colors,
            chunks: true,
            modules: true,
            chunk_modules: true,
            reasons: true,
            cached: true,
            cached_assets: true,
            exclude: Vec::new(),
        }
    }

    /// Compute effective options from the user's stats setting
    ///
    /// Requesting JSON without touching cache display switches the baseline
    /// to hide cached modules, cached assets and dependency directories.
    pub fn resolve(config: Option<&StatsConfig>, colors: bool) -> Self {
        let mut options = Self::baseline(colors);

        let overrides = match config {
            None | Some(StatsConfig::Toggle(true)) => return options,
            Some(StatsConfig::Toggle(false)) => {
                options.enabled = false;
                return options;
            }
            Some(StatsConfig::Options(overrides)) => overrides,
        };

        let wants_json = overrides.json == Some(true);
        if wants_json && overrides.cached.is_none() && overrides.cached_assets.is_none() {
            options.cached = false;
            options.cached_assets = false;
            options.exclude = DEFAULT_EXCLUDE.iter().map(|dir| dir.to_string()).collect();
        }

        options.json = wants_json;
        options.colors = overrides.colors.unwrap_or(options.colors);
        options.chunks = overrides.chunks.unwrap_or(options.chunks);
        options.modules = overrides.modules.unwrap_or(options.modules);
        options.chunk_modules = overrides.chunk_modules.unwrap_or(options.chunk_modules);
        options.reasons = overrides.reasons.unwrap_or(options.reasons);
        options.cached = overrides.cached.unwrap_or(options.cached);
        options.cached_assets = overrides.cached_assets.unwrap_or(options.cached_assets);
        if let Some(exclude) = &overrides.exclude {
            options.exclude = exclude.clone();
        }
        options
    }

    /// Whether a module path sits under one of the excluded directories
    pub fn is_excluded(&self, module: &str) -> bool {
        module
            .split(['/', '\\'])
            .any(|segment| self.exclude.iter().any(|dir| dir == segment))
    }

    fn shows_module(&self, module: &ModuleStats) -> bool {
        (self.cached || !module.cached) && !self.is_excluded(&module.name)
    }
}

impl Stats {
    /// Copy of the snapshot with hidden modules and assets dropped
    ///
    /// Returns the filtered stats and the number of modules hidden.
    pub fn filtered(&self, options: &StatsOptions) -> (Stats, usize) {
        let mut view = self.clone();

        if !options.cached_assets {
            view.assets.retain(|asset| asset.emitted);
        }

        let before = view.modules.len();
        view.modules.retain(|module| options.shows_module(module));
        let hidden = before - view.modules.len();

        let visible: Vec<&str> = view.modules.iter().map(|m| m.name.as_str()).collect();
        for chunk in &mut view.chunks {
            if options.chunk_modules {
                chunk.modules.retain(|name| visible.contains(&name.as_str()));
            } else {
                chunk.modules.clear();
            }
        }

        if !options.reasons {
            for module in &mut view.modules {
                module.reasons.clear();
            }
        }

        (view, hidden)
    }

    /// Machine-readable stats honouring the options
    pub fn to_json(&self, options: &StatsOptions) -> Value {
        let (view, _) = self.filtered(options);
        let mut json = serde_json::to_value(&view).unwrap_or(Value::Null);

        if let Value::Object(map) = &mut json {
            if !options.chunks {
                map.remove("chunks");
            }
            if !options.modules {
                map.remove("modules");
            }
        }
        json
    }

    /// Module by name
    pub fn module(&self, name: &str) -> Option<&ModuleStats> {
        self.modules.iter().find(|module| module.name == name)
    }
}
