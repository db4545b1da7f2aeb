// Asset manifest - which files a build produced, by logical name and by extension

use crate::paths;
use crate::pipeline::Metadata;
use crate::stats::ChunkAssets;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key the manifest is stored under
pub const MANIFEST_KEY: &str = "bundle";

/// Manifest written into the pipeline metadata after every run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    /// `<chunkName><extension>` -> asset path
    pub assets: BTreeMap<String, String>,

    /// Extension without the dot -> asset paths, most recently discovered first
    pub assets_by_type: BTreeMap<String, Vec<String>>,
}

impl AssetManifest {
    /// Build the manifest from the per-chunk asset table of a run
    ///
    /// Each asset gets one entry named after its chunk plus its own extension,
    /// so `main` producing `main.js` and `main.js.map` yields `main.js` and
    /// `main.map`. A later asset with the same synthesized name replaces the
    /// earlier one but keeps its discovery position.
    pub fn from_chunks(assets_by_chunk_name: &BTreeMap<String, ChunkAssets>) -> Self {
        let mut assets = BTreeMap::new();
        let mut discovered: Vec<String> = Vec::new();

        for (chunk_name, chunk_assets) in assets_by_chunk_name {
            for file in chunk_assets.files() {
                let name = format!("{}{}", chunk_name, paths::extname(file));
                if assets.insert(name.clone(), file.to_string()).is_none() {
                    discovered.push(name);
                }
            }
        }

        let mut assets_by_type: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in &discovered {
            let ext = paths::extname(name).trim_start_matches('.').to_string();
            // prepend: reverse-discovery order
            assets_by_type
                .entry(ext)
                .or_default()
                .insert(0, assets[name].clone());
        }

        Self {
            assets,
            assets_by_type,
        }
    }

    /// Parse a manifest from its JSON form
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    /// Manifest stored in pipeline metadata by the last run, if any
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        metadata.get(MANIFEST_KEY).and_then(Self::from_value)
    }

    /// Number of assets listed
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
