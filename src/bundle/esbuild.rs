// esbuild integration - a Compiler that drives the esbuild CLI

use super::{emit_assets, Compiler, CompilerHooks, MemoryFs, PendingAsset};
use crate::config::PackConfig;
use crate::error::CompileError;
use crate::paths;
use crate::stats::{AssetStats, ChunkAssets, ChunkStats, ModuleStats, Reason, Stats};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;
use sugar_path::SugarPath;
use tempfile::TempDir;
use which::which;

/// esbuild bundler configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EsbuildConfig {
    /// ECMAScript target version
    pub target: String,

    /// Whether to minify the output
    pub minify: bool,

    /// Output format (iife, cjs, esm)
    pub format: String,

    /// Whether to emit `.map` files next to each output
    pub sourcemap: bool,

    /// External modules to exclude from bundling
    pub external: Vec<String>,

    /// Additional esbuild arguments
    pub extra_args: Vec<String>,
}

impl Default for EsbuildConfig {
    fn default() -> Self {
        Self {
            target: "es2020".to_string(),
            minify: false,
            format: "iife".to_string(),
            sourcemap: false,
            external: vec![],
            extra_args: vec![],
        }
    }
}

impl EsbuildConfig {
    /// Build from pass-through options
    ///
    /// Known keys fill the typed fields. Any other key becomes a flag:
    /// `true` -> `--key`, `false` is dropped, arrays -> `--key:item` per item,
    /// everything else -> `--key=value`.
    pub fn from_options(options: &BTreeMap<String, Value>) -> Self {
        let mut config = Self::default();

        for (key, value) in options {
            match (key.as_str(), value) {
                ("target", Value::String(target)) => config.target = target.clone(),
                ("minify", Value::Bool(minify)) => config.minify = *minify,
                ("format", Value::String(format)) => config.format = format.clone(),
                ("sourcemap", Value::Bool(sourcemap)) => config.sourcemap = *sourcemap,
                ("external", Value::Array(items)) => {
                    config.external = items.iter().filter_map(scalar).collect();
                }
                _ => config.push_flag(key, value),
            }
        }
        config
    }

    /// Fold in the extra keys of the `[output]` section
    ///
    /// `publicPath`, `chunkFilename` and `assetFilename` become `--public-path`,
    /// `--chunk-names` and `--asset-names`. Other keys follow the same rules
    /// as top-level options.
    pub fn with_output_options(mut self, options: &BTreeMap<String, Value>) -> Self {
        for (key, value) in options {
            match (key.as_str(), value) {
                ("publicPath", Value::String(path)) => {
                    self.extra_args.push(format!("--public-path={path}"));
                }
                ("chunkFilename", Value::String(pattern)) => {
                    self.extra_args
                        .push(format!("--chunk-names={}", entry_names(pattern)));
                }
                ("assetFilename", Value::String(pattern)) => {
                    let stem = pattern.strip_suffix(".[ext]").unwrap_or(pattern);
                    self.extra_args
                        .push(format!("--asset-names={}", entry_names(stem)));
                }
                _ => self.push_flag(key, value),
            }
        }
        self
    }

    fn push_flag(&mut self, key: &str, value: &Value) {
        match value {
            Value::Bool(true) => self.extra_args.push(format!("--{key}")),
            Value::Bool(false) | Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter_map(scalar) {
                    self.extra_args.push(format!("--{key}:{item}"));
                }
            }
            other => match scalar(other) {
                Some(value) => self.extra_args.push(format!("--{key}={value}")),
                None => tracing::warn!(option = %key, "Ignoring option esbuild cannot take"),
            },
        }
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Translate an output filename pattern into esbuild's `--entry-names`
///
/// esbuild appends the extension itself and only knows `[hash]`.
pub fn entry_names(filename: &str) -> String {
    let stem = match paths::extname(filename) {
        ".js" | ".mjs" | ".cjs" => &filename[..filename.len() - paths::extname(filename).len()],
        _ => filename,
    };
    stem.replace("[chunkhash]", "[hash]")
        .replace("[contenthash]", "[hash]")
}

/// esbuild compiler bound to one configuration
///
/// Each run bundles into a scratch directory, then seals the outputs into the
/// in-memory output filesystem under the configured output path.
pub struct EsbuildCompiler {
    esbuild_path: PathBuf,
    config: EsbuildConfig,
    context: PathBuf,
    output_dir: PathBuf,
    entry_names: String,
    /// Chunk name -> absolute sources
    chunks: Vec<(String, Vec<PathBuf>)>,
    hooks: CompilerHooks,
    output_fs: MemoryFs,
    /// Staged entry shims and raw esbuild output of the last run
    scratch: Option<TempDir>,
}

impl EsbuildCompiler {
    /// Create a compiler by detecting esbuild
    ///
    /// # Errors
    ///
    /// Returns `CompileError::EsbuildNotFound` if esbuild is not installed
    /// or not in PATH.
    pub fn new(pack: &PackConfig) -> Result<Self, CompileError> {
        let esbuild_path = which("esbuild").map_err(|_| CompileError::EsbuildNotFound)?;
        Ok(Self::with_esbuild_path(esbuild_path, pack))
    }

    /// Create a compiler with a specific esbuild path
    ///
    /// This is useful for testing or when esbuild is not in PATH. `pack` is
    /// expected to be normalized.
    pub fn with_esbuild_path(esbuild_path: PathBuf, pack: &PackConfig) -> Self {
        let context = pack.context_dir();
        let chunks = pack
            .entry
            .as_ref()
            .map(|entry| entry.chunks())
            .unwrap_or_default()
            .into_iter()
            .map(|(name, sources)| {
                let sources = sources
                    .iter()
                    .map(|source| Path::new(source).absolutize_with(context.as_path()))
                    .collect();
                (name, sources)
            })
            .collect();

        Self {
            esbuild_path,
            config: EsbuildConfig::from_options(&pack.options)
                .with_output_options(&pack.output.options),
            output_dir: pack.output_dir(),
            entry_names: entry_names(pack.output.filename.as_deref().unwrap_or("[name]")),
            context,
            chunks,
            hooks: CompilerHooks::default(),
            output_fs: MemoryFs::new(),
            scratch: None,
        }
    }

    /// Write shim modules for chunks with several sources
    ///
    /// Returns `(chunk name, entry module)` pairs.
    fn stage_entries(&self, scratch: &Path) -> Result<Vec<(String, PathBuf)>, CompileError> {
        let mut entries = Vec::with_capacity(self.chunks.len());

        for (name, sources) in &self.chunks {
            match sources.as_slice() {
                [] => continue,
                [single] => entries.push((name.clone(), single.clone())),
                many => {
                    let shim_dir = scratch.join("entries");
                    std::fs::create_dir_all(&shim_dir)?;
                    let shim = shim_dir.join(format!("{name}.js"));
                    let body: String = many
                        .iter()
                        .map(|source| {
                            let quoted = serde_json::to_string(&source.to_string_lossy())
                                .unwrap_or_default();
                            format!("import {quoted};\n")
                        })
                        .collect();
                    std::fs::write(&shim, body)?;
                    entries.push((name.clone(), shim));
                }
            }
        }
        Ok(entries)
    }

    /// Command-line arguments for one run
    pub fn build_args(&self, entries: &[(String, PathBuf)], outdir: &Path, metafile: &Path) -> Vec<String> {
        let mut args: Vec<String> = entries
            .iter()
            .map(|(name, path)| format!("{}={}", name, path.display()))
            .collect();

        args.push("--bundle".to_string());
        args.push(format!("--outdir={}", outdir.display()));
        args.push(format!("--entry-names={}", self.entry_names));
        args.push(format!("--metafile={}", metafile.display()));
        args.push(format!("--target={}", self.config.target));
        args.push(format!("--format={}", self.config.format));
        args.push("--log-level=warning".to_string());

        if self.config.minify {
            args.push("--minify".to_string());
        }
        if self.config.sourcemap {
            args.push("--sourcemap".to_string());
        }
        for ext in &self.config.external {
            args.push(format!("--external:{}", ext));
        }
        args.extend(self.config.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl Compiler for EsbuildCompiler {
    fn hooks_mut(&mut self) -> &mut CompilerHooks {
        &mut self.hooks
    }

    fn set_output_file_system(&mut self, fs: MemoryFs) {
        self.output_fs = fs;
    }

    async fn run(&mut self) -> Result<Stats, CompileError> {
        let started = Instant::now();
        let scratch = tempfile::Builder::new().prefix("sitepack-").tempdir()?;
        let outdir = scratch.path().join("out");
        let metafile = scratch.path().join("meta.json");

        let entries = self.stage_entries(scratch.path())?;
        let args = self.build_args(&entries, &outdir, &metafile);
        tracing::debug!(esbuild = %self.esbuild_path.display(), ?args, "Running esbuild");

        let output = tokio::process::Command::new(&self.esbuild_path)
            .args(&args)
            .current_dir(&self.context)
            .output()
            .await
            .map_err(|e| CompileError::BuildFailed(format!("Failed to execute esbuild: {}", e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(CompileError::BuildFailed(format!("esbuild failed: {}", stderr)));
        }

        let raw = tokio::fs::read(&metafile).await?;
        let meta: Metafile =
            serde_json::from_slice(&raw).map_err(|e| CompileError::Metafile(e.to_string()))?;

        let mut outputs = Vec::with_capacity(meta.outputs.len());
        for key in meta.outputs.keys() {
            let path = Path::new(key).absolutize_with(self.context.as_path());
            let contents = tokio::fs::read(&path).await?;
            outputs.push(PendingAsset {
                name: paths::file_key(&outdir, &path),
                contents,
            });
        }

        let entry_chunks: HashMap<PathBuf, String> = entries
            .into_iter()
            .map(|(name, path)| (path, name))
            .collect();
        let mut stats = stats_from_metafile(&meta, &self.context, &outdir, &entry_chunks);
        stats.hash = content_hash(&outputs);
        stats.time_ms = started.elapsed().as_millis() as u64;
        if !stderr.is_empty() {
            stats.warnings.push(stderr);
        }

        self.scratch = Some(scratch);
        emit_assets(&self.hooks, &self.output_fs, &self.output_dir, stats, outputs).await
    }

    fn purge_input_file_system(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            tracing::debug!(path = %scratch.path().display(), "Purging staged esbuild inputs");
        }
    }
}

/// esbuild `--metafile` document
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Metafile {
    pub inputs: BTreeMap<String, MetaInput>,
    pub outputs: BTreeMap<String, MetaOutput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetaInput {
    pub bytes: u64,
    pub imports: Vec<MetaImport>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetaImport {
    pub path: String,
    pub kind: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetaOutput {
    pub bytes: u64,
    pub inputs: BTreeMap<String, Value>,
    pub entry_point: Option<String>,
    pub css_bundle: Option<String>,
}

/// Turn a metafile into a stats snapshot (hash and time left empty)
///
/// Metafile paths are relative to `context`. `entry_chunks` maps absolute
/// entry modules to chunk names. `.map` and CSS bundle outputs join the chunk
/// of the output they belong to.
pub fn stats_from_metafile(
    meta: &Metafile,
    context: &Path,
    outdir: &Path,
    entry_chunks: &HashMap<PathBuf, String>,
) -> Stats {
    let output_name = |key: &str| paths::file_key(outdir, &Path::new(key).absolutize_with(context));

    let mut chunk_of: HashMap<&str, String> = HashMap::new();
    for (key, output) in &meta.outputs {
        let Some(entry_point) = &output.entry_point else {
            continue;
        };
        let entry = Path::new(entry_point).absolutize_with(context);
        if let Some(chunk) = entry_chunks.get(&entry) {
            chunk_of.insert(key.as_str(), chunk.clone());
            if let Some(css) = &output.css_bundle {
                chunk_of.insert(css.as_str(), chunk.clone());
            }
        }
    }
    for key in meta.outputs.keys() {
        if let Some(owner) = key.strip_suffix(".map") {
            if let Some(chunk) = chunk_of.get(owner).cloned() {
                chunk_of.insert(key.as_str(), chunk);
            }
        }
    }

    let mut chunks: BTreeMap<String, ChunkStats> = BTreeMap::new();
    let mut assets = Vec::with_capacity(meta.outputs.len());
    let mut module_chunks: HashMap<&str, Vec<String>> = HashMap::new();

    for (key, output) in &meta.outputs {
        let name = output_name(key);
        let chunk_name = chunk_of.get(key.as_str()).cloned();

        if let Some(chunk_name) = &chunk_name {
            let chunk = chunks.entry(chunk_name.clone()).or_insert_with(|| ChunkStats {
                name: chunk_name.clone(),
                entry: true,
                ..Default::default()
            });
            // main output first, companions after
            if output.entry_point.is_some() {
                chunk.files.insert(0, name.clone());
            } else {
                chunk.files.push(name.clone());
            }
            if !key.ends_with(".map") {
                chunk.size += output.bytes;
            }
            for input in output.inputs.keys() {
                if !chunk.modules.contains(input) {
                    chunk.modules.push(input.clone());
                }
                let owners = module_chunks.entry(input.as_str()).or_default();
                if !owners.contains(chunk_name) {
                    owners.push(chunk_name.clone());
                }
            }
        }

        assets.push(AssetStats {
            name,
            size: output.bytes,
            emitted: false,
            chunk_names: chunk_name.into_iter().collect(),
        });
    }

    let mut reasons: HashMap<&str, Vec<Reason>> = HashMap::new();
    for (importer, input) in &meta.inputs {
        for import in &input.imports {
            reasons.entry(import.path.as_str()).or_default().push(Reason {
                module: importer.clone(),
                kind: import.kind.clone(),
            });
        }
    }

    let modules = meta
        .inputs
        .iter()
        .map(|(name, input)| ModuleStats {
            name: name.clone(),
            size: input.bytes,
            cached: false,
            chunks: module_chunks.get(name.as_str()).cloned().unwrap_or_default(),
            reasons: reasons.remove(name.as_str()).unwrap_or_default(),
        })
        .collect();

    let assets_by_chunk_name = chunks
        .values()
        .map(|chunk| (chunk.name.clone(), ChunkAssets::from_files(chunk.files.clone())))
        .collect();

    Stats {
        assets,
        assets_by_chunk_name,
        chunks: chunks.into_values().collect(),
        modules,
        ..Default::default()
    }
}

/// SHA-256 over output names and contents, truncated to 20 hex digits
pub fn content_hash(outputs: &[PendingAsset]) -> String {
    let mut sorted: Vec<&PendingAsset> = outputs.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = Sha256::new();
    for output in sorted {
        hasher.update(output.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(&output.contents);
    }
    let digest = hex::encode(hasher.finalize());
    digest[..20].to_string()
}
