// Bundler adapter - runs the compiler once per pipeline pass and merges its assets

use crate::bundle::{Compilation, Compiler, CompilerHook, EsbuildCompiler, MemoryFs};
use crate::config::PackConfig;
use crate::error::{CompileError, HookError, PackError};
use crate::manifest::{AssetManifest, MANIFEST_KEY};
use crate::paths;
use crate::pipeline::{FileSet, Pipeline, PipelineFile};
use crate::stats::{self, Stats, StatsOptions};
use crate::terminal::{self, Console, Stdout};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name the adapter's hooks are tapped under
pub const PLUGIN_NAME: &str = "sitepack";

/// Adapter driving the esbuild compiler
pub type EsbuildAdapter = BundlerAdapter<EsbuildCompiler>;

/// State shared between the adapter and its hooks for one invocation
#[derive(Default)]
struct BuildState {
    /// Files read back from the output filesystem, keyed relative to the destination
    harvested: FileSet,

    /// Pipeline of the invocation in progress
    pipeline: Option<Arc<dyn Pipeline>>,
}

/// Integration between a host pipeline and a bundler
///
/// Built once; `process` is called once per pipeline pass. The compiler and
/// its in-memory output filesystem live as long as the adapter.
pub struct BundlerAdapter<C: Compiler> {
    config: PackConfig,
    cwd: PathBuf,
    stats_options: StatsOptions,
    /// `None` when the configuration lacks an entry or output filename
    compiler: Option<C>,
    output_fs: MemoryFs,
    state: Arc<Mutex<BuildState>>,
    console: Arc<dyn Console>,
    last_hash: Option<String>,
}

impl BundlerAdapter<EsbuildCompiler> {
    /// Create an adapter that bundles with the esbuild found in PATH
    pub fn new(config: PackConfig) -> Result<Self, PackError> {
        Self::with_compiler(config, EsbuildCompiler::new)
    }
}

impl<C: Compiler> BundlerAdapter<C> {
    /// Create an adapter around the compiler `build` returns
    ///
    /// Paths resolve against the current directory and output goes to stdout.
    pub fn with_compiler<F>(config: PackConfig, build: F) -> Result<Self, PackError>
    where
        F: FnOnce(&PackConfig) -> Result<C, CompileError>,
    {
        let cwd = std::env::current_dir()?;
        Self::assemble(config, &cwd, Arc::new(Stdout), build)
    }

    /// Create an adapter with an explicit working directory and console
    ///
    /// An incomplete configuration yields a pass-through adapter and `build`
    /// is never called.
    pub fn assemble<F>(
        config: PackConfig,
        cwd: &Path,
        console: Arc<dyn Console>,
        build: F,
    ) -> Result<Self, PackError>
    where
        F: FnOnce(&PackConfig) -> Result<C, CompileError>,
    {
        let config = config.normalize(cwd);
        let stats_options = StatsOptions::resolve(config.stats.as_ref(), terminal::supports_color());
        let state = Arc::new(Mutex::new(BuildState::default()));
        let output_fs = MemoryFs::new();

        let compiler = if config.is_complete() {
            let mut compiler = build(&config)?;
            compiler.set_output_file_system(output_fs.clone());

            let hooks = compiler.hooks_mut();
            hooks.emit.tap(
                PLUGIN_NAME,
                Arc::new(ManifestHook {
                    state: state.clone(),
                }),
            );
            hooks.after_emit.tap(
                PLUGIN_NAME,
                Arc::new(HarvestHook {
                    state: state.clone(),
                    fs: output_fs.clone(),
                    console: console.clone(),
                    colors: stats_options.colors,
                }),
            );
            Some(compiler)
        } else {
            tracing::debug!("No entry or output filename configured, passing files through");
            None
        };

        Ok(Self {
            config,
            cwd: cwd.to_path_buf(),
            stats_options,
            compiler,
            output_fs,
            state,
            console,
            last_hash: None,
        })
    }

    /// Whether invocations run the bundler
    pub fn is_enabled(&self) -> bool {
        self.compiler.is_some()
    }

    /// Effective stats options
    pub fn stats_options(&self) -> &StatsOptions {
        &self.stats_options
    }

    /// The compiler's in-memory output filesystem
    pub fn output_file_system(&self) -> &MemoryFs {
        &self.output_fs
    }

    /// Hash of the last build whose report was printed
    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Run the bundler once and merge its assets into `files`
    ///
    /// Files already in `files` win over harvested assets of the same name.
    /// A pass-through adapter returns `files` untouched.
    ///
    /// # Errors
    ///
    /// Returns the compiler's error when the run fails, including a failed
    /// write of the harvested assets. Nothing is merged in that case.
    pub async fn process(
        &mut self,
        files: FileSet,
        pipeline: Arc<dyn Pipeline>,
    ) -> Result<FileSet, PackError> {
        let Some(compiler) = self.compiler.as_mut() else {
            return Ok(files);
        };

        {
            let mut state = self.state.lock();
            state.harvested.clear();
            state.pipeline = Some(pipeline);
        }
        // assets of earlier runs are never read again
        self.output_fs.clear();
        self.config = std::mem::take(&mut self.config).normalize(&self.cwd);
        self.console.print(&terminal::banner(self.stats_options.colors));

        let run = compiler.run().await;
        compiler.purge_input_file_system();

        let harvested = {
            let mut state = self.state.lock();
            state.pipeline = None;
            std::mem::take(&mut state.harvested)
        };
        let stats = run?;
        self.report(&stats);

        let mut merged = harvested;
        merged.extend(files);
        Ok(merged)
    }

    fn report(&mut self, stats: &Stats) {
        let options = &self.stats_options;

        if options.json {
            self.console.print("");
            match serde_json::to_string_pretty(&stats.to_json(options)) {
                Ok(json) => self.console.print(&json),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize stats"),
            }
            self.console.print("");
        } else if options.enabled && self.last_hash.as_deref() != Some(stats.hash.as_str()) {
            self.last_hash = Some(stats.hash.clone());
            let report = stats::render(stats, options);
            self.console.print(&terminal::prefix_lines(&report, options.colors));
            self.console.print("");
        } else {
            tracing::debug!(hash = %stats.hash, "Build unchanged, report suppressed");
        }
    }
}

/// Writes the asset manifest into the pipeline metadata before assets are emitted
struct ManifestHook {
    state: Arc<Mutex<BuildState>>,
}

#[async_trait]
impl CompilerHook for ManifestHook {
    async fn call(&self, compilation: &Compilation) -> Result<(), HookError> {
        let Some(pipeline) = self.state.lock().pipeline.clone() else {
            tracing::warn!("Compiler emitted outside of an invocation, manifest not written");
            return Ok(());
        };

        let manifest = AssetManifest::from_chunks(&compilation.stats.assets_by_chunk_name);
        match serde_json::to_value(&manifest) {
            Ok(value) => {
                pipeline.metadata().insert(MANIFEST_KEY, value);
                tracing::debug!(assets = manifest.len(), "Asset manifest updated");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize asset manifest"),
        }
        Ok(())
    }
}

/// Copies emitted assets out of the output filesystem and persists them through the pipeline
struct HarvestHook {
    state: Arc<Mutex<BuildState>>,
    fs: MemoryFs,
    console: Arc<dyn Console>,
    colors: bool,
}

#[async_trait]
impl CompilerHook for HarvestHook {
    async fn call(&self, compilation: &Compilation) -> Result<(), HookError> {
        let (pipeline, files) = {
            let mut state = self.state.lock();
            let pipeline = state.pipeline.clone().ok_or(HookError::Inactive)?;
            let destination = pipeline.destination();

            for asset in compilation.assets.values().filter(|asset| asset.emitted) {
                let contents = self
                    .fs
                    .read_file(&asset.existing_at)
                    .map_err(|_| HookError::MissingOutput(asset.existing_at.clone()))?;
                let name = paths::file_key(&destination, &asset.existing_at);
                state.harvested.insert(
                    name,
                    PipelineFile::with_source(contents, asset.existing_at.clone()),
                );
            }
            (pipeline, state.harvested.clone())
        };

        let written = pipeline.write(&files).await;

        self.console.print("");
        for name in files.keys() {
            self.console.print(&terminal::writing(name, self.colors));
        }
        written.map_err(HookError::Persist)
    }
}
