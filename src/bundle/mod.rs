// Bundler capability - compiler trait, hooks, and the in-memory output filesystem

pub mod esbuild;
pub mod memory_fs;

pub use esbuild::{EsbuildCompiler, EsbuildConfig};
pub use memory_fs::MemoryFs;

use crate::error::{CompileError, HookError};
use crate::stats::Stats;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sugar_path::SugarPath;

/// One output asset as seen by hooks
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledAsset {
    /// Absolute path in the output filesystem
    pub existing_at: PathBuf,

    /// Whether this run wrote the asset to the output filesystem
    pub emitted: bool,

    pub size: u64,
}

/// State of a run handed to hooks
#[derive(Debug, Clone, Default)]
pub struct Compilation {
    pub stats: Stats,

    /// Output name (relative to the output directory) -> asset
    pub assets: BTreeMap<String, CompiledAsset>,
}

/// Output produced by the bundler, not yet in the output filesystem
#[derive(Debug, Clone)]
pub struct PendingAsset {
    /// Name relative to the output directory
    pub name: String,
    pub contents: Vec<u8>,
}

/// A handler tapped into a compiler hook
///
/// Returning `Ok` continues the run; an error stops it.
#[async_trait]
pub trait CompilerHook: Send + Sync {
    async fn call(&self, compilation: &Compilation) -> Result<(), HookError>;
}

/// Ordered list of named taps on one hook
#[derive(Clone, Default)]
pub struct HookSeries {
    taps: Vec<(String, Arc<dyn CompilerHook>)>,
}

impl HookSeries {
    /// Register `hook` under `name`; taps run in registration order
    pub fn tap(&mut self, name: impl Into<String>, hook: Arc<dyn CompilerHook>) {
        self.taps.push((name.into(), hook));
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Run every tap in order, stopping at the first error
    pub async fn call(&self, compilation: &Compilation) -> Result<(), CompileError> {
        for (name, hook) in &self.taps {
            tracing::debug!(plugin = %name, "Running compiler hook");
            hook.call(compilation)
                .await
                .map_err(|source| CompileError::Hook {
                    plugin: name.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// Hooks a compiler exposes
#[derive(Clone, Default)]
pub struct CompilerHooks {
    /// Before assets are written to the output filesystem
    pub emit: HookSeries,

    /// After assets are written to the output filesystem
    pub after_emit: HookSeries,
}

/// A bundler instance, long-lived and reused across runs
#[async_trait]
pub trait Compiler: Send {
    fn hooks_mut(&mut self) -> &mut CompilerHooks;

    /// Replace the filesystem emitted assets are written to
    fn set_output_file_system(&mut self, fs: MemoryFs);

    /// Build once, running `emit` then `after_emit`
    async fn run(&mut self) -> Result<Stats, CompileError>;

    /// Discard cached input state so the next run reads sources afresh
    fn purge_input_file_system(&mut self);
}

/// Seal a run: `emit` hooks, write to `fs`, `after_emit` hooks
///
/// Every compiler finishes its run through here, so `emit` always precedes
/// `after_emit` and each fires once.
pub async fn emit_assets(
    hooks: &CompilerHooks,
    fs: &MemoryFs,
    output_dir: &Path,
    stats: Stats,
    pending: Vec<PendingAsset>,
) -> Result<Stats, CompileError> {
    let assets = pending
        .iter()
        .map(|asset| {
            (
                asset.name.clone(),
                CompiledAsset {
                    existing_at: Path::new(&asset.name).absolutize_with(output_dir),
                    emitted: false,
                    size: asset.contents.len() as u64,
                },
            )
        })
        .collect();
    let mut compilation = Compilation { stats, assets };

    hooks.emit.call(&compilation).await?;

    for asset in pending {
        if let Some(compiled) = compilation.assets.get_mut(&asset.name) {
            fs.write_file(&compiled.existing_at, asset.contents)?;
            compiled.emitted = true;
        }
    }
    for asset in &mut compilation.stats.assets {
        if let Some(compiled) = compilation.assets.get(&asset.name) {
            asset.emitted = compiled.emitted;
        }
    }

    hooks.after_emit.call(&compilation).await?;

    Ok(compilation.stats)
}
