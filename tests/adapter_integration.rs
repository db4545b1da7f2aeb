// Integration tests for the bundler adapter
//
// These tests drive BundlerAdapter end to end with a scripted compiler and an
// in-memory host pipeline:
// - pass-through when entry or output filename is missing
// - asset manifest written into pipeline metadata
// - harvested assets persisted and merged, host files winning collisions
// - stats reporting, suppression on unchanged hash, and purge ordering
// - error propagation from the compiler and from persistence

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use sitepack::bundle::esbuild::content_hash;
use sitepack::bundle::{emit_assets, Compiler, CompilerHooks, MemoryFs, PendingAsset};
use sitepack::config::PackConfig;
use sitepack::stats::{AssetStats, ChunkAssets, Stats};
use sitepack::terminal::{Console, Recorder};
use sitepack::{
    BundlerAdapter, CompileError, FileSet, Metadata, PackError, Pipeline, PipelineError,
    PipelineFile, MANIFEST_KEY,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// What the scripted compiler emits on its next run
#[derive(Clone, Default)]
struct Plan {
    /// (chunk name, file name, contents)
    outputs: Vec<(String, String, Vec<u8>)>,
    fail: bool,
}

impl Plan {
    fn emit(mut self, chunk: &str, file: &str, contents: &str) -> Self {
        self.outputs
            .push((chunk.to_string(), file.to_string(), contents.as_bytes().to_vec()));
        self
    }
}

struct ScriptedCompiler {
    hooks: CompilerHooks,
    fs: MemoryFs,
    output_dir: PathBuf,
    plan: Arc<Mutex<Plan>>,
    log: Recorder,
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl Compiler for ScriptedCompiler {
    fn hooks_mut(&mut self) -> &mut CompilerHooks {
        &mut self.hooks
    }

    fn set_output_file_system(&mut self, fs: MemoryFs) {
        self.fs = fs;
    }

    async fn run(&mut self) -> Result<Stats, CompileError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.log.print("compiler: run");

        let plan = self.plan.lock().clone();
        if plan.fail {
            return Err(CompileError::BuildFailed("syntax error in src/index.js".into()));
        }

        let pending: Vec<PendingAsset> = plan
            .outputs
            .iter()
            .map(|(_, file, contents)| PendingAsset {
                name: file.clone(),
                contents: contents.clone(),
            })
            .collect();

        let mut by_chunk: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (chunk, file, _) in &plan.outputs {
            by_chunk.entry(chunk.clone()).or_default().push(file.clone());
        }

        let stats = Stats {
            hash: content_hash(&pending),
            assets: plan
                .outputs
                .iter()
                .map(|(chunk, file, contents)| AssetStats {
                    name: file.clone(),
                    size: contents.len() as u64,
                    emitted: false,
                    chunk_names: vec![chunk.clone()],
                })
                .collect(),
            assets_by_chunk_name: by_chunk
                .into_iter()
                .map(|(chunk, files)| (chunk, ChunkAssets::from_files(files)))
                .collect(),
            ..Default::default()
        };

        emit_assets(&self.hooks, &self.fs, &self.output_dir, stats, pending).await
    }

    fn purge_input_file_system(&mut self) {
        self.log.print("compiler: purge");
    }
}

/// Host pipeline keeping everything in memory
struct MemoryPipeline {
    metadata: Metadata,
    destination: PathBuf,
    writes: Mutex<Vec<FileSet>>,
    fail: bool,
}

impl MemoryPipeline {
    fn new(destination: &str) -> Arc<Self> {
        Arc::new(Self {
            metadata: Metadata::new(),
            destination: PathBuf::from(destination),
            writes: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    fn failing(destination: &str) -> Arc<Self> {
        Arc::new(Self {
            metadata: Metadata::new(),
            destination: PathBuf::from(destination),
            writes: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    fn write_count(&self) -> usize {
        self.writes.lock().len()
    }
}

#[async_trait]
impl Pipeline for MemoryPipeline {
    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn destination(&self) -> PathBuf {
        self.destination.clone()
    }

    async fn write(&self, files: &FileSet) -> Result<(), PipelineError> {
        self.writes.lock().push(files.clone());
        if self.fail {
            return Err(PipelineError::Write {
                path: self.destination.join("js/main.js"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        Ok(())
    }
}

/// Adapter wired to a scripted compiler, with handles to observe it
struct Harness {
    adapter: BundlerAdapter<ScriptedCompiler>,
    plan: Arc<Mutex<Plan>>,
    log: Recorder,
    runs: Arc<AtomicUsize>,
}

fn harness(config: PackConfig, plan: Plan) -> Harness {
    let plan = Arc::new(Mutex::new(plan));
    let log = Recorder::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let (compiler_plan, compiler_log, compiler_runs) = (plan.clone(), log.clone(), runs.clone());
    let adapter = BundlerAdapter::assemble(
        config,
        Path::new("/site"),
        Arc::new(log.clone()),
        move |config: &PackConfig| {
            Ok(ScriptedCompiler {
                hooks: CompilerHooks::default(),
                fs: MemoryFs::new(),
                output_dir: config.output_dir(),
                plan: compiler_plan,
                log: compiler_log,
                runs: compiler_runs,
            })
        },
    )
    .expect("adapter should assemble");

    Harness {
        adapter,
        plan,
        log,
        runs,
    }
}

fn config() -> PackConfig {
    PackConfig::from_toml_str(
        r#"
entry = "./src/index.js"

[output]
path = "build/js"
filename = "[name].js"

[stats]
colors = false
"#,
    )
    .unwrap()
}

fn host_files() -> FileSet {
    FileSet::from([(
        "index.html".to_string(),
        PipelineFile::new("<script src=\"/js/main.js\"></script>"),
    )])
}

/// Missing entry or output filename turns the adapter into a pass-through
///
/// The compiler is never constructed, so it can never run.
#[tokio::test]
async fn incomplete_config_passes_files_through() {
    let configs = [
        PackConfig::from_toml_str("[output]\nfilename = \"[name].js\"").unwrap(),
        PackConfig::from_toml_str("entry = \"./src/index.js\"").unwrap(),
    ];

    for config in configs {
        let log = Recorder::new();
        let mut adapter = BundlerAdapter::<ScriptedCompiler>::assemble(
            config,
            Path::new("/site"),
            Arc::new(log.clone()),
            |_| panic!("compiler must not be built for an incomplete config"),
        )
        .unwrap();
        assert!(!adapter.is_enabled());

        let pipeline = MemoryPipeline::new("/site/build");
        let files = adapter.process(host_files(), pipeline.clone()).await.unwrap();

        assert_eq!(files, host_files());
        assert_eq!(pipeline.write_count(), 0);
        assert!(pipeline.metadata.snapshot().is_empty());
        assert!(log.lines().is_empty());
    }
}

/// A single `main` chunk yields a one-entry manifest and a harvested file
#[tokio::test]
async fn single_chunk_populates_manifest_and_merges_asset() {
    let mut h = harness(config(), Plan::default().emit("main", "main.js", "console.log(1)"));
    let pipeline = MemoryPipeline::new("/site/build");

    let files = h.adapter.process(host_files(), pipeline.clone()).await.unwrap();

    assert_eq!(
        pipeline.metadata.get(MANIFEST_KEY),
        Some(json!({
            "assets": { "main.js": "main.js" },
            "assetsByType": { "js": ["main.js"] }
        }))
    );

    let asset = &files["js/main.js"];
    assert_eq!(asset.contents, b"console.log(1)");
    assert_eq!(
        asset.source_path.as_deref(),
        Some(Path::new("/site/build/js/main.js"))
    );
    assert!(files.contains_key("index.html"));

    assert_eq!(pipeline.write_count(), 1);
    assert!(pipeline.writes.lock()[0].contains_key("js/main.js"));

    let lines = h.log.lines();
    assert_eq!(lines[0], "\n[sitepack] starting");
    assert_eq!(h.log.matching("[sitepack] writing js/main.js").len(), 1);
}

/// Every file of a multi-file chunk gets its own manifest entry
#[tokio::test]
async fn multi_file_chunk_gets_entry_per_extension() {
    let plan = Plan::default()
        .emit("main", "main.js", "console.log(1)")
        .emit("main", "main.js.map", "{\"version\":3}");
    let mut h = harness(config(), plan);
    let pipeline = MemoryPipeline::new("/site/build");

    let files = h.adapter.process(FileSet::new(), pipeline.clone()).await.unwrap();

    let manifest = pipeline.metadata.get(MANIFEST_KEY).unwrap();
    assert_eq!(manifest["assets"]["main.js"], "main.js");
    assert_eq!(manifest["assets"]["main.map"], "main.js.map");
    assert_eq!(manifest["assetsByType"]["map"], json!(["main.js.map"]));
    assert!(files.contains_key("js/main.js.map"));
}

/// An unchanged hash suppresses the second report, but both runs merge
#[tokio::test]
async fn unchanged_hash_suppresses_repeat_report() {
    let mut h = harness(config(), Plan::default().emit("main", "main.js", "console.log(1)"));
    let pipeline = MemoryPipeline::new("/site/build");

    let first = h.adapter.process(FileSet::new(), pipeline.clone()).await.unwrap();
    let second = h.adapter.process(FileSet::new(), pipeline.clone()).await.unwrap();

    assert!(first.contains_key("js/main.js"));
    assert!(second.contains_key("js/main.js"));
    assert_eq!(h.runs.load(Ordering::SeqCst), 2);
    assert_eq!(h.log.matching("Hash:").len(), 1);

    *h.plan.lock() = Plan::default().emit("main", "main.js", "console.log(2)");
    h.adapter.process(FileSet::new(), pipeline.clone()).await.unwrap();
    assert_eq!(h.log.matching("Hash:").len(), 2);
}

/// The report is printed with every line tagged
#[tokio::test]
async fn report_lines_are_tagged() {
    let mut h = harness(config(), Plan::default().emit("main", "main.js", "console.log(1)"));
    let pipeline = MemoryPipeline::new("/site/build");

    h.adapter.process(FileSet::new(), pipeline).await.unwrap();

    let report = h.log.matching("Hash:").pop().unwrap();
    for line in report.lines().filter(|line| !line.is_empty()) {
        assert!(line.starts_with("[sitepack] "), "untagged line: {line:?}");
    }
    let hash = h.adapter.last_hash().unwrap();
    assert!(report.contains(&format!("[sitepack] Hash: {hash}\n")));
}

/// Host-provided files win over harvested assets of the same name
#[tokio::test]
async fn host_files_win_collisions() {
    let mut h = harness(config(), Plan::default().emit("main", "main.js", "bundled"));
    let pipeline = MemoryPipeline::new("/site/build");

    let mut files = host_files();
    files.insert("js/main.js".to_string(), PipelineFile::new("hand-written"));
    let merged = h.adapter.process(files, pipeline.clone()).await.unwrap();

    assert_eq!(merged["js/main.js"].contents, b"hand-written");
    // the harvested copy was still persisted
    assert_eq!(pipeline.writes.lock()[0]["js/main.js"].contents, b"bundled");
}

/// A persistence failure surfaces once, as the invocation's error
#[tokio::test]
async fn persistence_error_is_returned_once() {
    let mut h = harness(config(), Plan::default().emit("main", "main.js", "console.log(1)"));
    let pipeline = MemoryPipeline::failing("/site/build");

    let err = h
        .adapter
        .process(host_files(), pipeline.clone())
        .await
        .unwrap_err();

    let persist = err.as_persist().expect("persistence error expected");
    assert!(matches!(persist, PipelineError::Write { .. }));
    assert_eq!(pipeline.write_count(), 1);
    assert_eq!(h.log.matching("writing js/main.js").len(), 1);
    assert!(h.log.matching("Hash:").is_empty());
}

/// A failed run returns the compiler error and merges nothing
#[tokio::test]
async fn compiler_failure_propagates() {
    let mut h = harness(config(), Plan { fail: true, ..Default::default() });
    let pipeline = MemoryPipeline::new("/site/build");

    let err = h.adapter.process(host_files(), pipeline.clone()).await.unwrap_err();

    assert!(matches!(err, PackError::Compile(CompileError::BuildFailed(_))));
    assert_eq!(pipeline.write_count(), 0);
    assert!(pipeline.metadata.get(MANIFEST_KEY).is_none());
    assert_eq!(h.log.matching("compiler: purge").len(), 1);
}

/// Input state is purged after the run and before any stats output
#[tokio::test]
async fn purge_precedes_stats_output() {
    let mut h = harness(config(), Plan::default().emit("main", "main.js", "console.log(1)"));
    let pipeline = MemoryPipeline::new("/site/build");

    h.adapter.process(FileSet::new(), pipeline).await.unwrap();

    let lines = h.log.lines();
    let position = |needle: &str| lines.iter().position(|line| line.contains(needle)).unwrap();
    assert!(position("compiler: run") < position("compiler: purge"));
    assert!(position("compiler: purge") < position("Hash:"));
}

/// Harvested files from an earlier invocation do not leak into the next
#[tokio::test]
async fn harvested_set_resets_between_invocations() {
    let plan = Plan::default()
        .emit("main", "main.js", "console.log(1)")
        .emit("admin", "admin.js", "console.log('admin')");
    let mut h = harness(config(), plan);
    let pipeline = MemoryPipeline::new("/site/build");

    let first = h.adapter.process(FileSet::new(), pipeline.clone()).await.unwrap();
    assert!(first.contains_key("js/admin.js"));

    *h.plan.lock() = Plan::default().emit("main", "main.js", "console.log(1)");
    let second = h.adapter.process(FileSet::new(), pipeline.clone()).await.unwrap();

    assert!(!second.contains_key("js/admin.js"));
    assert!(!pipeline.writes.lock()[1].contains_key("js/admin.js"));

    let manifest = pipeline.metadata.get(MANIFEST_KEY).unwrap();
    assert!(manifest["assets"].get("admin.js").is_none());
}

/// JSON stats are printed on every run, regardless of the hash
#[tokio::test]
async fn json_stats_print_every_run() {
    let mut config = config();
    config.stats = PackConfig::from_toml_str("[stats]\njson = true\ncolors = false")
        .unwrap()
        .stats;
    let mut h = harness(config, Plan::default().emit("main", "main.js", "console.log(1)"));
    let pipeline = MemoryPipeline::new("/site/build");

    h.adapter.process(FileSet::new(), pipeline.clone()).await.unwrap();
    h.adapter.process(FileSet::new(), pipeline).await.unwrap();

    let dumps: Vec<serde_json::Value> = h
        .log
        .lines()
        .iter()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .filter(|value| value.is_object())
        .collect();
    assert_eq!(dumps.len(), 2);
    assert_eq!(dumps[0]["assetsByChunkName"]["main"], "main.js");
    assert!(h.log.matching("Hash:").is_empty());
    assert!(!h.adapter.stats_options().cached);
}

/// Output of earlier runs does not pile up in the output filesystem
#[tokio::test]
async fn output_file_system_holds_only_the_latest_run() {
    let mut h = harness(config(), Plan::default());
    let pipeline = MemoryPipeline::new("/site/build");

    for n in 0..50 {
        let name = format!("main-{n}.js");
        *h.plan.lock() = Plan::default().emit("main", &name, &format!("console.log({n})"));

        let files = h.adapter.process(FileSet::new(), pipeline.clone()).await.unwrap();

        assert_eq!(files.len(), 1);
        assert!(files.contains_key(&format!("js/{name}")));
        assert_eq!(h.adapter.output_file_system().len(), 1);
    }
}
