// CLI commands for building a site with bundled assets

use crate::adapter::EsbuildAdapter;
use crate::config::PackConfig;
use crate::manifest::AssetManifest;
use crate::pipeline::{DirectoryPipeline, Pipeline};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

/// Bundle site assets into a static-site build
#[derive(Parser, Debug)]
#[command(name = "sitepack", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// sitepack subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy the source tree into the destination, bundling configured entries on the way
    Build {
        /// Configuration file
        #[arg(short, long, default_value = "sitepack.toml")]
        config: PathBuf,

        /// Source directory of the site
        #[arg(short, long, default_value = "src")]
        source: PathBuf,

        /// Destination directory of the build
        #[arg(short, long, default_value = "build")]
        destination: PathBuf,

        /// Print the asset manifest as JSON after building
        #[arg(long)]
        print_manifest: bool,
    },
}

impl Commands {
    /// Execute the command
    pub async fn run(self) -> Result<()> {
        match self {
            Commands::Build {
                config,
                source,
                destination,
                print_manifest,
            } => Self::build_cmd(config, source, destination, print_manifest).await,
        }
    }

    async fn build_cmd(
        config: PathBuf,
        source: PathBuf,
        destination: PathBuf,
        print_manifest: bool,
    ) -> Result<()> {
        let cwd = std::env::current_dir().context("Failed to read working directory")?;

        let config_path = cwd.join(&config);
        let pack = if config_path.exists() {
            PackConfig::from_file(&config_path)?
        } else {
            tracing::info!(
                config = %config_path.display(),
                "No configuration file, copying sources without bundling"
            );
            PackConfig::default()
        };

        let pipeline = Arc::new(DirectoryPipeline::new(&cwd, &source, &destination));
        let files = pipeline
            .read()
            .await
            .with_context(|| format!("Failed to read {}", pipeline.source().display()))?;

        let mut adapter = EsbuildAdapter::new(pack)?;
        let files = adapter.process(files, pipeline.clone()).await?;
        pipeline.write(&files).await?;

        println!(
            "✓ Built {} file(s) into {}",
            files.len(),
            pipeline.destination().display()
        );

        if print_manifest {
            match AssetManifest::from_metadata(&pipeline.metadata()) {
                Some(manifest) => println!("{}", serde_json::to_string_pretty(&manifest)?),
                None => println!("No assets were bundled."),
            }
        }

        Ok(())
    }
}
