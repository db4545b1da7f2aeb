// Directory-backed host pipeline

use super::{FileSet, Metadata, Pipeline, PipelineFile};
use crate::error::PipelineError;
use crate::paths;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use sugar_path::SugarPath;

/// Minimal static-site host: reads a source tree, writes a destination tree
pub struct DirectoryPipeline {
    source: PathBuf,
    destination: PathBuf,
    metadata: Metadata,
}

impl DirectoryPipeline {
    /// Create a pipeline over two directories, resolved against `cwd`
    pub fn new(cwd: &Path, source: &Path, destination: &Path) -> Self {
        Self {
            source: source.absolutize_with(cwd),
            destination: destination.absolutize_with(cwd),
            metadata: Metadata::new(),
        }
    }

    /// Absolute source directory
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Read every file under the source directory
    ///
    /// A missing source directory yields an empty set.
    pub async fn read(&self) -> Result<FileSet, PipelineError> {
        let pattern = self.source.join("**").join("*");
        let pattern = pattern.to_string_lossy();
        let entries =
            glob::glob(&pattern).map_err(|e| PipelineError::Pattern(e.to_string()))?;

        let mut files = FileSet::new();
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable source entry");
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }

            let contents = tokio::fs::read(&path)
                .await
                .map_err(|source| PipelineError::Read {
                    path: path.clone(),
                    source,
                })?;
            let name = paths::file_key(&self.source, &path);
            files.insert(name, PipelineFile::with_source(contents, path));
        }

        tracing::debug!(count = files.len(), source = %self.source.display(), "Read source tree");
        Ok(files)
    }
}

#[async_trait]
impl Pipeline for DirectoryPipeline {
    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn destination(&self) -> PathBuf {
        self.destination.clone()
    }

    async fn write(&self, files: &FileSet) -> Result<(), PipelineError> {
        for (name, file) in files {
            let target = Path::new(name).absolutize_with(self.destination.as_path());
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| PipelineError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
            tokio::fs::write(&target, &file.contents)
                .await
                .map_err(|source| PipelineError::Write {
                    path: target.clone(),
                    source,
                })?;
        }

        tracing::debug!(count = files.len(), destination = %self.destination.display(), "Wrote file set");
        Ok(())
    }
}
