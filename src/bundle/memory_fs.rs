// In-memory output filesystem handed to the compiler

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output filesystem that keeps emitted files in memory, addressed by absolute path
///
/// Clones share the same storage, so the adapter can read back what the
/// compiler wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: Arc<RwLock<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `contents` at `path`, replacing any previous file
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for relative paths.
    pub fn write_file(&self, path: &Path, contents: Vec<u8>) -> io::Result<()> {
        if !path.is_absolute() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("memory fs paths must be absolute: {}", path.display()),
            ));
        }
        self.files.write().insert(path.to_path_buf(), contents);
        Ok(())
    }

    /// Bytes stored at `path`
    pub fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files.read().get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file in memory fs: {}", path.display()),
            )
        })
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    /// Paths of every stored file, sorted
    pub fn files(&self) -> Vec<PathBuf> {
        self.files.read().keys().cloned().collect()
    }

    /// Drop every stored file
    pub fn clear(&self) {
        self.files.write().clear();
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}
