//! Filesystem collaborator
//!
//! The resource manager never touches `std::fs` directly; it reads asset
//! bytes and resolves canonical paths through an [`AssetSource`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::error::{Error, Result};

/// Source of asset bytes
pub trait AssetSource: Send + Sync {
    /// Read the whole file
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Canonical form of a path, used as the memoization key
    ///
    /// Fails with `Error::ResourceNotFound` when the path does not exist.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
}

impl<S: AssetSource + ?Sized> AssetSource for Arc<S> {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        (**self).read(path)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        (**self).canonicalize(path)
    }
}

/// Assets read from the local filesystem
#[derive(Debug, Default, Clone)]
pub struct FsAssetSource {
    root: Option<PathBuf>,
}

impl FsAssetSource {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Resolve relative paths against `root` instead of the working directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl AssetSource for FsAssetSource {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.resolve(path))?)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        std::fs::canonicalize(self.resolve(path))
            .map_err(|e| Error::ResourceNotFound(format!("{}: {}", path.display(), e)))
    }
}

/// In-memory asset source that counts reads
#[cfg(test)]
#[derive(Default)]
pub struct MemoryAssetSource {
    files: std::sync::Mutex<rustc_hash::FxHashMap<PathBuf, Vec<u8>>>,
    reads: std::sync::Mutex<rustc_hash::FxHashMap<PathBuf, usize>>,
}

#[cfg(test)]
impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.lock().unwrap().insert(path.into(), bytes.into());
    }

    pub fn remove(&self, path: &Path) {
        self.files.lock().unwrap().remove(path);
    }

    /// Number of reads of a path
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        self.reads.lock().unwrap().get(path.as_ref()).copied().unwrap_or(0)
    }
}

#[cfg(test)]
impl AssetSource for MemoryAssetSource {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = self.canonicalize(path)?;
        *self.reads.lock().unwrap().entry(path.clone()).or_insert(0) += 1;
        self.files
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .ok_or_else(|| Error::Io(format!("{} not found", path.display())))
    }

    /// Lexical normalization of `.` and `..` components
    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        use std::path::Component;
        let mut out = PathBuf::from("/");
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    out.pop();
                }
                Component::Normal(part) => out.push(part),
                _ => {}
            }
        }
        if self.files.lock().unwrap().contains_key(&out) {
            Ok(out)
        } else {
            Err(Error::ResourceNotFound(path.display().to_string()))
        }
    }
}
