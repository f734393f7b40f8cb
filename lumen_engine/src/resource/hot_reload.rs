//! Filesystem watch for shader hot-reload
//!
//! `notify` delivers events on its own thread; the watcher callback only
//! forwards changed paths over a channel. The resource manager drains the
//! channel on the rendering thread and does all rebuilding there.
//!
//! Watches are placed on the directory holding each source rather than on
//! the file. Editors that save by renaming a temporary file over the source
//! replace its inode, which would silently end a per-file watch. Events for
//! unrelated files in the same directory are forwarded too; the receiver
//! filters them against its own table of watched paths.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::{engine_debug, engine_warn};

/// Watches the directories of shader sources and forwards changed paths
pub struct ShaderWatcher {
    watcher: RecommendedWatcher,
    /// Watched directory -> number of sources inside it
    directories: FxHashMap<PathBuf, usize>,
}

impl ShaderWatcher {
    /// Start a watcher sending changed paths to `sender`
    pub fn new(sender: mpsc::Sender<PathBuf>) -> Result<Self> {
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    for path in event.paths {
                        let _ = sender.send(path);
                    }
                }
            }
            Err(e) => engine_warn!("lumen::hot_reload", "Watch error: {}", e),
        })
        .map_err(|e| Error::InitializationFailed(format!("Failed to start file watcher: {}", e)))?;

        Ok(Self { watcher, directories: FxHashMap::default() })
    }

    fn directory_of(path: &Path) -> PathBuf {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Start watching one source file
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        let dir = Self::directory_of(path);
        if let Some(count) = self.directories.get_mut(&dir) {
            *count += 1;
            return Ok(());
        }

        self.watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::ResourceNotFound(format!("Cannot watch {}: {}", path.display(), e)))?;
        self.directories.insert(dir.clone(), 1);
        engine_debug!("lumen::hot_reload", "Watching {} for {}", dir.display(), path.display());
        Ok(())
    }

    /// Stop watching one source file
    ///
    /// The directory watch ends with the last source inside it.
    pub fn unwatch(&mut self, path: &Path) {
        let dir = Self::directory_of(path);
        let Some(count) = self.directories.get_mut(&dir) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }

        self.directories.remove(&dir);
        if let Err(e) = self.watcher.unwatch(&dir) {
            engine_debug!("lumen::hot_reload", "Unwatch of {} ignored: {}", dir.display(), e);
        }
    }

    /// Number of directories currently watched
    pub fn watched_directories(&self) -> usize {
        self.directories.len()
    }
}

#[cfg(test)]
#[path = "hot_reload_tests.rs"]
mod tests;
