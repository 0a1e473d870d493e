//! Document storage for the coordination store
//!
//! All shared state lives as JSON documents under one store directory
//! (default `.swarm/`). Writes are atomic (temp file + rename), so a
//! document is always either the old version or the new one. Every
//! read-modify-write sequence must serialize across agent processes
//! through [`Store::lock_exclusive`], an advisory lock on the store's
//! sentinel file. The guard is not reentrant: never call another
//! guard-acquiring operation while holding one.

use crate::error::{CoordError, CoordResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Default store directory name under the project root
pub const STORE_DIR_NAME: &str = ".swarm";

const LOCKS_FILE: &str = "locks.json";
const REGISTRY_FILE: &str = "registry.json";
const QUEUE_FILE: &str = "queue.json";
const ANALYSIS_FILE: &str = "analysis.json";
const ARCHIVE_FILE: &str = "archive.json";
const CONFIG_FILE: &str = "config.yaml";
const SENTINEL_FILE: &str = ".store.lock";

/// Handle to one coordination store directory
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store directory for a project root, using the default name
    pub fn for_project(project_path: &Path) -> Self {
        Self::new(project_path.join(STORE_DIR_NAME))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn locks_path(&self) -> PathBuf {
        self.root.join(LOCKS_FILE)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn queue_path(&self) -> PathBuf {
        self.root.join(QUEUE_FILE)
    }

    pub fn analysis_path(&self) -> PathBuf {
        self.root.join(ANALYSIS_FILE)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root.join(ARCHIVE_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Acquire the store-wide exclusive lock, creating the store directory
    /// and sentinel file if needed. Blocks until the lock is granted.
    /// Released when the guard drops.
    pub fn lock_exclusive(&self) -> CoordResult<StoreGuard> {
        ensure_dir(&self.root)?;
        let sentinel = self.root.join(SENTINEL_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&sentinel)
            .map_err(|e| CoordError::Store(format!("Failed to open {:?}: {}", sentinel, e)))?;
        file.lock_exclusive()
            .map_err(|e| CoordError::Store(format!("Failed to lock store: {}", e)))?;
        Ok(StoreGuard { file })
    }

    /// Read a JSON document, falling back to `T::default()` when the file
    /// does not exist yet
    pub fn read_document<T>(&self, path: &Path) -> CoordResult<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if !path.exists() {
            return Ok(T::default());
        }
        read_json(path)
    }

    /// Serialize a document to pretty JSON and atomically replace the file
    pub fn write_document<T: serde::Serialize>(&self, path: &Path, value: &T) -> CoordResult<()> {
        ensure_dir(&self.root)?;
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| CoordError::Store(format!("Failed to serialize {:?}: {}", path, e)))?;
        atomic_write(path, &content)
    }
}

/// Guard over the store-wide exclusive lock
pub struct StoreGuard {
    file: File,
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            log::warn!("[Store] Failed to unlock store sentinel: {}", e);
        }
    }
}

/// Create a directory (and parents) if it does not exist
pub fn ensure_dir(path: &Path) -> CoordResult<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(|e| CoordError::Store(format!("Failed to create {:?}: {}", path, e)))?;
    }
    Ok(())
}

/// Read and deserialize a JSON file
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CoordResult<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| CoordError::Store(format!("Failed to read {:?}: {}", path, e)))?;
    serde_json::from_str(&content)
        .map_err(|e| CoordError::Store(format!("Failed to parse {:?}: {}", path, e)))
}

/// Write content to a temp file next to the target, then rename over it.
/// The rename is atomic on the same filesystem, so readers never observe
/// a half-written document.
pub fn atomic_write(path: &Path, content: &str) -> CoordResult<()> {
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content)
        .map_err(|e| CoordError::Store(format!("Failed to write {:?}: {}", tmp_path, e)))?;
    fs::rename(&tmp_path, path)
        .map_err(|e| CoordError::Store(format!("Failed to rename {:?} -> {:?}: {}", tmp_path, path, e)))
}
