//! # Durable mode storage.
//!
//! The supervisor remembers a single fact across process deaths: whether the last
//! activation was Persistent. It is read at boot, on every wake and on every
//! teardown, written on every activation and cleared by cancel.
//!
//! - [`MemoryStore`]: process-local, for tests and embedders with their own persistence.
//! - [`FileStore`]: a small JSON document (`{"persistent": true}`) on disk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Durable key-value storage for the last requested mode.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// Whether the last activation was Persistent (`false` if never written).
    async fn load_persistent(&self) -> Result<bool, StoreError>;

    /// Records the mode of the latest activation.
    async fn save_persistent(&self, persistent: bool) -> Result<(), StoreError>;
}

/// In-memory [`StateStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    persistent: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with `persistent`, as if written by a previous process.
    pub fn seeded(persistent: bool) -> Self {
        Self {
            persistent: AtomicBool::new(persistent),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_persistent(&self) -> Result<bool, StoreError> {
        Ok(self.persistent.load(Ordering::SeqCst))
    }

    async fn save_persistent(&self, persistent: bool) -> Result<(), StoreError> {
        self.persistent.store(persistent, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    persistent: bool,
}

/// JSON-file backed [`StateStore`].
///
/// A missing file reads as `false`. Writes go to a sibling temp file first and
/// are renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a store at `path`; the file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn load_persistent(&self) -> Result<bool, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let doc: Document = serde_json::from_slice(&bytes)?;
        Ok(doc.persistent)
    }

    async fn save_persistent(&self, persistent: bool) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(&Document { persistent })?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_defaults_to_one_time() {
        let store = MemoryStore::new();
        assert!(!store.load_persistent().await.unwrap());
        store.save_persistent(true).await.unwrap();
        assert!(store.load_persistent().await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_missing_file_reads_false() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));
        assert!(!store.load_persistent().await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        FileStore::new(&path).save_persistent(true).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"{"persistent":true}"#);

        let reopened = FileStore::new(&path);
        assert!(reopened.load_persistent().await.unwrap());
        reopened.save_persistent(false).await.unwrap();
        assert!(!FileStore::new(&path).load_persistent().await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = FileStore::new(&path).load_persistent().await.unwrap_err();
        assert_eq!(err.as_label(), "store_codec");
    }
}
