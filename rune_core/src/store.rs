//! Blob storage behind a registry: one UTF-8 string per storage key.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o failed at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("stored blob at {path:?} is not UTF-8")]
    NotUtf8 { path: PathBuf },
    #[error("storage lock poisoned")]
    Poisoned,
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait SnapshotStore {
    /// `Ok(None)` when nothing was ever stored under `key`.
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn save(&self, key: &str, blob: &str) -> Result<(), StoreError>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for &T {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        (**self).save(key, blob)
    }
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        (**self).save(key, blob)
    }
}

/// Process-local store. Clones share the same blobs, which is how tests
/// stand up several sessions against one store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.blobs.lock().ok()?.get(key).cloned()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let blobs = self.blobs.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(blobs.get(key).cloned())
    }

    fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().map_err(|_| StoreError::Poisoned)?;
        blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per storage key under a root directory. Writes go
/// through a temp file and a rename so readers never see a torn blob.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_stem: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file_stem}.json"))
    }
}

impl SnapshotStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| StoreError::NotUtf8 { path })
    }

    fn save(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, blob).map_err(|source| StoreError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StoreError::Io { path, source })
    }
}
