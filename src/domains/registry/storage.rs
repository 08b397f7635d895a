//! Persistence backends for the local registry.
//!
//! The sync and merge logic only sees the [`RegistryStorage`] trait. The file
//! backend stores the document as pretty JSON and the metadata in a sibling
//! `*.meta.json` file; the memory backend keeps both in process.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

use super::model::{RegistryDocument, RegistryMetadata};

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Load/save interface for a registry document and its metadata.
pub trait RegistryStorage: Send + Sync {
    /// Load the document; `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<RegistryDocument>, StorageError>;

    fn save(&self, document: &RegistryDocument) -> Result<(), StorageError>;

    fn load_metadata(&self) -> Result<Option<RegistryMetadata>, StorageError> {
        Ok(None)
    }

    fn save_metadata(&self, _metadata: &RegistryMetadata) -> Result<(), StorageError> {
        Ok(())
    }
}

/// JSON file storage.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the metadata file stored next to the document.
    pub fn metadata_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "registry".to_string());
        self.path.with_file_name(format!("{stem}.meta.json"))
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StorageError::Json {
                path: path.to_path_buf(),
                source: e,
            })
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let body = serde_json::to_string_pretty(value).map_err(|e| StorageError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;

        fs::write(path, body).map_err(|e| StorageError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl RegistryStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<RegistryDocument>, StorageError> {
        Self::read_json(&self.path)
    }

    fn save(&self, document: &RegistryDocument) -> Result<(), StorageError> {
        Self::write_json(&self.path, document)
    }

    fn load_metadata(&self) -> Result<Option<RegistryMetadata>, StorageError> {
        Self::read_json(&self.metadata_path())
    }

    fn save_metadata(&self, metadata: &RegistryMetadata) -> Result<(), StorageError> {
        Self::write_json(&self.metadata_path(), metadata)
    }
}

/// In-memory storage, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    document: Mutex<Option<RegistryDocument>>,
    metadata: Mutex<Option<RegistryMetadata>>,
    saves: Mutex<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with a document.
    pub fn with_document(document: RegistryDocument) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            ..Self::default()
        }
    }

    /// Number of successful document saves.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }

    /// The last saved document, if any.
    pub fn snapshot(&self) -> Option<RegistryDocument> {
        self.document.lock().ok().and_then(|d| d.clone())
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("memory storage lock poisoned".to_string())
}

impl RegistryStorage for MemoryStorage {
    fn load(&self) -> Result<Option<RegistryDocument>, StorageError> {
        Ok(self.document.lock().map_err(|_| poisoned())?.clone())
    }

    fn save(&self, document: &RegistryDocument) -> Result<(), StorageError> {
        *self.document.lock().map_err(|_| poisoned())? = Some(document.clone());
        *self.saves.lock().map_err(|_| poisoned())? += 1;
        Ok(())
    }

    fn load_metadata(&self) -> Result<Option<RegistryMetadata>, StorageError> {
        Ok(self.metadata.lock().map_err(|_| poisoned())?.clone())
    }

    fn save_metadata(&self, metadata: &RegistryMetadata) -> Result<(), StorageError> {
        *self.metadata.lock().map_err(|_| poisoned())? = Some(metadata.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::registry::model::VersionRecord;
    use tempfile::TempDir;

    #[test]
    fn test_file_storage_missing_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(temp_dir.path().join("registry.json"));
        assert!(storage.load().unwrap().is_none());
        assert!(storage.load_metadata().unwrap().is_none());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(temp_dir.path().join("nested/registry.json"));

        let mut doc = RegistryDocument::new();
        doc.insert("greet", VersionRecord::new("1.0.0", "d", "c", "Hi {{name}}"));
        storage.save(&doc).unwrap();
        storage.save_metadata(&RegistryMetadata::default()).unwrap();

        assert_eq!(storage.load().unwrap(), Some(doc));
        assert!(storage.metadata_path().ends_with("registry.meta.json"));
        assert!(storage.load_metadata().unwrap().is_some());
    }

    #[test]
    fn test_file_storage_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.json");
        fs::write(&path, "{ not json").unwrap();

        let storage = JsonFileStorage::new(&path);
        assert!(matches!(storage.load(), Err(StorageError::Json { .. })));
    }

    #[test]
    fn test_memory_storage_counts_saves() {
        let storage = MemoryStorage::new();
        storage.save(&RegistryDocument::new()).unwrap();
        storage.save(&RegistryDocument::new()).unwrap();
        assert_eq!(storage.save_count(), 2);
        assert!(storage.snapshot().is_some());
    }
}
