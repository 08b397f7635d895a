//! The registry context object.
//!
//! A [`Registry`] owns one local document, its metadata and the storage
//! backend they are persisted to. Several registries can live in the same
//! process.

use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::model::{RegistryDocument, RegistryMetadata, VersionRecord, DEFAULT_SCHEMA_VERSION};
use super::storage::{MemoryStorage, RegistryStorage, StorageError};

pub struct Registry {
    document: RegistryDocument,
    metadata: RegistryMetadata,
    storage: Arc<dyn RegistryStorage>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("prompts", &self.document.len())
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl Registry {
    pub fn new(
        document: RegistryDocument,
        metadata: RegistryMetadata,
        storage: Arc<dyn RegistryStorage>,
    ) -> Self {
        Self {
            document,
            metadata,
            storage,
        }
    }

    /// Load a registry from storage.
    ///
    /// Missing documents start empty; missing metadata is derived from the
    /// document.
    pub fn load(storage: Arc<dyn RegistryStorage>) -> Result<Self, StorageError> {
        let document = storage.load()?.unwrap_or_default();
        let metadata = match storage.load_metadata()? {
            Some(meta) => meta,
            None => RegistryMetadata {
                local_version: document
                    .version
                    .clone()
                    .unwrap_or_else(|| "0.0.0".to_string()),
                schema_version: document
                    .schema_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SCHEMA_VERSION.to_string()),
                ..RegistryMetadata::default()
            },
        };

        info!("Loaded registry with {} prompts", document.len());
        Ok(Self::new(document, metadata, storage))
    }

    /// A registry backed by [`MemoryStorage`].
    pub fn in_memory(document: RegistryDocument) -> Self {
        let storage = Arc::new(MemoryStorage::with_document(document.clone()));
        Self::new(document, RegistryMetadata::default(), storage)
    }

    pub fn document(&self) -> &RegistryDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut RegistryDocument {
        &mut self.document
    }

    pub fn metadata(&self) -> &RegistryMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut RegistryMetadata {
        &mut self.metadata
    }

    pub fn storage(&self) -> &Arc<dyn RegistryStorage> {
        &self.storage
    }

    /// Persist the document and bump `lastModified`.
    pub fn save(&mut self) -> Result<(), StorageError> {
        self.storage.save(&self.document)?;
        self.metadata.touch();
        self.storage.save_metadata(&self.metadata)
    }

    pub fn save_metadata(&self) -> Result<(), StorageError> {
        self.storage.save_metadata(&self.metadata)
    }

    /// Local write path: add a new version of `id` and persist.
    pub fn add_version(
        &mut self,
        id: impl Into<String>,
        record: VersionRecord,
    ) -> Result<(), StorageError> {
        self.document.insert(id, record);
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_empty_storage() {
        let registry = Registry::load(Arc::new(MemoryStorage::new())).unwrap();
        assert!(registry.document().is_empty());
        assert_eq!(registry.metadata().schema_version, DEFAULT_SCHEMA_VERSION);
        assert!(registry.metadata().last_sync.is_none());
    }

    #[test]
    fn test_metadata_derived_from_document() {
        let doc = RegistryDocument {
            schema_version: Some("2.0.0".to_string()),
            version: Some("3.1.0".to_string()),
            ..RegistryDocument::default()
        };
        let registry = Registry::load(Arc::new(MemoryStorage::with_document(doc))).unwrap();
        assert_eq!(registry.metadata().schema_version, "2.0.0");
        assert_eq!(registry.metadata().local_version, "3.1.0");
    }

    #[test]
    fn test_add_version_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let mut registry = Registry::load(storage.clone()).unwrap();
        let before = registry.metadata().last_modified;

        registry
            .add_version("greet", VersionRecord::new("1.0.0", "d", "c", "Hi"))
            .unwrap();

        assert_eq!(storage.save_count(), 1);
        assert!(storage.snapshot().unwrap().get("greet").is_some());
        assert!(registry.metadata().last_modified >= before);
    }
}
