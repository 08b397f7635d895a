//! The local prompt registry.
//!
//! ## Architecture
//!
//! - `model.rs` - Document, entry, version record and metadata types
//! - `version.rs` - Dotted version comparison
//! - `storage.rs` - Persistence backends behind [`RegistryStorage`]
//! - `store.rs` - The [`Registry`] context object
//! - `accessor.rs` - `get`/`search`/`sync`/`status` over a shared registry

pub mod accessor;
mod error;
pub mod model;
pub mod storage;
mod store;
pub mod version;

pub use accessor::{
    GetOptions, RegistryAccessor, RegistryStatus, RenderedPrompt, SearchFilter, SearchOptions,
    SearchQuery, SearchResult,
};
pub use error::RegistryError;
pub use model::{PromptEntry, RegistryDocument, RegistryMetadata, VersionRecord};
pub use storage::{JsonFileStorage, MemoryStorage, RegistryStorage, StorageError};
pub use store::Registry;
