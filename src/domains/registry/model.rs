//! Registry document types.
//!
//! The same shapes are used for the local registry file and for the remote
//! wire format.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::version;

/// Schema version assumed for documents that do not declare one.
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";

/// One immutable version of a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    #[serde(default)]
    pub description: String,

    /// Template text with `{{variable}}` placeholders. Older records in a
    /// remote history may omit it.
    #[serde(default)]
    pub prompt: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Must equal the key this record is stored under.
    #[serde(default)]
    pub version: String,

    /// Alternate templates keyed by model name, model family or `generic`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<BTreeMap<String, String>>,

    /// Fields the registry does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VersionRecord {
    /// Create a record with no tags or variants.
    pub fn new(
        version: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            prompt: prompt.into(),
            category: category.into(),
            tags: Vec::new(),
            version: version.into(),
            variants: None,
            extra: Map::new(),
        }
    }

    /// Builder-style tag setter.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style variant setter.
    pub fn with_variant(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.variants
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), template.into());
        self
    }
}

/// The versioned history of one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptEntry {
    /// Key into `versions` naming the current version.
    pub latest: String,

    pub versions: BTreeMap<String, VersionRecord>,
}

impl PromptEntry {
    /// Create an entry whose only version is `record`.
    pub fn new(record: VersionRecord) -> Self {
        let latest = record.version.clone();
        let mut versions = BTreeMap::new();
        versions.insert(latest.clone(), record);
        Self { latest, versions }
    }

    /// The record `latest` points at.
    pub fn latest_record(&self) -> Option<&VersionRecord> {
        self.versions.get(&self.latest)
    }

    pub fn version(&self, version: &str) -> Option<&VersionRecord> {
        self.versions.get(version)
    }

    /// Add a new version and move `latest` to it if it is the newest.
    pub fn add_version(&mut self, record: VersionRecord) {
        if version::is_newer(&record.version, &self.latest) || self.versions.is_empty() {
            self.latest = record.version.clone();
        }
        self.versions.insert(record.version.clone(), record);
    }
}

/// A full registry document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,

    /// Revision of the registry as a whole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    pub prompts: BTreeMap<String, PromptEntry>,
}

impl RegistryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&PromptEntry> {
        self.prompts.get(id)
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Insert a record, creating the entry if needed.
    pub fn insert(&mut self, id: impl Into<String>, record: VersionRecord) {
        let id = id.into();
        match self.prompts.get_mut(&id) {
            Some(entry) => entry.add_version(record),
            None => {
                self.prompts.insert(id, PromptEntry::new(record));
            }
        }
    }
}

/// Bookkeeping about the local registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryMetadata {
    pub local_version: String,

    pub last_sync: Option<DateTime<Utc>>,

    pub last_modified: DateTime<Utc>,

    #[serde(default)]
    pub sync_url: Option<String>,

    pub schema_version: String,
}

impl Default for RegistryMetadata {
    fn default() -> Self {
        Self {
            local_version: "0.0.0".to_string(),
            last_sync: None,
            last_modified: Utc::now(),
            sync_url: None,
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
        }
    }
}

impl RegistryMetadata {
    /// Whether the last successful sync is older than `max_age`.
    ///
    /// A registry that has never synced is stale.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        match self.last_sync {
            Some(at) => Utc::now() - at >= max_age,
            None => true,
        }
    }

    /// Record a local write.
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}
