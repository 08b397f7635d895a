//! On-disk cache of fetched remote documents.
//!
//! One JSON file per source URL, named after the SHA-256 of the URL. Entries
//! older than the TTL are ignored but left on disk; a newer fetch overwrites
//! them. Every failure in here is logged and swallowed.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Body of a cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub data: Value,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// File name for `url`: URL-safe base64 of its SHA-256.
    pub fn key_for(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        format!("{}.json", URL_SAFE_NO_PAD.encode(digest))
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(Self::key_for(url))
    }

    /// Cached document for `url` if one exists and is younger than the TTL.
    pub fn get(&self, url: &str) -> Option<Value> {
        if self.ttl.is_zero() {
            return None;
        }

        let path = self.path_for(url);
        let contents = fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                return None;
            }
        };

        if entry.url != url {
            warn!("Cache file {} belongs to another URL", path.display());
            return None;
        }

        let age = (Utc::now() - entry.timestamp).to_std().unwrap_or_default();
        if age >= self.ttl {
            debug!("Cache entry for {} is stale ({:?} old)", url, age);
            return None;
        }

        debug!("Cache hit for {}", url);
        Some(entry.data)
    }

    /// Store `data` for `url`.
    pub fn put(&self, url: &str, data: &Value) {
        self.put_at(url, data, Utc::now());
    }

    pub(crate) fn put_at(&self, url: &str, data: &Value, timestamp: DateTime<Utc>) {
        if self.ttl.is_zero() {
            return;
        }

        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!("Cannot create cache dir {}: {}", self.dir.display(), e);
            return;
        }

        let entry = CacheEntry {
            timestamp,
            url: url.to_string(),
            data: data.clone(),
        };

        let body = match serde_json::to_string(&entry) {
            Ok(body) => body,
            Err(e) => {
                warn!("Cannot serialize cache entry for {}: {}", url, e);
                return;
            }
        };

        let path = self.path_for(url);
        match fs::write(&path, body) {
            Ok(()) => debug!("Cached {} at {}", url, path.display()),
            Err(e) => warn!("Cannot write cache file {}: {}", path.display(), e),
        }
    }
}
