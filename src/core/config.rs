//! Configuration management for the prompt registry server.
//!
//! Configuration is layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. `~/.prompt-registry/config.json`
//! 3. `./.prompt-registry.json`
//! 4. environment variables (a `.env` file is honoured)
//!
//! Files are deep-merged as JSON objects over the defaults, so a file only
//! needs to name the keys it changes.

use super::error::{Error, Result};
use super::transport::TransportConfig;
use crate::domains::sync::{ErrorPolicy, MergeStrategy};
use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name used under the home directory.
const HOME_DIR_NAME: &str = ".prompt-registry";

/// Config file name under the home directory.
const HOME_CONFIG_FILE: &str = "config.json";

/// Config file name in the working directory.
const LOCAL_CONFIG_FILE: &str = ".prompt-registry.json";

/// Main configuration structure for the prompt registry server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Local registry storage.
    pub registry: RegistryConfig,

    /// Remote synchronization.
    pub sync: SyncConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Local registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Path of the local registry document.
    pub path: PathBuf,

    /// Registries whose last sync is older than this are reported stale.
    pub stale_after_secs: u64,
}

/// Remote sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Remote registry document URL.
    pub url: Option<String>,

    /// Hosts (and their subdomains) that may be fetched from.
    pub trusted_domains: Vec<String>,

    /// Reject non-https URLs.
    pub require_https: bool,

    /// Largest accepted payload, in bytes.
    pub max_payload_bytes: u64,

    /// Fetch attempts before giving up.
    pub max_attempts: u32,

    /// Per-attempt timeout.
    pub timeout_ms: u64,

    /// First backoff delay; doubles per attempt.
    pub backoff_base_ms: u64,

    /// Backoff ceiling.
    pub backoff_max_ms: u64,

    /// Cache time-to-live. `0` disables the cache.
    pub cache_ttl_secs: u64,

    /// Directory holding cached remote documents.
    pub cache_dir: PathBuf,

    pub merge_strategy: MergeStrategy,

    pub error_policy: ErrorPolicy,

    /// Sync and retry once when `get` misses.
    pub auto_sync_on_miss: bool,

    /// Sync and retry once when `search` finds nothing.
    pub auto_sync_on_empty: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,

    /// Whether to include timestamps in log output.
    pub with_timestamps: bool,
}

fn home_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(HOME_DIR_NAME)
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            url: None,
            trusted_domains: vec![
                "github.com".to_string(),
                "githubusercontent.com".to_string(),
            ],
            require_https: true,
            max_payload_bytes: 10 * 1024 * 1024,
            max_attempts: 3,
            timeout_ms: 30_000,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            cache_ttl_secs: 3_600,
            cache_dir: home_base_dir().join("cache"),
            merge_strategy: MergeStrategy::default(),
            error_policy: ErrorPolicy::default(),
            auto_sync_on_miss: false,
            auto_sync_on_empty: false,
        }
    }
}

impl SyncConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: home_base_dir().join("registry.json"),
            stale_after_secs: 24 * 60 * 60,
        }
    }
}

impl RegistryConfig {
    pub fn stale_after(&self) -> ChronoDuration {
        let secs = i64::try_from(self.stale_after_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        ChronoDuration::seconds(secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "prompt-registry".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            registry: RegistryConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                with_timestamps: true,
            },
            transport: TransportConfig::default(),
        }
    }
}

impl Config {
    /// Load the full layered configuration.
    pub fn load() -> Result<Self> {
        let mut files = Vec::new();
        files.push(home_base_dir().join(HOME_CONFIG_FILE));
        if let Ok(cwd) = std::env::current_dir() {
            files.push(cwd.join(LOCAL_CONFIG_FILE));
        }

        let mut config = Self::from_files(&files)?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults overlaid with environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Defaults deep-merged with each existing file in order.
    ///
    /// Missing files are skipped; unreadable or malformed ones are errors.
    pub fn from_files<P: AsRef<Path>>(files: &[P]) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        for path in files {
            let path = path.as_ref();
            if !path.is_file() {
                debug!("No config file at {}", path.display());
                continue;
            }

            let contents = std::fs::read_to_string(path)?;
            let overlay: Value = serde_json::from_str(&contents).map_err(|e| {
                Error::config(format!("Invalid config file {}: {}", path.display(), e))
            })?;
            if !overlay.is_object() {
                return Err(Error::config(format!(
                    "Config file {} must contain a JSON object",
                    path.display()
                )));
            }

            info!("Applying config file {}", path.display());
            deep_merge(&mut merged, overlay);
        }

        serde_json::from_value(merged).map_err(|e| Error::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        dotenvy::dotenv().ok();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            self.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(url) = std::env::var("PROMPT_REGISTRY_SYNC_URL") {
            info!("Sync URL overridden from environment");
            self.sync.url = Some(url);
        }

        if let Ok(path) = std::env::var("PROMPT_REGISTRY_PATH") {
            self.registry.path = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("PROMPT_REGISTRY_CACHE_DIR") {
            self.sync.cache_dir = PathBuf::from(dir);
        }

        if let Some(transport) = TransportConfig::from_env() {
            self.transport = transport;
        }
    }
}

/// Recursively merge `overlay` into `base`.
///
/// Objects are merged key by key; any other value in `overlay` replaces the
/// one in `base`.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
