//! Sync invocation options and results.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::SyncError;

/// How a newer remote version is reconciled with the local entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Local keeps its `latest` pointer; newer remote versions are added
    /// with a warning.
    #[default]
    PreferLocal,
    /// Remote wins for any entry where it is newer.
    PreferRemote,
    /// Behaves as `PreferLocal`.
    Interactive,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreferLocal => "prefer-local",
            Self::PreferRemote => "prefer-remote",
            Self::Interactive => "interactive",
        }
    }
}

/// What a failed sync does at the orchestrator boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Return the error.
    #[default]
    Throw,
    /// Log it and return an unsuccessful report.
    Warn,
    /// Return an unsuccessful report without logging.
    Silent,
}

/// States of the sync state machine, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStage {
    Initializing,
    Fetching,
    Validating,
    Comparing,
    Merging,
    Updating,
    Finalizing,
    Complete,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Fetching => "fetching",
            Self::Validating => "validating",
            Self::Comparing => "comparing",
            Self::Merging => "merging",
            Self::Updating => "updating",
            Self::Finalizing => "finalizing",
            Self::Complete => "complete",
        }
    }

    /// Progress percentage reported on entering the stage.
    pub fn percent(&self) -> u8 {
        match self {
            Self::Initializing => 0,
            Self::Fetching => 10,
            Self::Validating => 40,
            Self::Comparing => 55,
            Self::Merging => 70,
            Self::Updating => 85,
            Self::Finalizing => 95,
            Self::Complete => 100,
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress callback: stage and percentage in `0..=100`.
pub type ProgressCallback = Arc<dyn Fn(SyncStage, u8) + Send + Sync>;

/// Per-call sync options. Unset fields fall back to the configuration.
#[derive(Clone, Default)]
pub struct SyncOptions {
    pub url: Option<String>,
    /// Ignore the cache.
    pub force: bool,
    pub timeout: Option<Duration>,
    pub progress: Option<ProgressCallback>,
    pub error_policy: Option<ErrorPolicy>,
    pub merge_strategy: Option<MergeStrategy>,
    /// Log stages at debug instead of info.
    pub silent: bool,
    /// Run as a detached task.
    pub background: bool,
}

impl fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("url", &self.url)
            .field("force", &self.force)
            .field("timeout", &self.timeout)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .field("error_policy", &self.error_policy)
            .field("merge_strategy", &self.merge_strategy)
            .field("silent", &self.silent)
            .field("background", &self.background)
            .finish()
    }
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(SyncStage, u8) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = Some(policy);
        self
    }

    pub fn merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = Some(strategy);
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success: bool,
    pub local_version: String,
    pub remote_version: Option<String>,
    pub new_prompts: usize,
    pub updated_prompts: usize,
    pub errors: Vec<SyncError>,
    pub warnings: Vec<String>,
    pub last_sync: Option<DateTime<Utc>>,
    /// The remote document came from the cache.
    #[serde(default)]
    pub from_cache: bool,
}

/// Opaque identifier of a background sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncTaskId(pub u64);

impl fmt::Display for SyncTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sync-{}", self.0)
    }
}

/// Result of [`crate::domains::registry::RegistryAccessor::sync`].
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    Background(SyncTaskId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_wire_names() {
        let s: MergeStrategy = serde_json::from_str("\"prefer-remote\"").unwrap();
        assert_eq!(s, MergeStrategy::PreferRemote);
        assert_eq!(
            serde_json::to_string(&MergeStrategy::Interactive).unwrap(),
            "\"interactive\""
        );
        let p: ErrorPolicy = serde_json::from_str("\"warn\"").unwrap();
        assert_eq!(p, ErrorPolicy::Warn);
    }

    #[test]
    fn test_stage_percentages_increase() {
        let stages = [
            SyncStage::Initializing,
            SyncStage::Fetching,
            SyncStage::Validating,
            SyncStage::Comparing,
            SyncStage::Merging,
            SyncStage::Updating,
            SyncStage::Finalizing,
            SyncStage::Complete,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].percent() < pair[1].percent());
        }
    }

    #[test]
    fn test_report_camel_case() {
        let value = serde_json::to_value(SyncReport::default()).unwrap();
        assert!(value.get("newPrompts").is_some());
        assert!(value.get("lastSync").is_some());
    }
}
