//! The sync state machine.
//!
//! `initializing → fetching → validating → comparing → merging → updating →
//! finalizing`. A fresh cache entry (unless forced) skips `fetching` and
//! `validating`. `updating` only runs when the merge changed the document.
//! Work done before a failing stage is not rolled back.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::cache::CacheStore;
use super::error::SyncError;
use super::fetcher::{HttpClient, RemoteFetcher, ReqwestClient};
use super::merge::{self, MergeOutcome};
use super::options::{ErrorPolicy, ProgressCallback, SyncOptions, SyncReport, SyncStage};
use super::schema;
use crate::core::config::SyncConfig;
use crate::domains::registry::model::RegistryDocument;
use crate::domains::registry::version;
use crate::domains::registry::Registry;

/// Stage reporting for one run.
struct Progress<'a> {
    callback: Option<&'a ProgressCallback>,
    silent: bool,
}

impl Progress<'_> {
    fn enter(&self, stage: SyncStage) {
        if self.silent {
            debug!("Sync stage: {}", stage);
        } else {
            info!("Sync stage: {}", stage);
        }
        if let Some(callback) = self.callback {
            callback(stage, stage.percent());
        }
    }
}

pub struct SyncOrchestrator {
    config: SyncConfig,
    fetcher: RemoteFetcher,
    cache: CacheStore,
}

impl SyncOrchestrator {
    pub fn new(config: SyncConfig, fetcher: RemoteFetcher, cache: CacheStore) -> Self {
        Self {
            config,
            fetcher,
            cache,
        }
    }

    /// Orchestrator using reqwest for HTTP.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::with_client(config, Arc::new(ReqwestClient::new()))
    }

    pub fn with_client(config: &SyncConfig, client: Arc<dyn HttpClient>) -> Self {
        Self::new(
            config.clone(),
            RemoteFetcher::from_config(client, config),
            CacheStore::new(config.cache_dir.clone(), config.cache_ttl()),
        )
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Run one sync against `registry`.
    ///
    /// Failures are returned, logged into an unsuccessful report, or
    /// silently recorded depending on the error policy.
    #[instrument(skip_all)]
    pub async fn sync(
        &self,
        registry: &mut Registry,
        options: &SyncOptions,
    ) -> Result<SyncReport, SyncError> {
        let policy = options.error_policy.unwrap_or(self.config.error_policy);

        match self.run(registry, options).await {
            Ok(report) => Ok(report),
            Err(error) => match policy {
                ErrorPolicy::Throw => Err(error),
                ErrorPolicy::Warn => {
                    warn!("Sync failed: {}", error);
                    Ok(Self::failure_report(registry, error))
                }
                ErrorPolicy::Silent => Ok(Self::failure_report(registry, error)),
            },
        }
    }

    fn failure_report(registry: &Registry, error: SyncError) -> SyncReport {
        SyncReport {
            success: false,
            local_version: registry.metadata().local_version.clone(),
            errors: vec![error],
            last_sync: registry.metadata().last_sync,
            ..SyncReport::default()
        }
    }

    async fn run(
        &self,
        registry: &mut Registry,
        options: &SyncOptions,
    ) -> Result<SyncReport, SyncError> {
        let progress = Progress {
            callback: options.progress.as_ref(),
            silent: options.silent,
        };
        progress.enter(SyncStage::Initializing);

        let url = options
            .url
            .clone()
            .or_else(|| self.config.url.clone())
            .ok_or_else(|| SyncError::unknown("No sync URL configured"))?;
        let strategy = options.merge_strategy.unwrap_or(self.config.merge_strategy);
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout());

        let cached = if options.force {
            None
        } else {
            self.cached_document(&url)
        };
        let from_cache = cached.is_some();

        let remote = match cached {
            Some(remote) => remote,
            None => {
                progress.enter(SyncStage::Fetching);
                let data = self
                    .fetcher
                    .fetch(&url, timeout, self.config.max_attempts, options.progress.as_ref())
                    .await?;

                progress.enter(SyncStage::Validating);
                let remote = schema::decode(&data)?;
                self.cache.put(&url, &data);
                remote
            }
        };

        progress.enter(SyncStage::Comparing);
        log_comparison(registry.document(), &remote);

        progress.enter(SyncStage::Merging);
        let outcome = merge::merge(registry.document_mut(), &remote, strategy);
        info!(
            "Merged {} ({}): {} new, {} updated, {} backfilled, {} warnings",
            url,
            strategy.as_str(),
            outcome.new_prompts,
            outcome.updated_prompts,
            outcome.backfilled_versions,
            outcome.warnings.len()
        );

        if outcome.changed() {
            progress.enter(SyncStage::Updating);
            registry.save()?;
        }

        progress.enter(SyncStage::Finalizing);
        let report = self.finalize(registry, &url, &remote, outcome, from_cache)?;

        progress.enter(SyncStage::Complete);
        Ok(report)
    }

    /// Fresh cache entry for `url` that still validates and decodes.
    fn cached_document(&self, url: &str) -> Option<RegistryDocument> {
        let data = self.cache.get(url)?;
        match schema::decode(&data) {
            Ok(remote) => {
                debug!("Using cached document for {}", url);
                Some(remote)
            }
            Err(e) => {
                warn!("Ignoring invalid cached document for {}: {}", url, e);
                None
            }
        }
    }

    fn finalize(
        &self,
        registry: &mut Registry,
        url: &str,
        remote: &RegistryDocument,
        outcome: MergeOutcome,
        from_cache: bool,
    ) -> Result<SyncReport, SyncError> {
        let now = Utc::now();
        let metadata = registry.metadata_mut();

        if let Some(schema) = outcome.schema_version.as_deref() {
            if version::is_newer(schema, &metadata.schema_version) {
                metadata.schema_version = schema.to_string();
            }
        }
        if let Some(remote_version) = remote.version.as_deref() {
            if version::is_newer(remote_version, &metadata.local_version) {
                metadata.local_version = remote_version.to_string();
            }
        }
        metadata.last_sync = Some(now);
        metadata.sync_url = Some(url.to_string());

        registry.save_metadata()?;

        Ok(SyncReport {
            success: true,
            local_version: registry.metadata().local_version.clone(),
            remote_version: remote.version.clone(),
            new_prompts: outcome.new_prompts,
            updated_prompts: outcome.updated_prompts,
            errors: Vec::new(),
            warnings: outcome.warnings,
            last_sync: Some(now),
            from_cache,
        })
    }
}

fn log_comparison(local: &RegistryDocument, remote: &RegistryDocument) {
    let mut missing = 0;
    let mut differing = 0;
    for (id, entry) in &remote.prompts {
        match local.get(id) {
            None => missing += 1,
            Some(existing) if version::compare(&existing.latest, &entry.latest).is_ne() => {
                differing += 1
            }
            Some(_) => {}
        }
    }
    debug!(
        "Remote has {} prompts: {} not present locally, {} with a different latest",
        remote.len(),
        missing,
        differing
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::registry::storage::{MemoryStorage, RegistryStorage, StorageError};
    use crate::domains::registry::model::RegistryMetadata;
    use crate::domains::sync::fetcher::testing::{FakeClient, Scripted};
    use crate::domains::sync::{MergeStrategy, SyncErrorKind};
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    const URL: &str = "https://raw.githubusercontent.com/org/repo/main/registry.json";

    fn remote_doc() -> Value {
        json!({
            "schemaVersion": "1.1.0",
            "version": "2.0.0",
            "prompts": {
                "greet": {
                    "latest": "1.0.0",
                    "versions": {
                        "1.0.0": {
                            "description": "Say hello", "prompt": "Hello {{name}}",
                            "category": "general", "tags": ["hello"], "version": "1.0.0"
                        }
                    }
                },
                "review": {
                    "latest": "2.0.0",
                    "versions": {
                        "2.0.0": {
                            "description": "Review code", "prompt": "Review {{code}}",
                            "category": "coding", "tags": ["code"], "version": "2.0.0"
                        }
                    }
                }
            }
        })
    }

    fn config(cache_dir: &TempDir) -> SyncConfig {
        SyncConfig {
            url: Some(URL.to_string()),
            cache_dir: cache_dir.path().to_path_buf(),
            backoff_base_ms: 1,
            backoff_max_ms: 5,
            ..SyncConfig::default()
        }
    }

    fn setup(script: Vec<Scripted>) -> (TempDir, Arc<FakeClient>, SyncOrchestrator) {
        let temp_dir = TempDir::new().unwrap();
        let client = Arc::new(FakeClient::new(script));
        let orchestrator = SyncOrchestrator::with_client(&config(&temp_dir), client.clone());
        (temp_dir, client, orchestrator)
    }

    fn empty_registry() -> (Arc<MemoryStorage>, Registry) {
        let storage = Arc::new(MemoryStorage::new());
        let registry = Registry::load(storage.clone()).unwrap();
        (storage, registry)
    }

    #[tokio::test]
    async fn test_sync_merges_and_persists() {
        let (_dir, client, orchestrator) = setup(vec![Scripted::ok(&remote_doc())]);
        let (storage, mut registry) = empty_registry();

        let report = orchestrator
            .sync(&mut registry, &SyncOptions::new())
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.new_prompts, 2);
        assert_eq!(report.remote_version.as_deref(), Some("2.0.0"));
        assert_eq!(report.local_version, "2.0.0");
        assert!(!report.from_cache);
        assert_eq!(client.calls(), 1);
        assert_eq!(storage.save_count(), 1);

        let meta = registry.metadata();
        assert!(meta.last_sync.is_some());
        assert_eq!(meta.schema_version, "1.1.0");
        assert_eq!(meta.sync_url.as_deref(), Some(URL));
        assert!(storage.load_metadata().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_sync_within_ttl_uses_cache() {
        let (_dir, client, orchestrator) = setup(vec![Scripted::ok(&remote_doc())]);
        let (_, mut first) = empty_registry();
        let (_, mut second) = empty_registry();

        orchestrator
            .sync(&mut first, &SyncOptions::new())
            .await
            .unwrap();
        let report = orchestrator
            .sync(&mut second, &SyncOptions::new())
            .await
            .unwrap();

        assert_eq!(client.calls(), 1);
        assert!(report.from_cache);
        assert_eq!(report.new_prompts, 2);
        assert!(second.document().get("review").is_some());
    }

    #[tokio::test]
    async fn test_force_bypasses_cache() {
        let (_dir, client, orchestrator) = setup(vec![Scripted::ok(&remote_doc())]);
        let (storage, mut registry) = empty_registry();

        orchestrator
            .sync(&mut registry, &SyncOptions::new())
            .await
            .unwrap();
        let report = orchestrator
            .sync(&mut registry, &SyncOptions::new().force(true))
            .await
            .unwrap();

        assert_eq!(client.calls(), 2);
        assert_eq!(report.new_prompts, 0);
        // Nothing changed the second time, so nothing was written.
        assert_eq!(storage.save_count(), 1);
    }

    #[tokio::test]
    async fn test_schema_rejection_under_warn_policy() {
        let mut bad = remote_doc();
        bad["prompts"]["greet"]
            .as_object_mut()
            .unwrap()
            .remove("versions");
        let (_dir, _client, orchestrator) = setup(vec![Scripted::ok(&bad)]);
        let (storage, mut registry) = empty_registry();
        let before = registry.document().clone();

        let report = orchestrator
            .sync(
                &mut registry,
                &SyncOptions::new().error_policy(ErrorPolicy::Warn),
            )
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, SyncErrorKind::InvalidSchema);
        assert_eq!(registry.document(), &before);
        assert_eq!(storage.save_count(), 0);
        assert!(orchestrator.cache().get(URL).is_none());
    }

    #[tokio::test]
    async fn test_sparse_history_record_merges() {
        let mut remote = remote_doc();
        remote["prompts"]["greet"]["versions"]["0.9.0"] = json!({"description": "old, no prompt"});
        let (_dir, _client, orchestrator) = setup(vec![Scripted::ok(&remote)]);
        let (_, mut registry) = empty_registry();

        let report = orchestrator
            .sync(&mut registry, &SyncOptions::new())
            .await
            .unwrap();

        assert!(report.success);
        let greet = registry.document().get("greet").unwrap();
        assert_eq!(greet.latest, "1.0.0");
        assert!(greet.version("0.9.0").is_some());
        assert!(orchestrator.cache().get(URL).is_some());
    }

    #[tokio::test]
    async fn test_mistyped_record_is_not_cached() {
        let mut bad = remote_doc();
        bad["prompts"]["greet"]["versions"]["1.0.0"]["description"] = json!(5);
        let (_dir, client, orchestrator) =
            setup(vec![Scripted::ok(&bad), Scripted::ok(&remote_doc())]);
        let (_, mut registry) = empty_registry();

        let err = orchestrator
            .sync(&mut registry, &SyncOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, SyncErrorKind::InvalidSchema);
        assert!(orchestrator.cache().get(URL).is_none());

        // The fixed remote is fetched on the next plain sync.
        let report = orchestrator
            .sync(&mut registry, &SyncOptions::new())
            .await
            .unwrap();
        assert!(report.success);
        assert!(!report.from_cache);
        assert_eq!(client.calls(), 2);
        assert_eq!(report.new_prompts, 2);
    }

    #[tokio::test]
    async fn test_undecodable_cache_entry_is_a_miss() {
        let (_dir, client, orchestrator) = setup(vec![Scripted::ok(&remote_doc())]);
        let mut stale = remote_doc();
        stale["prompts"]["review"]["versions"]["1.0.0"] = json!({"tags": ["a", 1]});
        orchestrator.cache().put(URL, &stale);
        let (_, mut registry) = empty_registry();

        let report = orchestrator
            .sync(&mut registry, &SyncOptions::new())
            .await
            .unwrap();

        assert!(!report.from_cache);
        assert_eq!(client.calls(), 1);
        assert_eq!(report.new_prompts, 2);
    }

    #[tokio::test]
    async fn test_throw_policy_propagates() {
        let (_dir, _client, orchestrator) = setup(vec![Scripted::fail()]);
        let (_, mut registry) = empty_registry();

        let err = orchestrator
            .sync(&mut registry, &SyncOptions::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind, SyncErrorKind::NetworkError);
        assert!(registry.metadata().last_sync.is_none());
    }

    #[tokio::test]
    async fn test_silent_policy_records_error() {
        let (_dir, client, orchestrator) = setup(vec![Scripted::ok(&remote_doc())]);
        let (_, mut registry) = empty_registry();

        let report = orchestrator
            .sync(
                &mut registry,
                &SyncOptions::new()
                    .url("https://example.com/registry.json")
                    .error_policy(ErrorPolicy::Silent),
            )
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.errors[0].kind, SyncErrorKind::CertificateError);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_url() {
        let temp_dir = TempDir::new().unwrap();
        let config = SyncConfig {
            url: None,
            ..config(&temp_dir)
        };
        let orchestrator =
            SyncOrchestrator::with_client(&config, Arc::new(FakeClient::new(Vec::new())));
        let (_, mut registry) = empty_registry();

        let err = orchestrator
            .sync(&mut registry, &SyncOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, SyncErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let (_dir, _client, orchestrator) = setup(vec![Scripted::ok(&remote_doc())]);
        let (_, mut registry) = empty_registry();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let options = SyncOptions::new().progress(move |stage, pct| {
            sink.lock().unwrap().push((stage, pct));
        });
        orchestrator.sync(&mut registry, &options).await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0].1 <= w[1].1));
        assert!(seen.iter().all(|(_, pct)| *pct <= 100));
        let stages: Vec<_> = seen.iter().map(|(s, _)| *s).collect();
        for stage in [
            SyncStage::Initializing,
            SyncStage::Fetching,
            SyncStage::Validating,
            SyncStage::Comparing,
            SyncStage::Merging,
            SyncStage::Updating,
            SyncStage::Finalizing,
            SyncStage::Complete,
        ] {
            assert!(stages.contains(&stage), "missing {stage}");
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network_stages() {
        let (_dir, _client, orchestrator) = setup(vec![Scripted::ok(&remote_doc())]);
        let (_, mut first) = empty_registry();
        orchestrator
            .sync(&mut first, &SyncOptions::new())
            .await
            .unwrap();

        let (_, mut second) = empty_registry();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = SyncOptions::new().progress(move |stage, _| {
            sink.lock().unwrap().push(stage);
        });
        orchestrator.sync(&mut second, &options).await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(!seen.contains(&SyncStage::Fetching));
        assert!(!seen.contains(&SyncStage::Validating));
        assert!(seen.contains(&SyncStage::Merging));
    }

    #[tokio::test]
    async fn test_prefer_remote_option_overrides_config() {
        let (_dir, _client, orchestrator) = setup(vec![Scripted::ok(&remote_doc())]);
        let mut doc = RegistryDocument::new();
        doc.insert(
            "review",
            crate::domains::registry::model::VersionRecord::new("1.0.0", "d", "coding", "old"),
        );
        let mut registry = Registry::in_memory(doc);

        let report = orchestrator
            .sync(
                &mut registry,
                &SyncOptions::new().merge_strategy(MergeStrategy::PreferRemote),
            )
            .await
            .unwrap();

        assert_eq!(report.updated_prompts, 1);
        assert_eq!(registry.document().get("review").unwrap().latest, "2.0.0");
    }

    struct FailingStorage;

    impl RegistryStorage for FailingStorage {
        fn load(&self) -> Result<Option<RegistryDocument>, StorageError> {
            Ok(None)
        }

        fn save(&self, _document: &RegistryDocument) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk gone".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_cache_write() {
        let (_dir, _client, orchestrator) = setup(vec![Scripted::ok(&remote_doc())]);
        let mut registry = Registry::new(
            RegistryDocument::new(),
            RegistryMetadata::default(),
            Arc::new(FailingStorage),
        );

        let err = orchestrator
            .sync(&mut registry, &SyncOptions::new().timeout(Duration::from_secs(5)))
            .await
            .unwrap_err();

        assert_eq!(err.kind, SyncErrorKind::Unknown);
        assert!(orchestrator.cache().get(URL).is_some());
        assert!(registry.metadata().last_sync.is_none());
    }
}
