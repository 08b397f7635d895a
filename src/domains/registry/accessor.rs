//! Consumer-facing read API over a registry.
//!
//! [`RegistryAccessor`] owns the shared [`Registry`] and the
//! [`SyncOrchestrator`] used for its opportunistic auto-sync paths. Every
//! operation locks the registry, so a background sync and a foreground read
//! never interleave.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use super::error::RegistryError;
use super::model::{RegistryDocument, RegistryMetadata, VersionRecord};
use super::store::Registry;
use crate::domains::prompts::templates;
use crate::domains::sync::{
    ErrorPolicy, SyncError, SyncOptions, SyncOrchestrator, SyncOutcome, SyncReport, SyncTaskId,
};

/// Options for [`RegistryAccessor::get`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Target model name for variant selection.
    pub model: Option<String>,

    /// Overrides `auto_sync_on_miss` from the configuration.
    pub auto_sync: Option<bool>,
}

/// A rendered prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPrompt {
    pub id: String,
    pub version: String,
    pub text: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    /// Variant key the text came from, if not the base template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Exact-match filters. Unset fields match everything; tags must all be
/// present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    /// Case-insensitive substring over id, description, category and tags.
    Text(String),
    Filter(SearchFilter),
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Overrides `auto_sync_on_empty` from the configuration.
    pub auto_sync: Option<bool>,
}

/// One search hit, annotated with registry freshness.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub version: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub last_sync: Option<DateTime<Utc>>,
    pub stale: bool,
}

/// Summary returned by [`RegistryAccessor::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    pub prompts: usize,
    pub stale: bool,
    #[serde(flatten)]
    pub metadata: RegistryMetadata,
}

/// Split `id@version`. An empty or `latest` suffix means the latest version.
pub fn parse_identifier(identifier: &str) -> (&str, Option<&str>) {
    match identifier.split_once('@') {
        Some((id, version)) if !version.is_empty() && version != "latest" => (id, Some(version)),
        Some((id, _)) => (id, None),
        None => (identifier, None),
    }
}

pub struct RegistryAccessor {
    registry: Arc<Mutex<Registry>>,
    orchestrator: Arc<SyncOrchestrator>,
    stale_after: chrono::Duration,
    next_task: AtomicU64,
    tasks: std::sync::Mutex<HashMap<SyncTaskId, JoinHandle<Result<SyncReport, SyncError>>>>,
}

impl RegistryAccessor {
    pub fn new(
        registry: Registry,
        orchestrator: SyncOrchestrator,
        stale_after: chrono::Duration,
    ) -> Self {
        Self {
            registry: Arc::new(Mutex::new(registry)),
            orchestrator: Arc::new(orchestrator),
            stale_after,
            next_task: AtomicU64::new(1),
            tasks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<Mutex<Registry>> {
        &self.registry
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    /// Render prompt `identifier` (`id` or `id@version`) with `variables`.
    #[instrument(skip(self, variables))]
    pub async fn get(
        &self,
        identifier: &str,
        variables: &HashMap<String, Value>,
        options: &GetOptions,
    ) -> Result<RenderedPrompt, RegistryError> {
        let (id, version) = parse_identifier(identifier);
        let mut registry = self.registry.lock().await;

        if registry.document().get(id).is_none() {
            let auto_sync = options
                .auto_sync
                .unwrap_or(self.orchestrator.config().auto_sync_on_miss);
            if !auto_sync {
                return Err(RegistryError::not_found(id));
            }

            info!("Prompt '{}' not found locally, syncing", id);
            self.orchestrator
                .sync(&mut registry, &Self::fallback_options())
                .await?;
        }

        render_entry(registry.document(), id, version, variables, options.model.as_deref())
    }

    /// Search the latest version of every entry.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &SearchQuery,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RegistryError> {
        let mut registry = self.registry.lock().await;
        let results = self.search_registry(&registry, query);

        let auto_sync = options
            .auto_sync
            .unwrap_or(self.orchestrator.config().auto_sync_on_empty);
        if !results.is_empty() || !auto_sync {
            return Ok(results);
        }

        info!("Search returned nothing, syncing");
        self.orchestrator
            .sync(&mut registry, &Self::fallback_options())
            .await?;
        Ok(self.search_registry(&registry, query))
    }

    /// Run a sync now, or as a detached task when `options.background` is
    /// set.
    pub async fn sync(&self, options: SyncOptions) -> Result<SyncOutcome, RegistryError> {
        if options.background {
            return Ok(SyncOutcome::Background(self.spawn_sync(options)));
        }

        let mut registry = self.registry.lock().await;
        let report = self.orchestrator.sync(&mut registry, &options).await?;
        Ok(SyncOutcome::Completed(report))
    }

    fn spawn_sync(&self, options: SyncOptions) -> SyncTaskId {
        let id = SyncTaskId(self.next_task.fetch_add(1, Ordering::Relaxed));
        let registry = Arc::clone(&self.registry);
        let orchestrator = Arc::clone(&self.orchestrator);

        let handle = tokio::spawn(async move {
            let mut registry = registry.lock().await;
            let result = orchestrator.sync(&mut registry, &options).await;
            match &result {
                Ok(report) => info!(
                    "Background sync {} finished: success={}, {} new, {} updated",
                    id, report.success, report.new_prompts, report.updated_prompts
                ),
                Err(e) => warn!("Background sync {} failed: {}", id, e),
            }
            result
        });

        match self.tasks.lock() {
            Ok(mut tasks) => {
                // Handles of finished tasks nobody joined are dropped here.
                tasks.retain(|_, h| !h.is_finished());
                tasks.insert(id, handle);
            }
            Err(_) => warn!("Background task table poisoned; {} is detached", id),
        }

        info!("Started background sync {}", id);
        id
    }

    /// Wait for a background sync started by [`Self::sync`].
    ///
    /// `None` if the id is unknown or was already joined.
    pub async fn join(&self, id: SyncTaskId) -> Option<Result<SyncReport, RegistryError>> {
        let handle = self.tasks.lock().ok()?.remove(&id)?;
        Some(match handle.await {
            Ok(result) => result.map_err(RegistryError::from),
            Err(e) => Err(SyncError::unknown(format!("Background sync {id} aborted: {e}")).into()),
        })
    }

    pub async fn status(&self) -> RegistryStatus {
        let registry = self.registry.lock().await;
        RegistryStatus {
            prompts: registry.document().len(),
            stale: registry.metadata().is_stale(self.stale_after),
            metadata: registry.metadata().clone(),
        }
    }

    /// Id and latest record of every entry, ordered by id.
    pub async fn list_latest(&self) -> Vec<(String, VersionRecord)> {
        let registry = self.registry.lock().await;
        registry
            .document()
            .prompts
            .iter()
            .filter_map(|(id, entry)| entry.latest_record().map(|r| (id.clone(), r.clone())))
            .collect()
    }

    /// Auto-sync paths always raise so the caller decides the fallback.
    fn fallback_options() -> SyncOptions {
        SyncOptions::new().error_policy(ErrorPolicy::Throw)
    }

    fn search_registry(&self, registry: &Registry, query: &SearchQuery) -> Vec<SearchResult> {
        let last_sync = registry.metadata().last_sync;
        let stale = registry.metadata().is_stale(self.stale_after);

        registry
            .document()
            .prompts
            .iter()
            .filter_map(|(id, entry)| entry.latest_record().map(|r| (id, r)))
            .filter(|(id, record)| query_matches(query, id, record))
            .map(|(id, record)| SearchResult {
                id: id.clone(),
                version: record.version.clone(),
                description: record.description.clone(),
                category: record.category.clone(),
                tags: record.tags.clone(),
                last_sync,
                stale,
            })
            .collect()
    }
}

fn query_matches(query: &SearchQuery, id: &str, record: &VersionRecord) -> bool {
    match query {
        SearchQuery::Text(text) => {
            let needle = text.to_lowercase();
            id.to_lowercase().contains(&needle)
                || record.description.to_lowercase().contains(&needle)
                || record.category.to_lowercase().contains(&needle)
                || record
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(&needle))
        }
        SearchQuery::Filter(filter) => {
            filter.id.as_deref().is_none_or(|want| want == id)
                && filter
                    .category
                    .as_deref()
                    .is_none_or(|want| want == record.category)
                && filter.tags.iter().all(|tag| record.tags.contains(tag))
        }
    }
}

fn render_entry(
    document: &RegistryDocument,
    id: &str,
    version: Option<&str>,
    variables: &HashMap<String, Value>,
    model: Option<&str>,
) -> Result<RenderedPrompt, RegistryError> {
    let entry = document
        .get(id)
        .ok_or_else(|| RegistryError::not_found(id))?;

    let record = match version {
        Some(v) => entry
            .version(v)
            .ok_or_else(|| RegistryError::version_not_found(id, v))?,
        None => entry
            .latest_record()
            .ok_or_else(|| RegistryError::version_not_found(id, &entry.latest))?,
    };

    let (template, variant) =
        templates::select_variant(&record.prompt, record.variants.as_ref(), model);

    let missing: Vec<String> = templates::placeholders(template)
        .into_iter()
        .filter(|name| !variables.contains_key(name))
        .collect();
    if !missing.is_empty() {
        return Err(RegistryError::MissingVariables {
            id: id.to_string(),
            variables: missing,
        });
    }

    Ok(RenderedPrompt {
        id: id.to_string(),
        version: record.version.clone(),
        text: templates::interpolate(template, variables),
        description: record.description.clone(),
        category: record.category.clone(),
        tags: record.tags.clone(),
        variant: variant.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SyncConfig;
    use crate::domains::registry::storage::MemoryStorage;
    use crate::domains::sync::fetcher::testing::{FakeClient, Scripted};
    use serde_json::json;
    use tempfile::TempDir;

    fn local_doc() -> RegistryDocument {
        let mut doc = RegistryDocument::new();
        doc.insert(
            "greet",
            VersionRecord::new("1.0.0", "Say hello", "general", "Hello {{name}}")
                .with_tags(["hello", "intro"]),
        );
        doc.insert(
            "greet",
            VersionRecord::new("1.1.0", "Say hello", "general", "Hi {{name}}!")
                .with_tags(["hello", "intro"])
                .with_variant("anthropic", "Dear {{name}}")
                .with_variant("generic", "Hey {{name}}"),
        );
        doc.insert(
            "review",
            VersionRecord::new("2.0.0", "Review a diff", "coding", "Review {{diff}}")
                .with_tags(["code", "review"]),
        );
        doc
    }

    fn remote_doc() -> Value {
        json!({
            "version": "5.0.0",
            "prompts": {
                "remote-only": {
                    "latest": "1.0.0",
                    "versions": {
                        "1.0.0": {
                            "description": "From the remote", "prompt": "Remote {{x}}",
                            "category": "misc", "tags": [], "version": "1.0.0"
                        }
                    }
                }
            }
        })
    }

    fn accessor_with(
        doc: RegistryDocument,
        script: Vec<Scripted>,
        configure: impl FnOnce(&mut SyncConfig),
    ) -> (TempDir, Arc<FakeClient>, RegistryAccessor) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = SyncConfig {
            url: Some("https://raw.githubusercontent.com/org/repo/main/registry.json".into()),
            cache_dir: temp_dir.path().to_path_buf(),
            ..SyncConfig::default()
        };
        configure(&mut config);

        let client = Arc::new(FakeClient::new(script));
        let orchestrator = SyncOrchestrator::with_client(&config, client.clone());
        let registry = Registry::load(Arc::new(MemoryStorage::with_document(doc))).unwrap();
        let accessor = RegistryAccessor::new(registry, orchestrator, chrono::Duration::hours(24));
        (temp_dir, client, accessor)
    }

    fn accessor() -> RegistryAccessor {
        accessor_with(local_doc(), Vec::new(), |_| {}).2
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn test_parse_identifier() {
        assert_eq!(parse_identifier("greet"), ("greet", None));
        assert_eq!(parse_identifier("greet@1.0.0"), ("greet", Some("1.0.0")));
        assert_eq!(parse_identifier("greet@latest"), ("greet", None));
        assert_eq!(parse_identifier("greet@"), ("greet", None));
    }

    #[tokio::test]
    async fn test_get_interpolates() {
        let accessor = accessor();
        let prompt = accessor
            .get("greet@1.0.0", &vars(&[("name", "X")]), &GetOptions::default())
            .await
            .unwrap();

        assert_eq!(prompt.text, "Hello X");
        assert_eq!(prompt.version, "1.0.0");
        assert_eq!(prompt.tags, vec!["hello", "intro"]);
        assert!(prompt.variant.is_none());
    }

    #[tokio::test]
    async fn test_get_value_with_braces_is_inserted_verbatim() {
        let prompt = accessor()
            .get(
                "greet@1.0.0",
                &vars(&[("name", "{{diff}}"), ("diff", "unused")]),
                &GetOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(prompt.text, "Hello {{diff}}");
    }

    #[tokio::test]
    async fn test_get_missing_variable() {
        let accessor = accessor();
        let err = accessor
            .get("greet@1.0.0", &HashMap::new(), &GetOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "MissingVariables");
        match err {
            RegistryError::MissingVariables { id, variables } => {
                assert_eq!(id, "greet");
                assert_eq!(variables, vec!["name"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_get_latest_uses_variants() {
        let accessor = accessor();

        let claude = GetOptions {
            model: Some("claude-3-5-sonnet".into()),
            ..GetOptions::default()
        };
        let prompt = accessor
            .get("greet", &vars(&[("name", "Ada")]), &claude)
            .await
            .unwrap();
        assert_eq!(prompt.version, "1.1.0");
        assert_eq!(prompt.text, "Dear Ada");
        assert_eq!(prompt.variant.as_deref(), Some("anthropic"));

        let prompt = accessor
            .get("greet", &vars(&[("name", "Ada")]), &GetOptions::default())
            .await
            .unwrap();
        assert_eq!(prompt.text, "Hey Ada");
    }

    #[tokio::test]
    async fn test_get_unknown_prompt() {
        let (_dir, client, accessor) = accessor_with(local_doc(), Vec::new(), |_| {});
        let err = accessor
            .get("nope", &HashMap::new(), &GetOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "NotFound");
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_unknown_version() {
        let err = accessor()
            .get("greet@9.9.9", &HashMap::new(), &GetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::VersionNotFound { ref version, .. } if version == "9.9.9"
        ));
    }

    #[tokio::test]
    async fn test_get_auto_syncs_on_miss() {
        let (_dir, client, accessor) = accessor_with(
            local_doc(),
            vec![Scripted::ok(&remote_doc())],
            |c| c.auto_sync_on_miss = true,
        );

        let prompt = accessor
            .get("remote-only", &vars(&[("x", "1")]), &GetOptions::default())
            .await
            .unwrap();

        assert_eq!(prompt.text, "Remote 1");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_auto_sync_failure_is_raised() {
        let (_dir, _client, accessor) = accessor_with(
            local_doc(),
            vec![Scripted::fail()],
            |c| {
                c.auto_sync_on_miss = true;
                c.max_attempts = 1;
                c.error_policy = ErrorPolicy::Silent;
            },
        );

        let err = accessor
            .get("remote-only", &HashMap::new(), &GetOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NETWORK_ERROR");
    }

    #[tokio::test]
    async fn test_auto_sync_still_missing() {
        let (_dir, client, accessor) = accessor_with(
            local_doc(),
            vec![Scripted::ok(&remote_doc())],
            |c| c.auto_sync_on_miss = true,
        );

        let err = accessor
            .get("still-missing", &HashMap::new(), &GetOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NotFound");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_text_search() {
        let accessor = accessor();
        let search = |q: &str| SearchQuery::Text(q.to_string());

        let hits = accessor
            .search(&search("REVIEW"), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "review");
        assert!(hits[0].stale);
        assert!(hits[0].last_sync.is_none());

        let hits = accessor
            .search(&search("intro"), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(hits[0].id, "greet");
        assert_eq!(hits[0].version, "1.1.0");
    }

    #[tokio::test]
    async fn test_filter_search() {
        let accessor = accessor();
        let filter = |category: Option<&str>, tags: &[&str]| {
            SearchQuery::Filter(SearchFilter {
                category: category.map(str::to_string),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                id: None,
            })
        };

        let hits = accessor
            .search(&filter(Some("coding"), &[]), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let hits = accessor
            .search(&filter(None, &["hello", "intro"]), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let hits = accessor
            .search(&filter(None, &["hello", "code"]), &SearchOptions::default())
            .await
            .unwrap();
        assert!(hits.is_empty());

        let all = accessor
            .search(&filter(None, &[]), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_search_auto_syncs_on_empty() {
        let (_dir, client, accessor) = accessor_with(
            local_doc(),
            vec![Scripted::ok(&remote_doc())],
            |c| c.auto_sync_on_empty = true,
        );

        let hits = accessor
            .search(
                &SearchQuery::Text("from the remote".into()),
                &SearchOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(client.calls(), 1);
        assert_eq!(hits.len(), 1);
        assert!(!hits[0].stale);
        assert!(hits[0].last_sync.is_some());
    }

    #[tokio::test]
    async fn test_foreground_and_background_sync() {
        let (_dir, client, accessor) = accessor_with(
            RegistryDocument::new(),
            vec![Scripted::ok(&remote_doc())],
            |_| {},
        );

        let outcome = accessor.sync(SyncOptions::new()).await.unwrap();
        match outcome {
            SyncOutcome::Completed(report) => assert_eq!(report.new_prompts, 1),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let outcome = accessor
            .sync(SyncOptions::new().force(true).background(true))
            .await
            .unwrap();
        let SyncOutcome::Background(id) = outcome else {
            panic!("expected a background task");
        };

        let report = accessor.join(id).await.unwrap().unwrap();
        assert!(report.success);
        assert_eq!(report.new_prompts, 0);
        assert_eq!(client.calls(), 2);
        assert!(accessor.join(id).await.is_none());
    }

    #[tokio::test]
    async fn test_status() {
        let accessor = accessor();
        let status = accessor.status().await;
        assert_eq!(status.prompts, 2);
        assert!(status.stale);

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["localVersion"], "0.0.0");
        assert_eq!(value["prompts"], 2);
    }
}
