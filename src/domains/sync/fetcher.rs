//! Remote registry fetching with trust checks, timeouts and retries.

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::error::{SyncError, SyncErrorKind};
use super::options::{ProgressCallback, SyncStage};
use crate::core::config::SyncConfig;
use crate::core::security::TrustPolicy;

/// A received HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// Declared `Content-Length`, if any.
    pub content_length: Option<u64>,
    /// Body bytes. May stop early once `max_bytes` is exceeded.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A 200 `application/json` response with `body`.
    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            status: 200,
            content_type: Some("application/json; charset=utf-8".to_string()),
            content_length: Some(body.len() as u64),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP GET seam.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform one GET. Transport failures are `NETWORK_ERROR`s.
    async fn get(&self, url: &Url, max_bytes: u64) -> Result<HttpResponse, SyncError>;
}

/// [`HttpClient`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &Url, max_bytes: u64) -> Result<HttpResponse, SyncError> {
        let mut response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SyncError::network(format!("Request to {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = response.content_length();

        let mut body = Vec::new();
        if content_length.is_none_or(|len| len <= max_bytes) {
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| SyncError::network(format!("Reading body from {url} failed: {e}")))?
            {
                body.extend_from_slice(&chunk);
                if body.len() as u64 > max_bytes {
                    break;
                }
            }
        }

        Ok(HttpResponse {
            status,
            content_type,
            content_length,
            body,
        })
    }
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1_000),
            max: Duration::from_millis(30_000),
        }
    }
}

impl BackoffPolicy {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base.saturating_mul(1u32 << exponent).min(self.max)
    }
}

pub struct RemoteFetcher {
    client: Arc<dyn HttpClient>,
    trust: TrustPolicy,
    max_payload_bytes: u64,
    backoff: BackoffPolicy,
}

impl RemoteFetcher {
    pub fn new(
        client: Arc<dyn HttpClient>,
        trust: TrustPolicy,
        max_payload_bytes: u64,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            client,
            trust,
            max_payload_bytes,
            backoff,
        }
    }

    pub fn from_config(client: Arc<dyn HttpClient>, config: &SyncConfig) -> Self {
        Self::new(
            client,
            TrustPolicy::from_config(config),
            config.max_payload_bytes,
            BackoffPolicy {
                base: Duration::from_millis(config.backoff_base_ms),
                max: Duration::from_millis(config.backoff_max_ms),
            },
        )
    }

    pub fn trust_policy(&self) -> &TrustPolicy {
        &self.trust
    }

    /// Fetch and decode the document at `url`.
    ///
    /// Untrusted URLs fail with `CERTIFICATE_ERROR` before any request.
    /// Network errors and timeouts are retried up to `max_attempts` times;
    /// once a 2xx response arrives no further attempt is made, whatever the
    /// decoding outcome. Attempts and backoff waits share one deadline of
    /// `timeout * max_attempts`.
    #[instrument(skip(self, progress))]
    pub async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
        max_attempts: u32,
        progress: Option<&ProgressCallback>,
    ) -> Result<Value, SyncError> {
        let parsed = self.trust.check(url).map_err(|e| {
            warn!("Refusing to fetch untrusted source: {}", e);
            SyncError::certificate(e.to_string()).with_details(json!({ "url": url }))
        })?;

        let attempts = max_attempts.max(1);
        let deadline = Instant::now() + timeout.saturating_mul(attempts);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if let Some(callback) = progress {
                let span = u32::from(SyncStage::Validating.percent() - SyncStage::Fetching.percent());
                let pct = u32::from(SyncStage::Fetching.percent()) + span * (attempt - 1) / attempts;
                callback(SyncStage::Fetching, pct as u8);
            }

            debug!("Fetching {} (attempt {}/{})", url, attempt, attempts);
            let budget = deadline.saturating_duration_since(Instant::now()).min(timeout);
            let error = match tokio::time::timeout(
                budget,
                self.client.get(&parsed, self.max_payload_bytes),
            )
            .await
            {
                Ok(Ok(response)) if response.is_success() => {
                    info!("Fetched {} ({} bytes)", url, response.body.len());
                    return self.decode(url, response);
                }
                Ok(Ok(response)) => SyncError::network(format!(
                    "{url} returned HTTP {}",
                    response.status
                ))
                .with_details(json!({ "status": response.status, "attempt": attempt })),
                Ok(Err(error)) => error,
                Err(_) => SyncError::timeout(format!(
                    "{url} did not respond within {}ms",
                    timeout.as_millis()
                ))
                .with_details(json!({ "attempt": attempt })),
            };

            warn!("Attempt {}/{} for {} failed: {}", attempt, attempts, url, error);
            let retry = error.is_retryable() && attempt < attempts;
            let backoff = error.kind != SyncErrorKind::Timeout;
            last_error = Some(error);

            if !retry {
                break;
            }
            if backoff {
                let delay = self.backoff.delay(attempt);
                let wake = (Instant::now() + delay).min(deadline);
                debug!("Retrying in {:?}", delay);
                tokio::time::sleep_until(wake).await;
                if wake >= deadline {
                    debug!("Retry budget for {} exhausted", url);
                    break;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SyncError::network(format!("Fetching {url} failed"))))
    }

    /// Content-type, size and JSON checks on a successful response.
    fn decode(&self, url: &str, response: HttpResponse) -> Result<Value, SyncError> {
        let is_json = response
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
        if !is_json {
            return Err(SyncError::invalid_schema(format!(
                "{url} returned content type {:?}, expected application/json",
                response.content_type.as_deref().unwrap_or("<none>")
            )));
        }

        let size = response
            .content_length
            .unwrap_or(0)
            .max(response.body.len() as u64);
        if size > self.max_payload_bytes {
            return Err(SyncError::quota_exceeded(format!(
                "Payload from {url} exceeds {} bytes",
                self.max_payload_bytes
            ))
            .with_details(json!({ "limit": self.max_payload_bytes, "size": size })));
        }

        serde_json::from_slice(&response.body)
            .map_err(|e| SyncError::invalid_schema(format!("{url} returned invalid JSON: {e}")))
    }
}
