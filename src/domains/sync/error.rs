//! Sync-specific error types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Machine-readable failure category for sync operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncErrorKind {
    /// The source URL is not trusted.
    CertificateError,
    /// Transport failure or non-2xx response.
    NetworkError,
    /// An attempt exceeded its timeout.
    Timeout,
    /// The payload is not a valid registry document.
    InvalidSchema,
    /// The payload exceeds the configured size cap.
    QuotaExceeded,
    /// Anything else.
    Unknown,
}

impl SyncErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CertificateError => "CERTIFICATE_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::InvalidSchema => "INVALID_SCHEMA",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised anywhere in the sync pipeline.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn certificate(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::CertificateError, msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::NetworkError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Timeout, msg)
    }

    pub fn invalid_schema(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::InvalidSchema, msg)
    }

    pub fn quota_exceeded(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::QuotaExceeded, msg)
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Unknown, msg)
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            SyncErrorKind::NetworkError | SyncErrorKind::Timeout
        )
    }
}

impl From<crate::domains::registry::StorageError> for SyncError {
    fn from(err: crate::domains::registry::StorageError) -> Self {
        Self::unknown(err.to_string())
    }
}
