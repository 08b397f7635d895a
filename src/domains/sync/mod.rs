//! Remote registry synchronization.
//!
//! A sync fetches a registry document from a trusted HTTPS source (through a
//! TTL cache), validates it, and merges it into the local registry according
//! to a [`MergeStrategy`].

pub mod cache;
pub mod error;
pub mod fetcher;
pub mod merge;
pub mod options;
pub mod orchestrator;
pub mod schema;

pub use cache::CacheStore;
pub use error::{SyncError, SyncErrorKind};
pub use fetcher::{BackoffPolicy, HttpClient, HttpResponse, RemoteFetcher, ReqwestClient};
pub use merge::{MergeOutcome, merge};
pub use options::{
    ErrorPolicy, MergeStrategy, ProgressCallback, SyncOptions, SyncOutcome, SyncReport,
    SyncStage, SyncTaskId,
};
pub use orchestrator::SyncOrchestrator;
