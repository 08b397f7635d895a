//! Reconciliation of a remote registry document into the local one.
//!
//! For every remote entry:
//!
//! - absent locally: copied whole, counted as new;
//! - local `latest` newer: local pointer kept, missing history backfilled;
//! - remote `latest` newer: with [`MergeStrategy::PreferRemote`] the remote
//!   pointer and every remote version win (counted as updated); otherwise
//!   the pointer stays and only versions newer than the local `latest` are
//!   added, each with a warning;
//! - same `latest`: missing versions filled in.
//!
//! Only the prefer-remote path overwrites an existing local version record.

use tracing::debug;

use super::options::MergeStrategy;
use crate::domains::registry::model::{
    DEFAULT_SCHEMA_VERSION, PromptEntry, RegistryDocument, VersionRecord,
};
use crate::domains::registry::version;

/// Counters and warnings from one merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Entries copied because they were absent locally.
    pub new_prompts: usize,

    /// Entries whose `latest` pointer moved to the remote one.
    pub updated_prompts: usize,

    /// Versions added to existing entries without moving `latest`.
    pub backfilled_versions: usize,

    pub warnings: Vec<String>,

    /// Set when the local schema version was advanced.
    pub schema_version: Option<String>,
}

impl MergeOutcome {
    /// Whether `local` was modified.
    pub fn changed(&self) -> bool {
        self.new_prompts > 0
            || self.updated_prompts > 0
            || self.backfilled_versions > 0
            || self.schema_version.is_some()
    }
}

/// Merge `remote` into `local` in place.
pub fn merge(
    local: &mut RegistryDocument,
    remote: &RegistryDocument,
    strategy: MergeStrategy,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for (id, remote_entry) in &remote.prompts {
        match local.prompts.get_mut(id) {
            None => {
                debug!("New prompt from remote: {}", id);
                local.prompts.insert(id.clone(), remote_entry.clone());
                outcome.new_prompts += 1;
            }
            Some(local_entry) => merge_entry(id, local_entry, remote_entry, strategy, &mut outcome),
        }
    }

    if let Some(remote_schema) = remote.schema_version.as_deref() {
        let local_schema = local
            .schema_version
            .as_deref()
            .unwrap_or(DEFAULT_SCHEMA_VERSION);
        if version::is_newer(remote_schema, local_schema) {
            debug!("Schema version {} -> {}", local_schema, remote_schema);
            local.schema_version = Some(remote_schema.to_string());
            outcome.schema_version = Some(remote_schema.to_string());
        }
    }

    outcome
}

fn merge_entry(
    id: &str,
    local: &mut PromptEntry,
    remote: &PromptEntry,
    strategy: MergeStrategy,
    outcome: &mut MergeOutcome,
) {
    match version::compare(&local.latest, &remote.latest) {
        std::cmp::Ordering::Less => match strategy {
            MergeStrategy::PreferRemote => {
                debug!("Remote wins for {}: {} -> {}", id, local.latest, remote.latest);
                local.latest = remote.latest.clone();
                for (key, record) in &remote.versions {
                    local.versions.insert(key.clone(), record.clone());
                }
                outcome.updated_prompts += 1;
            }
            MergeStrategy::PreferLocal | MergeStrategy::Interactive => {
                let current = local.latest.clone();
                for (key, record) in &remote.versions {
                    if !version::is_newer(key, &current) {
                        continue;
                    }
                    outcome.warnings.push(format!(
                        "Prompt '{id}': remote version {key} is newer than local latest {current}; \
                         added without changing latest"
                    ));
                    if insert_missing(local, key, record) {
                        outcome.backfilled_versions += 1;
                    }
                }
            }
        },
        // Local newer or equal: history gaps only.
        std::cmp::Ordering::Greater | std::cmp::Ordering::Equal => {
            for (key, record) in &remote.versions {
                if insert_missing(local, key, record) {
                    outcome.backfilled_versions += 1;
                }
            }
        }
    }
}

/// Insert `record` under `key` unless the entry already has it.
fn insert_missing(entry: &mut PromptEntry, key: &str, record: &VersionRecord) -> bool {
    if entry.versions.contains_key(key) {
        return false;
    }
    entry.versions.insert(key.to_string(), record.clone());
    true
}
