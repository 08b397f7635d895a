//! Structural validation of fetched registry documents.
//!
//! Checks what the merge needs: the `prompts` map, each entry's `latest`
//! pointer and `versions` map, and the required fields of the latest record.
//! Fields present on any record must also have the right JSON type, so a
//! validated document always decodes. Stops at the first bad entry.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::error::SyncError;
use crate::domains::registry::RegistryDocument;

/// Fields every latest version record must carry.
pub const REQUIRED_VERSION_FIELDS: &[&str] = &["description", "prompt", "category", "tags", "version"];

/// Validate an untrusted document.
pub fn validate(document: &Value) -> Result<(), SyncError> {
    let root = document
        .as_object()
        .ok_or_else(|| SyncError::invalid_schema("Registry document must be a JSON object"))?;

    for key in ["schemaVersion", "version"] {
        if let Some(value) = root.get(key) {
            if !value.is_string() {
                return Err(SyncError::invalid_schema(format!(
                    "'{key}' must be a string"
                )));
            }
        }
    }

    let prompts = root
        .get("prompts")
        .and_then(Value::as_object)
        .ok_or_else(|| SyncError::invalid_schema("Registry document has no 'prompts' object"))?;

    for (id, entry) in prompts {
        validate_entry(id, entry)?;
    }

    Ok(())
}

/// Validate an untrusted document and decode it.
pub fn decode(document: &Value) -> Result<RegistryDocument, SyncError> {
    validate(document)?;
    RegistryDocument::deserialize(document)
        .map_err(|e| SyncError::invalid_schema(format!("Malformed registry document: {e}")))
}

fn invalid(id: &str, reason: impl std::fmt::Display) -> SyncError {
    SyncError::invalid_schema(format!("Prompt '{id}': {reason}"))
        .with_details(serde_json::json!({ "promptId": id }))
}

fn validate_entry(id: &str, entry: &Value) -> Result<(), SyncError> {
    let entry = entry
        .as_object()
        .ok_or_else(|| invalid(id, "entry must be an object"))?;

    let latest = entry
        .get("latest")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(id, "missing string field 'latest'"))?;

    let versions = entry
        .get("versions")
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(id, "missing 'versions' object"))?;

    let record = versions
        .get(latest)
        .ok_or_else(|| invalid(id, format!("latest version '{latest}' not found in versions")))?;
    require_fields(id, latest, record)?;

    for (version, record) in versions {
        validate_record(id, version, record)?;
    }
    Ok(())
}

fn as_record<'a>(
    id: &str,
    version: &str,
    record: &'a Value,
) -> Result<&'a Map<String, Value>, SyncError> {
    record
        .as_object()
        .ok_or_else(|| invalid(id, format!("version '{version}' must be an object")))
}

fn require_fields(id: &str, version: &str, record: &Value) -> Result<(), SyncError> {
    let record = as_record(id, version, record)?;

    let missing: Vec<&str> = REQUIRED_VERSION_FIELDS
        .iter()
        .copied()
        .filter(|field| !record.contains_key(*field))
        .collect();

    if !missing.is_empty() {
        return Err(invalid(
            id,
            format!("version '{version}' is missing {}", missing.join(", ")),
        ));
    }

    Ok(())
}

/// Type checks for whichever known fields a record carries.
fn validate_record(id: &str, version: &str, record: &Value) -> Result<(), SyncError> {
    let record = as_record(id, version, record)?;
    let bad = |field: &str, expected: &str| {
        invalid(id, format!("version '{version}' field '{field}' must be {expected}"))
    };

    for field in ["description", "prompt", "category", "version"] {
        if record.get(field).is_some_and(|v| !v.is_string()) {
            return Err(bad(field, "a string"));
        }
    }

    if let Some(tags) = record.get("tags") {
        let strings = tags
            .as_array()
            .is_some_and(|tags| tags.iter().all(Value::is_string));
        if !strings {
            return Err(bad("tags", "an array of strings"));
        }
    }

    match record.get("variants") {
        None | Some(Value::Null) => {}
        Some(Value::Object(variants)) if variants.values().all(Value::is_string) => {}
        Some(_) => return Err(bad("variants", "an object of strings")),
    }

    Ok(())
}
