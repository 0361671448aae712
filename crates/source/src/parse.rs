//! Manifest document parsing.

use serde::Deserialize;
use varuna_core::{Error, Result};
use varuna_cluster::{DesiredResource, ResourceId, ResourceKind};

/// Parse the multi-document YAML text of one manifest file into desired
/// resources.
///
/// Each document must carry `kind` and `metadata.name`. A document without
/// `metadata.namespace` falls back to `default_namespace`; Namespace
/// documents always carry their own name as their namespace, so
/// cluster-scoped and namespaced kinds share one identity scheme. Empty
/// documents (stray `---` separators) are skipped.
///
/// # Errors
///
/// Returns [`Error::ParseError`] for malformed YAML or documents missing
/// identity fields.
pub fn parse_documents(
    text: &str,
    origin: &str,
    revision: &str,
    default_namespace: &str,
) -> Result<Vec<DesiredResource>> {
    let mut resources = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| Error::parse_error(format!("{origin}#{index}"), e.to_string()))?;

        if value.is_null() {
            continue;
        }

        let spec: serde_json::Value = serde_json::to_value(&value)
            .map_err(|e| Error::parse_error(format!("{origin}#{index}"), e.to_string()))?;

        let id = identity_of(&spec, origin, index, default_namespace)?;
        resources.push(DesiredResource::new(id, spec, revision));
    }

    Ok(resources)
}

/// Extract the identity tuple from a normalized document.
fn identity_of(
    spec: &serde_json::Value,
    origin: &str,
    index: usize,
    default_namespace: &str,
) -> Result<ResourceId> {
    let at = || format!("{origin}#{index}");

    let kind = spec
        .get("kind")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| Error::parse_error(at(), "document is missing 'kind'"))?;
    let kind = ResourceKind::from(kind.to_string());

    let metadata = spec
        .get("metadata")
        .ok_or_else(|| Error::parse_error(at(), "document is missing 'metadata'"))?;
    let name = metadata
        .get("name")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| Error::parse_error(at(), "document is missing 'metadata.name'"))?;

    let namespace = if kind == ResourceKind::Namespace {
        name
    } else {
        metadata
            .get("namespace")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(default_namespace)
    };

    Ok(ResourceId::new(kind, namespace, name))
}
