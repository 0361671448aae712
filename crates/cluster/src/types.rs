//! Core types for the cluster resource model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource kinds managed by the reconciler.
///
/// The declared dependency rank orders creates/updates (ascending) and
/// deletes (descending): a Namespace exists before anything placed in it, a
/// Deployment before the Service that selects it, a Service before the
/// Ingress that routes to it. Kinds the reconciler does not know are still
/// accepted and rank after all known kinds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceKind {
    Namespace,
    ConfigMap,
    Secret,
    Deployment,
    Service,
    Ingress,
    Other(String),
}

impl ResourceKind {
    /// Dependency rank. Lower ranks are prerequisites of higher ranks.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Namespace => 0,
            Self::ConfigMap | Self::Secret => 1,
            Self::Deployment => 2,
            Self::Service => 3,
            Self::Ingress => 4,
            Self::Other(_) => 5,
        }
    }

    /// The canonical kind string as it appears in manifests.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Namespace => "Namespace",
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
            Self::Deployment => "Deployment",
            Self::Service => "Service",
            Self::Ingress => "Ingress",
            Self::Other(s) => s.as_str(),
        }
    }

    /// All known kinds, in rank order. Used when snapshotting a namespace
    /// kind-by-kind.
    pub fn known() -> [Self; 6] {
        [
            Self::Namespace,
            Self::ConfigMap,
            Self::Secret,
            Self::Deployment,
            Self::Service,
            Self::Ingress,
        ]
    }
}

impl From<String> for ResourceKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Namespace" => Self::Namespace,
            "ConfigMap" => Self::ConfigMap,
            "Secret" => Self::Secret,
            "Deployment" => Self::Deployment,
            "Service" => Self::Service,
            "Ingress" => Self::Ingress,
            _ => Self::Other(s),
        }
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity tuple for a manageable resource.
///
/// Unique within a managed namespace at any instant. The derived ordering
/// (kind, namespace, name) is the deterministic tie-break used inside a
/// dependency rank.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    /// Create a new resource identity.
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Dependency rank of this identity's kind.
    pub fn rank(&self) -> u8 {
        self.kind.rank()
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// A resource as declared by the manifest source at a given revision.
///
/// Immutable once fetched for a revision; superseded by the next revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredResource {
    /// Resource identity.
    pub id: ResourceId,
    /// Declared specification (opaque structured document).
    pub spec: serde_json::Value,
    /// Source revision this declaration was fetched at.
    pub revision: String,
}

impl DesiredResource {
    /// Create a new desired resource.
    pub fn new(id: ResourceId, spec: serde_json::Value, revision: impl Into<String>) -> Self {
        Self {
            id,
            spec,
            revision: revision.into(),
        }
    }
}

/// A resource as observed on the target platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveResource {
    /// Resource identity.
    pub id: ResourceId,
    /// Observed specification.
    pub spec: serde_json::Value,
    /// Observed status, if the platform reports one.
    pub status: Option<serde_json::Value>,
}

impl LiveResource {
    /// Create a new live resource without status.
    pub fn new(id: ResourceId, spec: serde_json::Value) -> Self {
        Self {
            id,
            spec,
            status: None,
        }
    }

    /// Attach an observed status.
    pub fn with_status(mut self, status: serde_json::Value) -> Self {
        self.status = Some(status);
        self
    }
}

/// Immutable per-cycle view of a namespace's live resources.
///
/// `complete` is false when any kind listing failed; a reconciler must never
/// prune based on an incomplete snapshot.
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    /// The namespace this snapshot covers.
    pub namespace: String,
    /// Observed resources, keyed by identity.
    pub resources: HashMap<ResourceId, LiveResource>,
    /// Whether every listing succeeded.
    pub complete: bool,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

impl LiveSnapshot {
    /// Create a new empty, complete snapshot.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            resources: HashMap::new(),
            complete: true,
            taken_at: Utc::now(),
        }
    }

    /// Insert an observed resource.
    pub fn insert(&mut self, resource: LiveResource) {
        self.resources.insert(resource.id.clone(), resource);
    }

    /// Get an observed resource by identity.
    pub fn get(&self, id: &ResourceId) -> Option<&LiveResource> {
        self.resources.get(id)
    }

    /// Check whether an identity is present.
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.resources.contains_key(id)
    }

    /// Mark the snapshot as incomplete.
    pub fn mark_incomplete(&mut self) {
        self.complete = false;
    }

    /// Number of observed resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_rank_ordering() {
        assert!(ResourceKind::Namespace.rank() < ResourceKind::Deployment.rank());
        assert!(ResourceKind::Deployment.rank() < ResourceKind::Service.rank());
        assert!(ResourceKind::Service.rank() < ResourceKind::Ingress.rank());
        assert_eq!(ResourceKind::ConfigMap.rank(), ResourceKind::Secret.rank());
        assert!(ResourceKind::Other("CronTab".into()).rank() > ResourceKind::Ingress.rank());
    }

    #[test]
    fn test_kind_round_trip() {
        let kind = ResourceKind::from("Deployment".to_string());
        assert_eq!(kind, ResourceKind::Deployment);
        assert_eq!(String::from(kind), "Deployment");

        let custom = ResourceKind::from("CronTab".to_string());
        assert_eq!(custom, ResourceKind::Other("CronTab".into()));
    }

    #[test]
    fn test_resource_id_display() {
        let id = ResourceId::new(ResourceKind::Service, "default", "web");
        assert_eq!(id.to_string(), "Service/default/web");
    }

    #[test]
    fn test_snapshot_completeness() {
        let mut snapshot = LiveSnapshot::new("default");
        assert!(snapshot.complete);
        assert!(snapshot.is_empty());

        let id = ResourceId::new(ResourceKind::Deployment, "default", "web");
        snapshot.insert(LiveResource::new(id.clone(), serde_json::json!({"replicas": 2})));
        assert!(snapshot.contains(&id));
        assert_eq!(snapshot.len(), 1);

        snapshot.mark_incomplete();
        assert!(!snapshot.complete);
    }
}
