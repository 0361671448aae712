//! In-memory cluster for tests and local simulation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use varuna_core::{Error, Result};

use crate::api::ClusterApi;
use crate::types::{DesiredResource, LiveResource, ResourceId, ResourceKind};

/// Which platform operation a fault rule intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    List,
    Apply,
    Delete,
}

/// What a fault rule matches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultTarget {
    /// A specific resource identity.
    Resource(ResourceId),
    /// Every resource of a kind.
    Kind(ResourceKind),
    /// Every operation of the matched op.
    Any,
}

impl FaultTarget {
    fn matches_id(&self, id: &ResourceId) -> bool {
        match self {
            Self::Resource(target) => target == id,
            Self::Kind(kind) => *kind == id.kind,
            Self::Any => true,
        }
    }

    fn matches_kind(&self, kind: Option<&ResourceKind>) -> bool {
        match self {
            Self::Resource(target) => kind.is_none_or(|k| *k == target.kind),
            Self::Kind(target) => kind.is_none_or(|k| k == target),
            Self::Any => true,
        }
    }
}

/// The error class a fault rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Unreachable,
    Conflict,
    Denied,
}

impl FaultKind {
    fn to_error(self, subject: &str) -> Error {
        match self {
            Self::Unreachable => Error::platform_unreachable(format!("injected fault on {subject}")),
            Self::Conflict => Error::apply_conflict(subject, "injected concurrent modification"),
            Self::Denied => Error::permission_denied(subject, "injected RBAC denial"),
        }
    }
}

/// One injectable fault.
#[derive(Debug, Clone)]
pub struct FaultRule {
    pub op: FaultOp,
    pub target: FaultTarget,
    pub kind: FaultKind,
    /// How many times the rule fires; `None` fires forever.
    pub remaining: Option<u32>,
}

impl FaultRule {
    /// Deny every apply of a specific identity.
    pub fn deny_apply(id: ResourceId) -> Self {
        Self {
            op: FaultOp::Apply,
            target: FaultTarget::Resource(id),
            kind: FaultKind::Denied,
            remaining: None,
        }
    }

    /// Conflict on apply of a specific identity, `times` times.
    pub fn conflict_apply(id: ResourceId, times: u32) -> Self {
        Self {
            op: FaultOp::Apply,
            target: FaultTarget::Resource(id),
            kind: FaultKind::Conflict,
            remaining: Some(times),
        }
    }

    /// Fail apply of a specific identity with unreachable, `times` times.
    pub fn flaky_apply(id: ResourceId, times: u32) -> Self {
        Self {
            op: FaultOp::Apply,
            target: FaultTarget::Resource(id),
            kind: FaultKind::Unreachable,
            remaining: Some(times),
        }
    }

    /// Fail every listing of a kind.
    pub fn fail_list(kind: ResourceKind) -> Self {
        Self {
            op: FaultOp::List,
            target: FaultTarget::Kind(kind),
            kind: FaultKind::Unreachable,
            remaining: None,
        }
    }

    /// Fail every listing, regardless of kind.
    pub fn fail_all_lists() -> Self {
        Self {
            op: FaultOp::List,
            target: FaultTarget::Any,
            kind: FaultKind::Unreachable,
            remaining: None,
        }
    }
}

/// In-memory implementation of [`ClusterApi`].
///
/// Backs tests and the local simulation target. Fault rules let tests
/// exercise retry, skip and incomplete-snapshot paths without a real
/// platform.
#[derive(Default)]
pub struct InMemoryCluster {
    resources: RwLock<HashMap<ResourceId, LiveResource>>,
    faults: RwLock<Vec<FaultRule>>,
}

impl InMemoryCluster {
    /// Create a new empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a live resource directly, bypassing the apply path.
    pub async fn seed(&self, resource: LiveResource) {
        self.resources
            .write()
            .await
            .insert(resource.id.clone(), resource);
    }

    /// Register a fault rule.
    pub async fn inject_fault(&self, rule: FaultRule) {
        self.faults.write().await.push(rule);
    }

    /// Drop all fault rules.
    pub async fn clear_faults(&self) {
        self.faults.write().await.clear();
    }

    /// Get a live resource by identity.
    pub async fn get(&self, id: &ResourceId) -> Option<LiveResource> {
        self.resources.read().await.get(id).cloned()
    }

    /// Check whether an identity exists.
    pub async fn contains(&self, id: &ResourceId) -> bool {
        self.resources.read().await.contains_key(id)
    }

    /// Number of live resources.
    pub async fn len(&self) -> usize {
        self.resources.read().await.len()
    }

    /// Check if the cluster holds no resources.
    pub async fn is_empty(&self) -> bool {
        self.resources.read().await.is_empty()
    }

    /// Consume a matching fault, if any. Rules with a count decrement on
    /// each hit and stop firing at zero.
    async fn check_fault(
        &self,
        op: FaultOp,
        id: Option<&ResourceId>,
        kind: Option<&ResourceKind>,
    ) -> Result<()> {
        let mut faults = self.faults.write().await;
        for rule in faults.iter_mut() {
            if rule.op != op {
                continue;
            }
            let matched = match id {
                Some(id) => rule.target.matches_id(id),
                None => rule.target.matches_kind(kind),
            };
            if !matched {
                continue;
            }
            match rule.remaining {
                Some(0) => continue,
                Some(ref mut n) => *n -= 1,
                None => {}
            }
            let subject = id.map_or_else(
                || kind.map_or_else(|| "list".to_string(), ToString::to_string),
                ToString::to_string,
            );
            debug!(op = ?op, subject = %subject, "Fault rule fired");
            return Err(rule.kind.to_error(&subject));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    async fn list(
        &self,
        namespace: &str,
        kind: Option<&ResourceKind>,
    ) -> Result<Vec<LiveResource>> {
        self.check_fault(FaultOp::List, None, kind).await?;

        // Namespace resources carry their own name as their namespace, so a
        // plain field match covers cluster-scoped kinds too.
        let resources = self.resources.read().await;
        let mut listed: Vec<LiveResource> = resources
            .values()
            .filter(|r| r.id.namespace == namespace)
            .filter(|r| kind.is_none_or(|k| r.id.kind == *k))
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listed)
    }

    async fn apply(&self, desired: &DesiredResource) -> Result<LiveResource> {
        self.check_fault(FaultOp::Apply, Some(&desired.id), None).await?;

        let live = LiveResource::new(desired.id.clone(), desired.spec.clone());
        self.resources
            .write()
            .await
            .insert(desired.id.clone(), live.clone());
        Ok(live)
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        self.check_fault(FaultOp::Delete, Some(id), None).await?;

        match self.resources.write().await.remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::resource_not_found(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn deployment(name: &str) -> DesiredResource {
        DesiredResource::new(
            ResourceId::new(ResourceKind::Deployment, "default", name),
            json!({"replicas": 2}),
            "rev-1",
        )
    }

    #[tokio::test]
    async fn test_apply_is_upsert() {
        let cluster = InMemoryCluster::new();
        let desired = deployment("web");

        cluster.apply(&desired).await.unwrap();
        cluster.apply(&desired).await.unwrap();

        assert_eq!(cluster.len().await, 1);
        let live = cluster.get(&desired.id).await.unwrap();
        assert_eq!(live.spec, desired.spec);
    }

    #[tokio::test]
    async fn test_delete_missing_reports_not_found() {
        let cluster = InMemoryCluster::new();
        let id = ResourceId::new(ResourceKind::Service, "default", "ghost");

        let err = cluster.delete(&id).await.unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_filters_namespace_and_kind() {
        let cluster = InMemoryCluster::new();
        cluster.apply(&deployment("web")).await.unwrap();
        cluster
            .apply(&DesiredResource::new(
                ResourceId::new(ResourceKind::Service, "default", "web"),
                json!({"port": 80}),
                "rev-1",
            ))
            .await
            .unwrap();
        cluster
            .apply(&DesiredResource::new(
                ResourceId::new(ResourceKind::Deployment, "staging", "api"),
                json!({"replicas": 1}),
                "rev-1",
            ))
            .await
            .unwrap();

        let all = cluster.list("default", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let deployments = cluster
            .list("default", Some(&ResourceKind::Deployment))
            .await
            .unwrap();
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].id.name, "web");
    }

    #[tokio::test]
    async fn test_counted_fault_expires() {
        let cluster = InMemoryCluster::new();
        let desired = deployment("web");
        cluster
            .inject_fault(FaultRule::flaky_apply(desired.id.clone(), 2))
            .await;

        assert!(cluster.apply(&desired).await.is_err());
        assert!(cluster.apply(&desired).await.is_err());
        assert!(cluster.apply(&desired).await.is_ok());
    }

    #[tokio::test]
    async fn test_deny_fault_is_permanent() {
        let cluster = InMemoryCluster::new();
        let desired = deployment("web");
        cluster
            .inject_fault(FaultRule::deny_apply(desired.id.clone()))
            .await;

        for _ in 0..3 {
            let err = cluster.apply(&desired).await.unwrap_err();
            assert!(matches!(err, Error::PermissionDenied { .. }));
        }
    }
}
