//! Revision and manifest-tree types.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use varuna_core::{Error, Result};
use varuna_cluster::{DesiredResource, ResourceId};

/// A revision pointer plus the content digest of the tree fetched at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// The caller-supplied revision reference (branch, tag, pin).
    pub reference: String,
    /// sha256 digest of the manifest tree content, hex-encoded.
    pub digest: String,
}

impl Revision {
    /// Create a new revision.
    pub fn new(reference: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            digest: digest.into(),
        }
    }

    /// Short form used in resource records and log lines.
    pub fn short(&self) -> String {
        let digest = self.digest.get(..12).unwrap_or(&self.digest);
        format!("{}@{digest}", self.reference)
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.reference, self.digest)
    }
}

/// The complete ordered set of desired resources at one revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestTree {
    /// Revision the tree was fetched at.
    pub revision: Revision,
    /// Desired resources, in source order.
    resources: Vec<DesiredResource>,
}

impl ManifestTree {
    /// Build a tree, rejecting duplicate identities.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParseError`] when two documents declare the same
    /// identity tuple.
    pub fn new(revision: Revision, resources: Vec<DesiredResource>) -> Result<Self> {
        let mut seen: HashSet<&ResourceId> = HashSet::new();
        for resource in &resources {
            if !seen.insert(&resource.id) {
                return Err(Error::parse_error(
                    revision.short(),
                    format!("duplicate resource identity '{}'", resource.id),
                ));
            }
        }
        Ok(Self {
            revision,
            resources,
        })
    }

    /// All desired resources, in source order.
    pub fn resources(&self) -> &[DesiredResource] {
        &self.resources
    }

    /// Desired resources scoped to one namespace.
    pub fn in_namespace(&self, namespace: &str) -> Vec<&DesiredResource> {
        self.resources
            .iter()
            .filter(|r| r.id.namespace == namespace)
            .collect()
    }

    /// Look up a declaration by identity.
    pub fn get(&self, id: &ResourceId) -> Option<&DesiredResource> {
        self.resources.iter().find(|r| &r.id == id)
    }

    /// Number of declared resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if the tree declares nothing.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;
    use varuna_cluster::ResourceKind;

    fn resource(name: &str) -> DesiredResource {
        DesiredResource::new(
            ResourceId::new(ResourceKind::Deployment, "default", name),
            json!({"replicas": 1}),
            "main@abc",
        )
    }

    #[test]
    fn test_revision_short_form() {
        let revision = Revision::new("main", "0123456789abcdef0123");
        assert_eq!(revision.short(), "main@0123456789ab");
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let revision = Revision::new("main", "abc");
        let err = ManifestTree::new(revision, vec![resource("web"), resource("web")]).unwrap_err();
        assert!(err.to_string().contains("duplicate resource identity"));
    }

    #[test]
    fn test_namespace_scoping() {
        let revision = Revision::new("main", "abc");
        let mut other = resource("api");
        other.id.namespace = "staging".into();
        let tree = ManifestTree::new(revision, vec![resource("web"), other]).unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.in_namespace("default").len(), 1);
        assert_eq!(tree.in_namespace("staging").len(), 1);
    }
}
