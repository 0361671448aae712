//! Platform API contract.

use async_trait::async_trait;
use varuna_core::Result;

use crate::types::{DesiredResource, LiveResource, ResourceId, ResourceKind};

/// Narrow contract the reconciler consumes from the target platform.
///
/// Implementations are expected to be safe to call concurrently. `apply` has
/// upsert semantics: re-applying a resource that already matches the desired
/// document must succeed rather than error, so a partially-applied plan can
/// be re-invoked.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List resources in a namespace, optionally filtered by kind.
    async fn list(
        &self,
        namespace: &str,
        kind: Option<&ResourceKind>,
    ) -> Result<Vec<LiveResource>>;

    /// Create or update a resource to match the desired document.
    async fn apply(&self, desired: &DesiredResource) -> Result<LiveResource>;

    /// Delete a resource by identity.
    ///
    /// # Errors
    ///
    /// Returns [`varuna_core::Error::ResourceNotFound`] when the identity is
    /// already absent; callers that only care the resource is gone treat
    /// that as a no-op.
    async fn delete(&self, id: &ResourceId) -> Result<()>;
}
