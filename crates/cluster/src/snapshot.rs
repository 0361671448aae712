//! Live-state snapshotting.

use std::sync::Arc;

use tracing::{debug, warn};
use varuna_core::{Error, Result};

use crate::api::ClusterApi;
use crate::types::{LiveSnapshot, ResourceKind};

/// Takes per-cycle snapshots of a namespace's live state.
///
/// Listings run kind-by-kind so a single failing kind degrades the snapshot
/// to incomplete instead of silently dropping resources. Only when nothing
/// at all can be listed is the cycle aborted with `PlatformUnreachable`.
pub struct Snapshotter {
    api: Arc<dyn ClusterApi>,
}

impl Snapshotter {
    /// Create a new snapshotter over a platform API.
    pub fn new(api: Arc<dyn ClusterApi>) -> Self {
        Self { api }
    }

    /// Snapshot the current live state of a namespace.
    ///
    /// `kinds` scopes the listing; an empty slice means all known kinds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PlatformUnreachable`] when every listing fails.
    pub async fn snapshot(
        &self,
        namespace: &str,
        kinds: &[ResourceKind],
    ) -> Result<LiveSnapshot> {
        let known = ResourceKind::known();
        let kinds: &[ResourceKind] = if kinds.is_empty() { &known } else { kinds };

        let mut snapshot = LiveSnapshot::new(namespace);
        let mut first_error: Option<Error> = None;
        let mut any_listed = false;

        for kind in kinds {
            match self.api.list(namespace, Some(kind)).await {
                Ok(resources) => {
                    any_listed = true;
                    debug!(namespace, kind = %kind, count = resources.len(), "Listed kind");
                    for resource in resources {
                        snapshot.insert(resource);
                    }
                }
                Err(e) => {
                    warn!(namespace, kind = %kind, error = %e, "Kind listing failed, snapshot degraded");
                    snapshot.mark_incomplete();
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match (any_listed, first_error) {
            // Nothing could be listed at all: fail closed rather than hand
            // back an empty snapshot that looks like an empty namespace.
            (false, Some(e)) => Err(Error::platform_unreachable(format!(
                "no kind could be listed in '{namespace}': {e}"
            ))),
            _ => Ok(snapshot),
        }
    }
}
