//! Manifest source contract and in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use varuna_core::{Error, Result};
use varuna_cluster::DesiredResource;

use crate::types::{ManifestTree, Revision};

/// Contract for a version-controlled manifest source.
///
/// `fetch` must be idempotent for a fixed revision: repeated fetches yield a
/// byte-identical tree. Side effects are limited to local caching.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch the complete desired-state tree at a revision reference.
    async fn fetch(&self, reference: &str) -> Result<ManifestTree>;
}

/// In-memory manifest source for tests and local simulation.
///
/// Trees are keyed by revision reference; each fetch restamps the stored
/// declarations with the computed revision so the fetched tree is
/// self-describing.
#[derive(Default)]
pub struct InMemorySource {
    trees: RwLock<HashMap<String, Vec<DesiredResource>>>,
    unavailable: AtomicBool,
}

impl InMemorySource {
    /// Create a new empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the desired resources for a revision reference.
    pub async fn put(&self, reference: impl Into<String>, resources: Vec<DesiredResource>) {
        self.trees.write().await.insert(reference.into(), resources);
    }

    /// Toggle simulated source unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }
}

/// Content digest over declarations, hex-encoded.
pub(crate) fn digest_of(parts: impl Iterator<Item = Vec<u8>>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(&part);
    }
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl ManifestSource for InMemorySource {
    async fn fetch(&self, reference: &str) -> Result<ManifestTree> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(Error::source_unavailable("source marked unavailable"));
        }

        let trees = self.trees.read().await;
        let resources = trees
            .get(reference)
            .ok_or_else(|| Error::source_unavailable(format!("unknown revision '{reference}'")))?;

        let digest = digest_of(
            resources
                .iter()
                .map(|r| format!("{}\n{}", r.id, r.spec).into_bytes()),
        );
        let revision = Revision::new(reference, digest);

        let stamped = resources
            .iter()
            .map(|r| DesiredResource::new(r.id.clone(), r.spec.clone(), revision.short()))
            .collect();

        ManifestTree::new(revision, stamped)
    }
}
