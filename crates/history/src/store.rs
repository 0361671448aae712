//! Run store trait and in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use varuna_core::Result;

use crate::types::{ReconciliationRun, RunId};

/// Query parameters for run retrieval.
#[derive(Debug, Clone, Default)]
pub struct RunQuery {
    /// Filter by namespace.
    pub namespace: Option<String>,
    /// Filter by observed revision.
    pub revision: Option<String>,
    /// Filter runs started after this timestamp.
    pub after: Option<DateTime<Utc>>,
    /// Filter runs started before this timestamp.
    pub before: Option<DateTime<Utc>>,
    /// Limit the number of results.
    pub limit: Option<usize>,
}

impl RunQuery {
    /// Create a new query builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Filter by observed revision.
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Filter runs started after this timestamp.
    pub fn after(mut self, timestamp: DateTime<Utc>) -> Self {
        self.after = Some(timestamp);
        self
    }

    /// Filter runs started before this timestamp.
    pub fn before(mut self, timestamp: DateTime<Utc>) -> Self {
        self.before = Some(timestamp);
        self
    }

    /// Limit the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply filters to runs using iterator combinators.
    pub fn filter_runs<'a>(
        &'a self,
        runs: impl Iterator<Item = &'a ReconciliationRun> + 'a,
    ) -> impl Iterator<Item = &'a ReconciliationRun> + 'a {
        runs.filter(move |run| {
            if let Some(ref namespace) = self.namespace {
                if &run.namespace != namespace {
                    return false;
                }
            }
            if let Some(ref revision) = self.revision {
                if &run.revision != revision {
                    return false;
                }
            }
            if let Some(ref after) = self.after {
                if run.started_at <= *after {
                    return false;
                }
            }
            if let Some(ref before) = self.before {
                if run.started_at >= *before {
                    return false;
                }
            }
            true
        })
        .take(self.limit.unwrap_or(usize::MAX))
    }
}

/// Trait for run storage backends.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Record a finished run. Records are immutable once stored.
    async fn record(&self, run: ReconciliationRun) -> Result<RunId>;

    /// Retrieve runs matching a query, oldest first.
    async fn query(&self, query: &RunQuery) -> Result<Vec<ReconciliationRun>>;

    /// The most recent run for a namespace, if any.
    async fn latest(&self, namespace: &str) -> Result<Option<ReconciliationRun>>;

    /// Total number of recorded runs.
    async fn count(&self) -> Result<usize>;
}

/// In-memory run store.
#[derive(Default)]
pub struct InMemoryRunStore {
    runs: RwLock<Vec<ReconciliationRun>>,
    revision_index: RwLock<HashMap<String, Vec<usize>>>,
}

impl InMemoryRunStore {
    /// Create a new in-memory run store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn record(&self, run: ReconciliationRun) -> Result<RunId> {
        let run_id = run.id;
        let revision = run.revision.clone();

        let mut runs = self.runs.write().await;
        let index = runs.len();
        runs.push(run);

        // Update revision index
        let mut revision_index = self.revision_index.write().await;
        revision_index.entry(revision).or_default().push(index);

        Ok(run_id)
    }

    async fn query(&self, query: &RunQuery) -> Result<Vec<ReconciliationRun>> {
        let runs = self.runs.read().await;

        // A revision-only query can use the index instead of a full scan.
        if let Some(ref revision) = query.revision {
            let revision_index = self.revision_index.read().await;
            let indices = revision_index.get(revision).cloned().unwrap_or_default();
            let selected: Vec<&ReconciliationRun> =
                indices.iter().filter_map(|i| runs.get(*i)).collect();
            return Ok(query
                .filter_runs(selected.into_iter())
                .cloned()
                .collect());
        }

        Ok(query.filter_runs(runs.iter()).cloned().collect())
    }

    async fn latest(&self, namespace: &str) -> Result<Option<ReconciliationRun>> {
        let runs = self.runs.read().await;
        Ok(runs
            .iter()
            .rev()
            .find(|run| run.namespace == namespace)
            .cloned())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.runs.read().await.len())
    }
}
