//! Sync execution: apply an ordered plan against the platform.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use itertools::Itertools;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use varuna_cluster::{ClusterApi, DesiredResource, ResourceId};
use varuna_core::Error;

use crate::types::{DiffEntry, DiffPlan, ExecutorConfig, SyncReport, SyncResult};

/// Applies diff plans against a platform API.
///
/// Entries of equal dependency rank run concurrently up to the configured
/// worker count; rank groups are serialized. Once a group records a failure,
/// dependent groups (higher rank for creates/updates, lower rank for
/// deletes) are skipped rather than attempted against missing prerequisites.
/// Cancellation is honored at entry boundaries only, so live state is always
/// consistent with some prefix of the plan.
pub struct SyncExecutor {
    api: Arc<dyn ClusterApi>,
    config: ExecutorConfig,
}

impl SyncExecutor {
    /// Create a new executor over a platform API.
    pub fn new(api: Arc<dyn ClusterApi>, config: ExecutorConfig) -> Self {
        Self { api, config }
    }

    /// Apply a plan to completion.
    pub async fn execute(&self, plan: &DiffPlan) -> SyncReport {
        let (_tx, rx) = watch::channel(false);
        self.execute_with_cancel(plan, rx).await
    }

    /// Apply a plan, stopping at the next entry boundary once `cancel`
    /// becomes true. In-flight applies always run to completion.
    pub async fn execute_with_cancel(
        &self,
        plan: &DiffPlan,
        cancel: watch::Receiver<bool>,
    ) -> SyncReport {
        info!(
            namespace = %plan.namespace,
            revision = %plan.revision,
            entries = plan.entries.len(),
            "Executing sync plan"
        );

        // Consecutive entries sharing (delete-ness, rank) form one
        // concurrently-applied group; plan ordering guarantees groups arrive
        // prerequisite-first.
        let chunked = plan
            .entries
            .iter()
            .enumerate()
            .chunk_by(|(_, entry)| (entry.is_delete(), entry.rank()));
        let mut groups = Vec::new();
        for ((is_delete, rank), group) in &chunked {
            groups.push((is_delete, rank, group.collect_vec()));
        }

        let mut indexed: Vec<(usize, SyncResult)> = Vec::with_capacity(plan.entries.len());
        let mut failed_upsert_rank: Option<u8> = None;
        let mut failed_delete_rank: Option<u8> = None;
        let mut cancelled = false;

        for (is_delete, rank, group) in groups {
            if *cancel.borrow() {
                cancelled = true;
                break;
            }

            let skip_reason = if is_delete {
                failed_delete_rank
                    .filter(|failed| *failed > rank)
                    .map(|failed| format!("delete of dependent rank {failed} failed"))
            } else {
                failed_upsert_rank
                    .filter(|failed| *failed < rank)
                    .map(|failed| format!("prerequisite of rank {failed} failed"))
            };

            if let Some(reason) = skip_reason {
                for (index, entry) in group {
                    match entry {
                        DiffEntry::NoOp { id } => {
                            indexed.push((index, SyncResult::noop(id.clone(), 0)));
                        }
                        _ => {
                            warn!(resource = %entry.id(), verb = entry.verb(), %reason, "Skipping entry");
                            indexed.push((
                                index,
                                SyncResult::skipped(entry.id().clone(), reason.clone()),
                            ));
                        }
                    }
                }
                continue;
            }

            let mut group_futs: Vec<
                Pin<Box<dyn Future<Output = (usize, Option<SyncResult>)> + Send + '_>>,
            > = Vec::new();
            for (index, entry) in group {
                let cancel = cancel.clone();
                group_futs.push(Box::pin(async move {
                    if *cancel.borrow() {
                        return (index, None);
                    }
                    (index, Some(self.apply_entry(entry).await))
                }));
            }
            let group_results: Vec<(usize, Option<SyncResult>)> = stream::iter(group_futs)
                .buffer_unordered(self.config.workers.max(1))
                .collect()
                .await;

            let mut group_failed = false;
            for (index, result) in group_results {
                match result {
                    Some(result) => {
                        group_failed |= result.outcome.is_failure();
                        indexed.push((index, result));
                    }
                    None => cancelled = true,
                }
            }

            if group_failed {
                // Groups are rank-ordered, so the first failing group pins
                // the boundary past which dependents are skipped.
                if is_delete {
                    failed_delete_rank.get_or_insert(rank);
                } else {
                    failed_upsert_rank.get_or_insert(rank);
                }
            }

            if cancelled {
                break;
            }
        }

        indexed.sort_by_key(|(index, _)| *index);
        let report = SyncReport {
            results: indexed.into_iter().map(|(_, result)| result).collect(),
            cancelled,
        };
        info!(
            namespace = %plan.namespace,
            failed = report.failed_count(),
            skipped = report.skipped_count(),
            cancelled = report.cancelled,
            "Sync plan finished"
        );
        report
    }

    /// Resolve a single entry, retrying transient failures.
    async fn apply_entry(&self, entry: &DiffEntry) -> SyncResult {
        debug!(resource = %entry.id(), verb = entry.verb(), "Applying entry");
        match entry {
            DiffEntry::NoOp { id } => SyncResult::noop(id.clone(), 0),
            DiffEntry::Create { desired } | DiffEntry::Update { desired, .. } => {
                self.apply_with_retry(desired).await
            }
            DiffEntry::Delete { live } => self.delete_with_retry(&live.id).await,
        }
    }

    async fn apply_with_retry(&self, desired: &DesiredResource) -> SyncResult {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.api.apply(desired).await {
                Ok(_) => return SyncResult::applied(desired.id.clone(), attempt),
                Err(e) if !e.is_transient() => {
                    warn!(resource = %desired.id, attempt, error = %e, "Apply failed fatally");
                    return SyncResult::fatal(desired.id.clone(), attempt, e.to_string());
                }
                Err(e) if attempt >= self.config.max_attempts => {
                    warn!(resource = %desired.id, attempt, error = %e, "Apply retries exhausted");
                    return SyncResult::exhausted(desired.id.clone(), attempt, e.to_string());
                }
                Err(e) => {
                    let backoff = self.backoff_for(attempt);
                    debug!(resource = %desired.id, attempt, backoff_ms = backoff.as_millis() as u64, error = %e, "Apply failed, backing off");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn delete_with_retry(&self, id: &ResourceId) -> SyncResult {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.api.delete(id).await {
                Ok(()) => return SyncResult::applied(id.clone(), attempt),
                // Already gone: the declared intent holds.
                Err(Error::ResourceNotFound { .. }) => {
                    return SyncResult::noop(id.clone(), attempt)
                }
                Err(e) if !e.is_transient() => {
                    warn!(resource = %id, attempt, error = %e, "Delete failed fatally");
                    return SyncResult::fatal(id.clone(), attempt, e.to_string());
                }
                Err(e) if attempt >= self.config.max_attempts => {
                    warn!(resource = %id, attempt, error = %e, "Delete retries exhausted");
                    return SyncResult::exhausted(id.clone(), attempt, e.to_string());
                }
                Err(e) => {
                    let backoff = self.backoff_for(attempt);
                    debug!(resource = %id, attempt, error = %e, "Delete failed, backing off");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Exponential backoff for the given completed attempt count, capped.
    fn backoff_for(&self, attempt: u32) -> std::time::Duration {
        let factor = 1u32 << (attempt.saturating_sub(1)).min(16);
        self.config
            .base_backoff
            .saturating_mul(factor)
            .min(self.config.max_backoff)
    }
}
