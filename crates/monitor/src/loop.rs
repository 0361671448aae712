//! The reconciliation loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use varuna_cluster::{ClusterApi, DesiredResource, LiveSnapshot, ResourceKind, Snapshotter};
use varuna_core::{Error, Result};
use varuna_history::{ReconciliationRun, RunStatus, RunStore};
use varuna_reconciler::{diff, DiffOptions, ExecutorConfig, SyncExecutor, SyncReport};
use varuna_source::ManifestSource;

use crate::control::LoopControl;
use crate::state::LoopState;

/// Configuration for one namespace's loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// The managed namespace.
    pub namespace: String,
    /// Revision reference fetched from the manifest source.
    pub reference: String,
    /// Kinds to snapshot; empty means all known kinds.
    pub kinds: Vec<ResourceKind>,
    /// Diff policy (prune).
    pub diff: DiffOptions,
    /// Sync executor settings.
    pub executor: ExecutorConfig,
    /// Cadence of periodic resync (the self-heal interval).
    pub resync_interval: Duration,
    /// Pause after a cycle settles or fails before going idle.
    pub cooldown: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            reference: "main".to_string(),
            kinds: Vec::new(),
            diff: DiffOptions::default(),
            executor: ExecutorConfig::default(),
            resync_interval: Duration::from_secs(30),
            cooldown: Duration::from_secs(1),
        }
    }
}

/// Watch-diff-sync loop for one managed namespace.
///
/// Exactly one cycle runs at a time; ticks and change signals arriving
/// mid-cycle coalesce into a single deferred cycle. Independent namespaces
/// run independent loops that share only the run store.
pub struct ReconciliationLoop {
    source: Arc<dyn ManifestSource>,
    snapshotter: Snapshotter,
    executor: SyncExecutor,
    store: Arc<dyn RunStore>,
    config: LoopConfig,
    control: Arc<LoopControl>,
}

impl ReconciliationLoop {
    /// Create a loop over a manifest source, platform API and run store.
    pub fn new(
        source: Arc<dyn ManifestSource>,
        api: Arc<dyn ClusterApi>,
        store: Arc<dyn RunStore>,
        config: LoopConfig,
    ) -> Self {
        Self {
            source,
            snapshotter: Snapshotter::new(api.clone()),
            executor: SyncExecutor::new(api, config.executor.clone()),
            store,
            config,
            control: Arc::new(LoopControl::new()),
        }
    }

    /// The control handle for this loop.
    pub fn control(&self) -> Arc<LoopControl> {
        Arc::clone(&self.control)
    }

    /// The loop's configuration.
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Run until shutdown. Cycles fire on the resync cadence and on
    /// triggers; the first cycle fires immediately.
    pub async fn run(&self) {
        info!(
            namespace = %self.config.namespace,
            reference = %self.config.reference,
            resync_secs = self.config.resync_interval.as_secs(),
            prune = self.config.diff.prune,
            "Reconciliation loop started"
        );

        let mut ticker = tokio::time::interval(self.config.resync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let triggered: Pin<Box<dyn Future<Output = ()> + Send + '_>> =
                Box::pin(self.control.triggered());
            tokio::select! {
                _ = ticker.tick() => {}
                () = triggered => {}
            }

            if self.control.is_stopping() {
                break;
            }
            if self.control.is_paused() {
                debug!(namespace = %self.config.namespace, "Paused, ignoring tick");
                continue;
            }

            if let Err(e) = self.run_once().await {
                error!(namespace = %self.config.namespace, error = %e, "Cycle could not be recorded");
            }

            // Cooldown before returning to Idle; shutdown interrupts via the
            // next select round.
            tokio::time::sleep(self.config.cooldown).await;
            self.control.set_state(LoopState::Idle).await;
        }

        info!(namespace = %self.config.namespace, "Reconciliation loop stopped");
    }

    /// Run exactly one fetch-diff-sync cycle and record it.
    ///
    /// Fetch and snapshot failures fail closed: no diff is computed on
    /// incomplete inputs and nothing is mutated.
    ///
    /// # Errors
    ///
    /// Returns an error only when the run record cannot be stored; cycle
    /// failures are captured in the returned run's status.
    pub async fn run_once(&self) -> Result<ReconciliationRun> {
        let started_at = Utc::now();

        // One-shot callers skip the scheduler; fold a terminal state back to
        // Idle before starting the next cycle.
        if matches!(
            self.control.state().await,
            LoopState::Settled | LoopState::Failed
        ) {
            self.control.set_state(LoopState::Idle).await;
        }
        self.control.set_state(LoopState::Fetching).await;
        debug!(namespace = %self.config.namespace, "Cycle started");

        // Independent reads, so they may proceed in parallel.
        let snapshot_fut: Pin<Box<dyn Future<Output = Result<LiveSnapshot>> + Send + '_>> =
            Box::pin(
                self.snapshotter
                    .snapshot(&self.config.namespace, &self.config.kinds),
            );
        let (tree, snapshot) = tokio::join!(self.source.fetch(&self.config.reference), snapshot_fut);

        let (tree, snapshot) = match (tree, snapshot) {
            (Ok(tree), Ok(snapshot)) => (tree, snapshot),
            (Err(e), _) => {
                return self
                    .fail_early(self.config.reference.clone(), started_at, &e)
                    .await
            }
            (Ok(tree), Err(e)) => {
                return self.fail_early(tree.revision.short(), started_at, &e).await
            }
        };

        self.control.set_state(LoopState::Diffing).await;
        let desired: Vec<DesiredResource> = tree
            .in_namespace(&self.config.namespace)
            .into_iter()
            .cloned()
            .collect();
        let plan = diff(
            &tree.revision.short(),
            &desired,
            &snapshot,
            &self.config.diff,
        );

        let report = if plan.has_changes() {
            self.control.set_state(LoopState::Syncing).await;
            self.executor
                .execute_with_cancel(&plan, self.control.cancel_receiver())
                .await
        } else {
            SyncReport::default()
        };

        let run = ReconciliationRun::completed(
            self.config.namespace.clone(),
            started_at,
            &plan,
            &report,
        );
        let end_state = match run.status {
            RunStatus::Failed | RunStatus::Aborted => LoopState::Failed,
            RunStatus::Settled | RunStatus::Succeeded => LoopState::Settled,
        };
        self.control.set_state(end_state).await;
        info!(
            namespace = %self.config.namespace,
            revision = %run.revision,
            status = %run.status,
            summary = %plan.summary(),
            "Cycle finished"
        );

        self.store.record(run.clone()).await?;
        Ok(run)
    }

    async fn fail_early(
        &self,
        revision: String,
        started_at: chrono::DateTime<Utc>,
        error: &Error,
    ) -> Result<ReconciliationRun> {
        warn!(
            namespace = %self.config.namespace,
            error = %error,
            "Cycle aborted before any mutation"
        );
        self.control.set_state(LoopState::Failed).await;

        let run = ReconciliationRun::failed_early(
            self.config.namespace.clone(),
            revision,
            started_at,
            error.to_string(),
        );
        self.store.record(run.clone()).await?;
        Ok(run)
    }
}
