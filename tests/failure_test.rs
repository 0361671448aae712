//! Integration tests for failure and prune scenarios.
//!
//! These tests verify that:
//! - A denied prerequisite skips its dependents and fails the cycle
//! - Failures are recorded in the run, never swallowed
//! - Pruning deletes strays in reverse dependency-rank order

#![forbid(clippy::unwrap_used)]
#![forbid(clippy::expect_used)]
#![forbid(clippy::panic)]

use std::path::Path;
use std::sync::Arc;

use varuna_cluster::{
    ClusterApi, DesiredResource, FaultRule, InMemoryCluster, ResourceId, ResourceKind,
};
use varuna_history::{InMemoryRunStore, RunStatus, RunStore};
use varuna_monitor::{LoopConfig, ReconciliationLoop};
use varuna_reconciler::{DiffOptions, SyncOutcome};
use varuna_source::DirSource;

fn write_manifest(root: &Path, rel: &str, text: &str) -> Result<(), std::io::Error> {
    std::fs::write(root.join(rel), text)
}

/// # GIVEN
/// A manifest declaring NamespaceX and a Deployment inside it, with the
/// platform denying the Namespace create
///
/// # WHEN
/// One reconciliation cycle runs
///
/// # THEN
/// The Namespace entry is fatal, the Deployment is recorded as
/// SkippedDueToDependencyFailure, and the cycle ends Failed
#[tokio::test]
async fn test_denied_namespace_skips_deployment() -> Result<(), Box<dyn std::error::Error>> {
    // GIVEN
    let dir = tempfile::tempdir()?;
    write_manifest(
        dir.path(),
        "stack.yaml",
        "kind: Namespace\nmetadata:\n  name: default\n---\n\
kind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 2\n",
    )?;
    let source = Arc::new(DirSource::new(dir.path(), "default"));
    let cluster = Arc::new(InMemoryCluster::new());
    let store = Arc::new(InMemoryRunStore::new());

    let namespace_id = ResourceId::new(ResourceKind::Namespace, "default", "default");
    cluster
        .inject_fault(FaultRule::deny_apply(namespace_id.clone()))
        .await;

    // WHEN
    let looper = ReconciliationLoop::new(
        source,
        cluster.clone(),
        store.clone(),
        LoopConfig::default(),
    );
    let run = looper.run_once().await?;

    // THEN
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.results_match_entries());

    let namespace_result = run
        .results
        .iter()
        .find(|r| r.id == namespace_id)
        .ok_or("namespace result missing")?;
    assert_eq!(namespace_result.outcome, SyncOutcome::Fatal);
    assert!(namespace_result.error.is_some(), "failures must be surfaced");

    let deployment_id = ResourceId::new(ResourceKind::Deployment, "default", "web");
    let deployment_result = run
        .results
        .iter()
        .find(|r| r.id == deployment_id)
        .ok_or("deployment result missing")?;
    assert_eq!(
        deployment_result.outcome,
        SyncOutcome::SkippedDueToDependencyFailure
    );
    assert!(!cluster.contains(&deployment_id).await);

    // The failure is retained for operator inspection
    let latest = store.latest("default").await?.ok_or("run not recorded")?;
    assert_eq!(latest.status, RunStatus::Failed);
    Ok(())
}

/// # GIVEN
/// A live Deployment and Service with no manifest counterpart, prune on
///
/// # WHEN
/// One reconciliation cycle runs
///
/// # THEN
/// Both strays are deleted, the Service (higher rank) strictly before the
/// Deployment, and a second cycle settles
#[tokio::test]
async fn test_prune_deletes_strays_in_reverse_rank_order(
) -> Result<(), Box<dyn std::error::Error>> {
    // GIVEN
    let dir = tempfile::tempdir()?;
    write_manifest(dir.path(), "empty.yaml", "---\n")?;
    let source = Arc::new(DirSource::new(dir.path(), "default"));
    let cluster = Arc::new(InMemoryCluster::new());
    let store = Arc::new(InMemoryRunStore::new());

    for (kind, name) in [
        (ResourceKind::Deployment, "stray"),
        (ResourceKind::Service, "stray"),
    ] {
        cluster
            .apply(&DesiredResource::new(
                ResourceId::new(kind, "default", name),
                serde_json::json!({"kind": "stray"}),
                "manual",
            ))
            .await?;
    }

    // WHEN
    let looper = ReconciliationLoop::new(
        source,
        cluster.clone(),
        store.clone(),
        LoopConfig {
            diff: DiffOptions::with_prune(),
            ..LoopConfig::default()
        },
    );
    let run = looper.run_once().await?;

    // THEN
    assert_eq!(run.status, RunStatus::Succeeded);

    let delete_order: Vec<&ResourceId> = run.entries.iter().map(|e| e.id()).collect();
    assert_eq!(delete_order.len(), 2);
    assert_eq!(delete_order[0].kind, ResourceKind::Service);
    assert_eq!(delete_order[1].kind, ResourceKind::Deployment);

    assert!(cluster.is_empty().await);

    let settled = looper.run_once().await?;
    assert_eq!(settled.status, RunStatus::Settled);
    Ok(())
}

/// # GIVEN
/// An unreachable manifest source
///
/// # WHEN
/// One reconciliation cycle runs
///
/// # THEN
/// The cycle fails closed: a Failed run with no entries is recorded and
/// nothing is mutated
#[tokio::test]
async fn test_source_outage_fails_closed() -> Result<(), Box<dyn std::error::Error>> {
    // GIVEN
    let source = Arc::new(DirSource::new("/nonexistent/varuna-manifests", "default"));
    let cluster = Arc::new(InMemoryCluster::new());
    let store = Arc::new(InMemoryRunStore::new());

    // WHEN
    let looper = ReconciliationLoop::new(
        source,
        cluster.clone(),
        store.clone(),
        LoopConfig::default(),
    );
    let run = looper.run_once().await?;

    // THEN
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.entries.is_empty());
    assert!(run.error.is_some());
    assert!(cluster.is_empty().await);
    assert_eq!(store.count().await?, 1);
    Ok(())
}
