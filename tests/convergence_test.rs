//! Integration tests for end-to-end convergence.
//!
//! These tests verify that:
//! - A manifest directory converges onto an empty cluster in rank order
//! - A converged cluster re-diffs to an all-NoOp plan
//! - Manifest edits produce a new revision and re-converge
//! - Live drift heals on the next cycle without a revision change

#![forbid(clippy::unwrap_used)]
#![forbid(clippy::expect_used)]
#![forbid(clippy::panic)]

use std::path::Path;
use std::sync::Arc;

use varuna_cluster::{InMemoryCluster, ResourceId, ResourceKind, Snapshotter};
use varuna_history::{InMemoryRunStore, RunStatus, RunStore};
use varuna_monitor::{LoopConfig, ReconciliationLoop};
use varuna_reconciler::{diff, DiffOptions};
use varuna_source::{DirSource, ManifestSource};

fn write_manifest(root: &Path, rel: &str, text: &str) -> Result<(), std::io::Error> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)
}

fn stack_manifest(replicas: u64) -> String {
    format!(
        "kind: Namespace\nmetadata:\n  name: default\n---\n\
kind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: {replicas}\n---\n\
kind: Service\nmetadata:\n  name: web\nspec:\n  port: 80\n"
    )
}

fn test_loop(
    source: Arc<DirSource>,
    cluster: Arc<InMemoryCluster>,
    store: Arc<InMemoryRunStore>,
) -> ReconciliationLoop {
    ReconciliationLoop::new(source, cluster, store, LoopConfig::default())
}

/// # GIVEN
/// A manifest tree declaring Namespace, Deployment and Service, and an
/// empty cluster
///
/// # WHEN
/// One reconciliation cycle runs
///
/// # THEN
/// All three resources exist live, applied in dependency-rank order, and
/// the next cycle settles with an empty diff
#[tokio::test]
async fn test_fresh_cluster_converges_in_rank_order() -> Result<(), Box<dyn std::error::Error>> {
    // GIVEN
    let dir = tempfile::tempdir()?;
    write_manifest(dir.path(), "stack.yaml", &stack_manifest(2))?;
    let source = Arc::new(DirSource::new(dir.path(), "default"));
    let cluster = Arc::new(InMemoryCluster::new());
    let store = Arc::new(InMemoryRunStore::new());

    // WHEN
    let looper = test_loop(source.clone(), cluster.clone(), store.clone());
    let run = looper.run_once().await?;

    // THEN
    assert_eq!(run.status, RunStatus::Succeeded);
    assert!(run.results_match_entries());

    let ranks: Vec<u8> = run.entries.iter().map(|e| e.rank()).collect();
    let mut sorted = ranks.clone();
    sorted.sort_unstable();
    assert_eq!(ranks, sorted, "creates must ascend by dependency rank");

    for (kind, namespace, name) in [
        (ResourceKind::Namespace, "default", "default"),
        (ResourceKind::Deployment, "default", "web"),
        (ResourceKind::Service, "default", "web"),
    ] {
        assert!(
            cluster.contains(&ResourceId::new(kind, namespace, name)).await,
            "expected {name} live"
        );
    }

    let settled = looper.run_once().await?;
    assert_eq!(settled.status, RunStatus::Settled);
    assert_eq!(store.count().await?, 2);
    Ok(())
}

/// # GIVEN
/// A converged cluster
///
/// # WHEN
/// The manifest tree changes (replicas bumped)
///
/// # THEN
/// The next cycle observes a new revision and updates the live resource
#[tokio::test]
async fn test_manifest_edit_reconverges_under_new_revision(
) -> Result<(), Box<dyn std::error::Error>> {
    // GIVEN
    let dir = tempfile::tempdir()?;
    write_manifest(dir.path(), "stack.yaml", &stack_manifest(2))?;
    let source = Arc::new(DirSource::new(dir.path(), "default"));
    let cluster = Arc::new(InMemoryCluster::new());
    let store = Arc::new(InMemoryRunStore::new());
    let looper = test_loop(source.clone(), cluster.clone(), store.clone());
    let first = looper.run_once().await?;

    // WHEN
    write_manifest(dir.path(), "stack.yaml", &stack_manifest(5))?;
    let second = looper.run_once().await?;

    // THEN
    assert_ne!(first.revision, second.revision, "edit must change the revision");
    assert_eq!(second.status, RunStatus::Succeeded);

    let live = cluster
        .get(&ResourceId::new(ResourceKind::Deployment, "default", "web"))
        .await
        .ok_or("deployment missing")?;
    assert_eq!(live.spec["spec"]["replicas"], serde_json::json!(5));
    Ok(())
}

/// # GIVEN
/// A converged cluster whose Deployment is then mutated out-of-band
///
/// # WHEN
/// A periodic cycle re-snapshots with no revision change
///
/// # THEN
/// The drift is corrected (self-heal) and a further diff is all-NoOp
#[tokio::test]
async fn test_out_of_band_drift_self_heals() -> Result<(), Box<dyn std::error::Error>> {
    // GIVEN
    let dir = tempfile::tempdir()?;
    write_manifest(dir.path(), "stack.yaml", &stack_manifest(2))?;
    let source = Arc::new(DirSource::new(dir.path(), "default"));
    let cluster = Arc::new(InMemoryCluster::new());
    let store = Arc::new(InMemoryRunStore::new());
    let looper = test_loop(source.clone(), cluster.clone(), store.clone());
    looper.run_once().await?;

    let id = ResourceId::new(ResourceKind::Deployment, "default", "web");
    let mut drifted = cluster.get(&id).await.ok_or("deployment missing")?;
    drifted.spec["spec"]["replicas"] = serde_json::json!(9);
    cluster.seed(drifted).await;

    // WHEN
    let heal = looper.run_once().await?;

    // THEN
    assert_eq!(heal.status, RunStatus::Succeeded);
    let live = cluster.get(&id).await.ok_or("deployment missing")?;
    assert_eq!(live.spec["spec"]["replicas"], serde_json::json!(2));

    // And the system is converged again: a fresh diff is all-NoOp
    let tree = source.fetch("main").await?;
    let snapshot = Snapshotter::new(cluster.clone()).snapshot("default", &[]).await?;
    let desired: Vec<_> = tree.in_namespace("default").into_iter().cloned().collect();
    let plan = diff(
        &tree.revision.short(),
        &desired,
        &snapshot,
        &DiffOptions::default(),
    );
    assert!(!plan.has_changes());
    Ok(())
}
