//! Subcommand implementations.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use varuna_cluster::{ClusterApi, InMemoryCluster};
use varuna_history::{InMemoryRunStore, JsonlRunStore, RunQuery, RunStatus, RunStore};
use varuna_monitor::ReconciliationLoop;
use varuna_source::{DirSource, ManifestSource, SourceWatcher};

use crate::config::Config;

fn manifest_source(config: &Config) -> Arc<dyn ManifestSource> {
    Arc::new(DirSource::new(
        config.source.root.clone(),
        config.source.default_namespace.clone(),
    ))
}

fn run_store(config: &Config) -> Result<Arc<dyn RunStore>> {
    match &config.history.path {
        Some(path) => {
            let store = JsonlRunStore::open(path).context("cannot open history store")?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryRunStore::new())),
    }
}

// The platform target is process-local: any ClusterApi implementation plugs
// in here, and the in-memory cluster is the built-in simulation target.
fn cluster_target() -> Arc<dyn ClusterApi> {
    Arc::new(InMemoryCluster::new())
}

fn selected_namespaces<'a>(config: &'a Config, namespace: Option<&str>) -> Result<Vec<&'a str>> {
    match namespace {
        Some(wanted) => {
            let found = config
                .namespaces
                .iter()
                .find(|ns| ns.as_str() == wanted)
                .map(String::as_str);
            match found {
                Some(ns) => Ok(vec![ns]),
                None => bail!("namespace '{wanted}' is not configured"),
            }
        }
        None => Ok(config.namespaces.iter().map(String::as_str).collect()),
    }
}

/// Start reconciliation loops for every managed namespace and run until a
/// shutdown signal arrives.
pub async fn run(config: &Config) -> Result<()> {
    let source = manifest_source(config);
    let cluster = cluster_target();
    let store = run_store(config)?;

    let mut controls = Vec::new();
    let mut handles = Vec::new();
    for namespace in &config.namespaces {
        let looper = ReconciliationLoop::new(
            source.clone(),
            cluster.clone(),
            store.clone(),
            config.loop_config(namespace),
        );
        controls.push(looper.control());
        handles.push(tokio::spawn(async move { looper.run().await }));
    }

    // Manifest edits trigger out-of-cadence cycles on every loop.
    let mut watcher =
        SourceWatcher::watch(&config.source.root).context("cannot watch manifest root")?;
    let watched = controls.clone();
    let watch_task = tokio::spawn(async move {
        while watcher.changed().await.is_some() {
            for control in &watched {
                control.trigger();
            }
        }
    });

    info!(namespaces = config.namespaces.len(), "Varuna running, ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for shutdown signal")?;
    info!("Shutdown signal received");

    for control in &controls {
        control.shutdown();
    }
    for handle in handles {
        let _ = handle.await;
    }
    watch_task.abort();
    Ok(())
}

/// One-shot fetch-diff-apply cycle per selected namespace.
pub async fn sync(config: &Config, namespace: Option<&str>) -> Result<()> {
    let source = manifest_source(config);
    let cluster = cluster_target();
    let store = run_store(config)?;

    let mut failed = false;
    for ns in selected_namespaces(config, namespace)? {
        let looper = ReconciliationLoop::new(
            source.clone(),
            cluster.clone(),
            store.clone(),
            config.loop_config(ns),
        );
        let run = looper.run_once().await.context("cycle was not recorded")?;
        println!("{}", run.summary());
        for result in &run.results {
            println!(
                "  {:<28} {} attempts={}{}",
                result.id.to_string(),
                result.outcome,
                result.attempts,
                result
                    .error
                    .as_deref()
                    .map(|e| format!(" ({e})"))
                    .unwrap_or_default()
            );
        }
        failed |= matches!(run.status, RunStatus::Failed | RunStatus::Aborted);
    }

    if failed {
        bail!("one or more namespaces failed to converge");
    }
    Ok(())
}

/// Compute and print the diff for each selected namespace without mutating
/// anything.
pub async fn plan(config: &Config, namespace: Option<&str>) -> Result<()> {
    let source = manifest_source(config);
    let cluster = cluster_target();
    let snapshotter = varuna_cluster::Snapshotter::new(cluster);

    let tree = source
        .fetch(&config.source.reference)
        .await
        .context("manifest fetch failed")?;

    for ns in selected_namespaces(config, namespace)? {
        let snapshot = snapshotter
            .snapshot(ns, &[])
            .await
            .context("live snapshot failed")?;
        let desired: Vec<_> = tree.in_namespace(ns).into_iter().cloned().collect();
        let plan = varuna_reconciler::diff(
            &tree.revision.short(),
            &desired,
            &snapshot,
            &config.diff_options(),
        );

        println!("namespace {ns} @ {}:", plan.revision);
        for entry in &plan.entries {
            println!("  {:>6} {}", entry.verb(), entry.id());
        }
        for id in &plan.drift {
            println!("  drift  {id} (no action)");
        }
        println!("  {}", plan.summary());
    }
    Ok(())
}

/// Fetch and parse the manifest tree, reporting what it declares.
pub async fn validate(config: &Config) -> Result<()> {
    let source = manifest_source(config);
    let tree = source
        .fetch(&config.source.reference)
        .await
        .context("manifest tree is invalid")?;

    println!(
        "{} resources at {}",
        tree.len(),
        tree.revision.short()
    );
    for resource in tree.resources() {
        println!("  {}", resource.id);
    }
    Ok(())
}

/// List recorded reconciliation runs.
pub async fn history(
    config: &Config,
    namespace: Option<&str>,
    revision: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    if config.history.path.is_none() {
        bail!("no history.path configured; runs are only retained in memory");
    }
    let store = run_store(config)?;

    let mut query = RunQuery::new();
    if let Some(namespace) = namespace {
        query = query.with_namespace(namespace);
    }
    if let Some(revision) = revision {
        query = query.with_revision(revision);
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }

    let runs = store.query(&query).await.context("history query failed")?;
    if runs.is_empty() {
        println!("no recorded runs match");
        return Ok(());
    }
    for run in runs {
        println!("{}", run.summary());
        if let Some(error) = &run.error {
            println!("  error: {error}");
        }
    }
    Ok(())
}
