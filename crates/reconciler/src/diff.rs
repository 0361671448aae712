//! Pure diff of desired state against a live snapshot.

use std::cmp::Reverse;
use std::collections::HashSet;

use either::Either;
use itertools::Itertools;
use tracing::{debug, warn};
use varuna_cluster::{DesiredResource, LiveSnapshot, ResourceId};

use crate::types::{DiffEntry, DiffOptions, DiffPlan};

/// Compute the ordered diff between a desired tree and a live snapshot.
///
/// Pure: no I/O, no clock, deterministic for fixed inputs. Creates and
/// updates come first, ascending by dependency rank so prerequisites land
/// before dependents; deletes follow, descending by rank so dependents are
/// removed before what they depend on. Within a rank, entries order
/// lexicographically by identity tuple.
///
/// Live-only resources become Delete entries only when `options.prune` is
/// set and the snapshot is complete; a degraded snapshot must never trigger
/// pruning, since an unlisted resource is indistinguishable from a deleted
/// one.
pub fn diff(
    revision: &str,
    desired: &[DesiredResource],
    snapshot: &LiveSnapshot,
    options: &DiffOptions,
) -> DiffPlan {
    let desired_ids: HashSet<&ResourceId> = desired.iter().map(|d| &d.id).collect();

    // Declared side: create what is absent, update what diverged.
    let mut upserts: Vec<DiffEntry> = desired
        .iter()
        .map(|d| match snapshot.get(&d.id) {
            None => DiffEntry::Create { desired: d.clone() },
            Some(live) if live.spec != d.spec => DiffEntry::Update {
                desired: d.clone(),
                live: live.clone(),
            },
            Some(_) => DiffEntry::NoOp { id: d.id.clone() },
        })
        .collect();
    upserts.sort_by(|a, b| (a.rank(), a.id()).cmp(&(b.rank(), b.id())));

    let prune_allowed = options.prune && snapshot.complete;
    if options.prune && !snapshot.complete {
        warn!(
            namespace = %snapshot.namespace,
            "Snapshot incomplete, withholding prune for this cycle"
        );
    }

    // Live-only side: prune or report as drift.
    let (mut deletes, drift): (Vec<DiffEntry>, Vec<ResourceId>) = snapshot
        .resources
        .values()
        .filter(|live| !desired_ids.contains(&live.id))
        .partition_map(|live| {
            if prune_allowed {
                Either::Left(DiffEntry::Delete { live: live.clone() })
            } else {
                Either::Right(live.id.clone())
            }
        });
    deletes.sort_by(|a, b| (Reverse(a.rank()), a.id()).cmp(&(Reverse(b.rank()), b.id())));

    let drift = drift.into_iter().sorted().collect_vec();

    let mut entries = upserts;
    entries.extend(deletes);

    let plan = DiffPlan {
        revision: revision.to_string(),
        namespace: snapshot.namespace.clone(),
        entries,
        drift,
    };
    debug!(namespace = %plan.namespace, revision = %plan.revision, summary = %plan.summary(), "Computed diff");
    plan
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;
    use varuna_cluster::{LiveResource, ResourceKind};

    fn desired(kind: ResourceKind, name: &str, spec: serde_json::Value) -> DesiredResource {
        let namespace = if kind == ResourceKind::Namespace {
            name.to_string()
        } else {
            "default".to_string()
        };
        DesiredResource::new(ResourceId::new(kind, namespace, name), spec, "main@abc")
    }

    fn live(kind: ResourceKind, name: &str, spec: serde_json::Value) -> LiveResource {
        LiveResource::new(ResourceId::new(kind, "default", name), spec)
    }

    fn snapshot_of(resources: Vec<LiveResource>) -> LiveSnapshot {
        let mut snapshot = LiveSnapshot::new("default");
        for resource in resources {
            snapshot.insert(resource);
        }
        snapshot
    }

    #[test]
    fn test_empty_cluster_yields_rank_ordered_creates() {
        let desired = vec![
            desired(ResourceKind::Ingress, "web", json!({"host": "a"})),
            desired(ResourceKind::Deployment, "web", json!({"replicas": 2})),
            desired(ResourceKind::Service, "web", json!({"port": 80})),
        ];
        let plan = diff("main@abc", &desired, &snapshot_of(vec![]), &DiffOptions::default());

        let kinds: Vec<_> = plan.entries.iter().map(|e| e.id().kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::Deployment,
                ResourceKind::Service,
                ResourceKind::Ingress
            ]
        );
        assert_eq!(plan.creates(), 3);
    }

    #[test]
    fn test_equal_rank_ties_break_lexicographically() {
        let desired = vec![
            desired(ResourceKind::Deployment, "zeta", json!({})),
            desired(ResourceKind::Deployment, "alpha", json!({})),
        ];
        let plan = diff("main@abc", &desired, &snapshot_of(vec![]), &DiffOptions::default());

        let names: Vec<_> = plan.entries.iter().map(|e| e.id().name.clone()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_diverged_spec_becomes_update_and_equal_spec_noop() {
        let desired_set = vec![
            desired(ResourceKind::Deployment, "web", json!({"replicas": 3})),
            desired(ResourceKind::Service, "web", json!({"port": 80})),
        ];
        let snapshot = snapshot_of(vec![
            live(ResourceKind::Deployment, "web", json!({"replicas": 2})),
            live(ResourceKind::Service, "web", json!({"port": 80})),
        ]);
        let plan = diff("main@abc", &desired_set, &snapshot, &DiffOptions::default());

        assert_eq!(plan.updates(), 1);
        assert!(plan
            .entries
            .iter()
            .any(|e| matches!(e, DiffEntry::NoOp { id } if id.kind == ResourceKind::Service)));
    }

    #[test]
    fn test_prune_disabled_reports_drift_without_deletes() {
        let snapshot = snapshot_of(vec![live(ResourceKind::Service, "stray", json!({}))]);
        let plan = diff("main@abc", &[], &snapshot, &DiffOptions::default());

        assert_eq!(plan.deletes(), 0);
        assert_eq!(plan.drift.len(), 1);
        assert_eq!(plan.drift[0].name, "stray");
    }

    #[test]
    fn test_prune_enabled_deletes_in_reverse_rank_order() {
        let snapshot = snapshot_of(vec![
            live(ResourceKind::Deployment, "stray", json!({})),
            live(ResourceKind::Service, "stray", json!({})),
        ]);
        let plan = diff("main@abc", &[], &snapshot, &DiffOptions::with_prune());

        assert_eq!(plan.deletes(), 2);
        // Service (rank 3) deleted before Deployment (rank 2)
        assert_eq!(plan.entries[0].id().kind, ResourceKind::Service);
        assert_eq!(plan.entries[1].id().kind, ResourceKind::Deployment);
        assert!(plan.drift.is_empty());
    }

    #[test]
    fn test_incomplete_snapshot_withholds_prune() {
        let mut snapshot = snapshot_of(vec![live(ResourceKind::Service, "stray", json!({}))]);
        snapshot.mark_incomplete();
        let plan = diff("main@abc", &[], &snapshot, &DiffOptions::with_prune());

        assert_eq!(plan.deletes(), 0);
        assert_eq!(plan.drift.len(), 1);
    }

    #[test]
    fn test_deletes_ordered_after_creates() {
        let desired_set = vec![desired(ResourceKind::Deployment, "new", json!({}))];
        let snapshot = snapshot_of(vec![live(ResourceKind::Service, "old", json!({}))]);
        let plan = diff("main@abc", &desired_set, &snapshot, &DiffOptions::with_prune());

        assert!(matches!(plan.entries[0], DiffEntry::Create { .. }));
        assert!(matches!(plan.entries[1], DiffEntry::Delete { .. }));
    }

    #[test]
    fn test_diff_is_deterministic() {
        let desired_set = vec![
            desired(ResourceKind::Deployment, "b", json!({})),
            desired(ResourceKind::Deployment, "a", json!({})),
            desired(ResourceKind::ConfigMap, "cfg", json!({})),
        ];
        let snapshot = snapshot_of(vec![
            live(ResourceKind::Service, "stray-b", json!({})),
            live(ResourceKind::Service, "stray-a", json!({})),
        ]);

        let first = diff("main@abc", &desired_set, &snapshot, &DiffOptions::with_prune());
        let second = diff("main@abc", &desired_set, &snapshot, &DiffOptions::with_prune());
        assert_eq!(first.entries, second.entries);
        assert_eq!(first.drift, second.drift);
    }
}
