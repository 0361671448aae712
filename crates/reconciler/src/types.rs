//! Core types for diffing and syncing.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use varuna_cluster::{DesiredResource, LiveResource, ResourceId};

/// One planned action for a resource identity.
///
/// Derived fresh every cycle from (desired, live), never stored across
/// cycles, so the target state always matches the most recently fetched
/// declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiffEntry {
    /// The identity is declared but not live.
    Create { desired: DesiredResource },
    /// The identity is live but its spec diverges from the declaration.
    Update {
        desired: DesiredResource,
        live: LiveResource,
    },
    /// The identity is live, undeclared, and prune is in force.
    Delete { live: LiveResource },
    /// The identity is live and already matches the declaration.
    NoOp { id: ResourceId },
}

impl DiffEntry {
    /// The identity this entry targets.
    pub fn id(&self) -> &ResourceId {
        match self {
            Self::Create { desired } => &desired.id,
            Self::Update { desired, .. } => &desired.id,
            Self::Delete { live } => &live.id,
            Self::NoOp { id } => id,
        }
    }

    /// Dependency rank of the targeted identity.
    pub fn rank(&self) -> u8 {
        self.id().rank()
    }

    /// Whether this entry mutates live state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::NoOp { .. })
    }

    /// Whether this entry deletes live state.
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }

    /// Short verb for log lines.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::NoOp { .. } => "noop",
        }
    }
}

/// Diff policy knobs consulted by the diff engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Whether live-only resources become Delete entries.
    pub prune: bool,
}

impl DiffOptions {
    /// Options with pruning enabled.
    pub fn with_prune() -> Self {
        Self { prune: true }
    }
}

/// Ordered plan for one reconciliation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffPlan {
    /// Revision the desired side was fetched at.
    pub revision: String,
    /// Namespace the plan covers.
    pub namespace: String,
    /// Ordered entries: creates/updates ascending by rank, then deletes
    /// descending by rank.
    pub entries: Vec<DiffEntry>,
    /// Live-only identities reported without action (prune disabled or
    /// snapshot incomplete).
    pub drift: Vec<ResourceId>,
}

impl DiffPlan {
    /// Whether any entry mutates live state.
    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(DiffEntry::is_mutation)
    }

    /// Number of entries with the given predicate.
    fn count(&self, pred: fn(&DiffEntry) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(e)).count()
    }

    /// Number of Create entries.
    pub fn creates(&self) -> usize {
        self.count(|e| matches!(e, DiffEntry::Create { .. }))
    }

    /// Number of Update entries.
    pub fn updates(&self) -> usize {
        self.count(|e| matches!(e, DiffEntry::Update { .. }))
    }

    /// Number of Delete entries.
    pub fn deletes(&self) -> usize {
        self.count(DiffEntry::is_delete)
    }

    /// One-line summary for log lines and the plan subcommand.
    pub fn summary(&self) -> String {
        format!(
            "{} create, {} update, {} delete, {} drift",
            self.creates(),
            self.updates(),
            self.deletes(),
            self.drift.len()
        )
    }
}

/// Outcome of applying one diff entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// The mutation was applied.
    Applied,
    /// Nothing needed doing (already converged, or delete of an absent
    /// identity).
    NoOp,
    /// Structural failure; retrying cannot help.
    Fatal,
    /// Transient failure that survived every allowed attempt.
    RetriesExhausted,
    /// A prerequisite entry failed, so this one was never attempted.
    SkippedDueToDependencyFailure,
}

impl SyncOutcome {
    /// Whether the declared intent holds for this entry.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Applied | Self::NoOp)
    }

    /// Whether this outcome fails the cycle.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fatal | Self::RetriesExhausted)
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Applied => "applied",
            Self::NoOp => "noop",
            Self::Fatal => "fatal",
            Self::RetriesExhausted => "retries-exhausted",
            Self::SkippedDueToDependencyFailure => "skipped-dependency-failure",
        };
        write!(f, "{s}")
    }
}

/// Result of applying one diff entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    /// The identity the entry targeted.
    pub id: ResourceId,
    /// What happened.
    pub outcome: SyncOutcome,
    /// Number of apply attempts made (0 for skips and diff-level no-ops).
    pub attempts: u32,
    /// Failure or skip reason, if any.
    pub error: Option<String>,
    /// When the entry resolved.
    pub finished_at: DateTime<Utc>,
}

impl SyncResult {
    fn new(id: ResourceId, outcome: SyncOutcome, attempts: u32, error: Option<String>) -> Self {
        Self {
            id,
            outcome,
            attempts,
            error,
            finished_at: Utc::now(),
        }
    }

    /// The entry was applied.
    pub fn applied(id: ResourceId, attempts: u32) -> Self {
        Self::new(id, SyncOutcome::Applied, attempts, None)
    }

    /// Nothing needed doing.
    pub fn noop(id: ResourceId, attempts: u32) -> Self {
        Self::new(id, SyncOutcome::NoOp, attempts, None)
    }

    /// Structural failure.
    pub fn fatal(id: ResourceId, attempts: u32, error: impl Into<String>) -> Self {
        Self::new(id, SyncOutcome::Fatal, attempts, Some(error.into()))
    }

    /// Transient failure that exhausted its attempts.
    pub fn exhausted(id: ResourceId, attempts: u32, error: impl Into<String>) -> Self {
        Self::new(
            id,
            SyncOutcome::RetriesExhausted,
            attempts,
            Some(error.into()),
        )
    }

    /// Never attempted because a prerequisite failed.
    pub fn skipped(id: ResourceId, reason: impl Into<String>) -> Self {
        Self::new(
            id,
            SyncOutcome::SkippedDueToDependencyFailure,
            0,
            Some(reason.into()),
        )
    }
}

/// Everything the executor produced for one plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// One result per resolved entry, in plan order.
    pub results: Vec<SyncResult>,
    /// Whether the run was cancelled before resolving every entry.
    pub cancelled: bool,
}

impl SyncReport {
    /// Whether every resolved entry succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }

    /// Number of failed entries.
    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.is_failure())
            .count()
    }

    /// Number of skipped entries.
    pub fn skipped_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == SyncOutcome::SkippedDueToDependencyFailure)
            .count()
    }
}

/// Configuration for the sync executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Total attempts per entry, including the first (>= 1).
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per retry.
    pub base_backoff: Duration,
    /// Ceiling on a single backoff sleep.
    pub max_backoff: Duration,
    /// Concurrent applies within one dependency rank.
    pub workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            workers: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;
    use varuna_cluster::ResourceKind;

    fn create_entry(name: &str) -> DiffEntry {
        DiffEntry::Create {
            desired: DesiredResource::new(
                ResourceId::new(ResourceKind::Deployment, "default", name),
                json!({"replicas": 1}),
                "main@abc",
            ),
        }
    }

    #[test]
    fn test_plan_counts_and_summary() {
        let plan = DiffPlan {
            revision: "main@abc".into(),
            namespace: "default".into(),
            entries: vec![
                create_entry("web"),
                DiffEntry::NoOp {
                    id: ResourceId::new(ResourceKind::Service, "default", "web"),
                },
            ],
            drift: vec![],
        };

        assert!(plan.has_changes());
        assert_eq!(plan.creates(), 1);
        assert_eq!(plan.deletes(), 0);
        assert!(plan.summary().starts_with("1 create"));
    }

    #[test]
    fn test_all_noop_plan_has_no_changes() {
        let plan = DiffPlan {
            revision: "main@abc".into(),
            namespace: "default".into(),
            entries: vec![DiffEntry::NoOp {
                id: ResourceId::new(ResourceKind::Service, "default", "web"),
            }],
            drift: vec![],
        };
        assert!(!plan.has_changes());
    }

    #[test]
    fn test_outcome_classification() {
        assert!(SyncOutcome::Applied.is_success());
        assert!(SyncOutcome::NoOp.is_success());
        assert!(SyncOutcome::Fatal.is_failure());
        assert!(SyncOutcome::RetriesExhausted.is_failure());
        assert!(!SyncOutcome::SkippedDueToDependencyFailure.is_success());
        assert!(!SyncOutcome::SkippedDueToDependencyFailure.is_failure());
    }

    #[test]
    fn test_report_aggregates() {
        let id = ResourceId::new(ResourceKind::Deployment, "default", "web");
        let report = SyncReport {
            results: vec![
                SyncResult::applied(id.clone(), 1),
                SyncResult::skipped(id.clone(), "prerequisite failed"),
                SyncResult::fatal(id, 1, "denied"),
            ],
            cancelled: false,
        };
        assert!(!report.all_succeeded());
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.skipped_count(), 1);
    }
}
