//! Reconciliation-run records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use varuna_cluster::ResourceId;
use varuna_reconciler::{DiffEntry, DiffPlan, SyncReport, SyncResult};

/// Unique identifier for a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Ulid);

impl RunId {
    /// Create a new random run ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Create from a ULID.
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Get the inner ULID.
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Overall outcome of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Nothing to do: the diff was all-NoOp.
    Settled,
    /// Changes were applied and every entry succeeded.
    Succeeded,
    /// The cycle failed - either before syncing or with failed entries.
    Failed,
    /// The cycle was cancelled mid-plan; live state matches a plan prefix.
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Settled => "settled",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// Immutable record of one reconciliation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRun {
    /// Run identifier (ULID: sortable, timestamped).
    pub id: RunId,
    /// Namespace the cycle covered.
    pub namespace: String,
    /// Revision observed for the desired side.
    pub revision: String,
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// When the cycle closed.
    pub finished_at: DateTime<Utc>,
    /// The diff entries the cycle planned.
    pub entries: Vec<DiffEntry>,
    /// One result per resolved entry.
    pub results: Vec<SyncResult>,
    /// Live-only identities reported without action.
    pub drift: Vec<ResourceId>,
    /// Overall outcome.
    pub status: RunStatus,
    /// Cycle-level failure, when the run never reached syncing.
    pub error: Option<String>,
}

impl ReconciliationRun {
    /// Record a cycle that ran its plan (possibly with failures or a
    /// cancellation).
    pub fn completed(
        namespace: impl Into<String>,
        started_at: DateTime<Utc>,
        plan: &DiffPlan,
        report: &SyncReport,
    ) -> Self {
        let status = if report.cancelled {
            RunStatus::Aborted
        } else if report.failed_count() > 0 || report.skipped_count() > 0 {
            RunStatus::Failed
        } else if plan.has_changes() {
            RunStatus::Succeeded
        } else {
            RunStatus::Settled
        };

        Self {
            id: RunId::new(),
            namespace: namespace.into(),
            revision: plan.revision.clone(),
            started_at,
            finished_at: Utc::now(),
            entries: plan.entries.clone(),
            results: report.results.clone(),
            drift: plan.drift.clone(),
            status,
            error: None,
        }
    }

    /// Record a cycle that failed before any mutation (fetch or snapshot
    /// error). No diff is computed on incomplete inputs, so the record
    /// carries no entries.
    pub fn failed_early(
        namespace: impl Into<String>,
        revision: impl Into<String>,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: RunId::new(),
            namespace: namespace.into(),
            revision: revision.into(),
            started_at,
            finished_at: Utc::now(),
            entries: Vec::new(),
            results: Vec::new(),
            drift: Vec::new(),
            status: RunStatus::Failed,
            error: Some(error.into()),
        }
    }

    /// Invariant check: every recorded result targets an identity that
    /// appears among the run's planned entries.
    pub fn results_match_entries(&self) -> bool {
        self.results
            .iter()
            .all(|result| self.entries.iter().any(|entry| entry.id() == &result.id))
    }

    /// One-line summary for the history listing.
    pub fn summary(&self) -> String {
        format!(
            "{} {} {} entries={} results={} drift={}",
            self.id,
            self.namespace,
            self.status,
            self.entries.len(),
            self.results.len(),
            self.drift.len()
        )
    }
}
