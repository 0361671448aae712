//! Diff engine and sync executor for Varuna.
//!
//! This crate implements the convergence half of the reconciliation loop:
//!
//! - **Diff**: compare the fetched desired tree against a live snapshot and
//!   produce an ordered [`DiffPlan`]: creates and updates ascending by
//!   dependency rank, deletes reverse-ranked after them, lexicographic
//!   tie-break within a rank so plans are reproducible.
//! - **Sync**: apply the plan against a [`varuna_cluster::ClusterApi`],
//!   retrying transient failures with bounded exponential backoff, skipping
//!   entries whose prerequisites failed, and honoring cancellation at entry
//!   boundaries only.
//!
//! Pruning (deleting live-only resources) happens only when the prune
//! policy is enabled AND the snapshot is complete; otherwise live-only
//! resources are reported as out-of-band drift with no action taken.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod diff;
pub mod executor;
pub mod types;

pub use diff::diff;
pub use executor::SyncExecutor;
pub use types::{
    DiffEntry, DiffOptions, DiffPlan, ExecutorConfig, SyncOutcome, SyncReport, SyncResult,
};
