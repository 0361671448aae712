//! Resource model and platform contract for Varuna.
//!
//! This crate defines the shared vocabulary of the reconciliation pipeline:
//!
//! - **Identity**: [`ResourceKind`] and [`ResourceId`] name a manageable unit
//!   and carry the dependency rank that orders applies and deletes.
//! - **Desired vs live**: [`DesiredResource`] is what the manifest source
//!   declares, [`LiveResource`] is what the platform reports.
//! - **Snapshots**: [`LiveSnapshot`] is an immutable per-cycle view of a
//!   namespace, with an explicit completeness flag so callers never prune
//!   based on partial data.
//! - **Platform seam**: [`ClusterApi`] is the narrow contract the rest of
//!   the system consumes; [`InMemoryCluster`] implements it for tests and
//!   local simulation, with injectable fault rules.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod api;
pub mod memory;
pub mod snapshot;
pub mod types;

pub use api::ClusterApi;
pub use memory::{FaultKind, FaultOp, FaultRule, FaultTarget, InMemoryCluster};
pub use snapshot::Snapshotter;
pub use types::{DesiredResource, LiveResource, LiveSnapshot, ResourceId, ResourceKind};
