//! Drift monitoring for Varuna.
//!
//! The monitor drives the watch-diff-sync loop for one managed namespace:
//!
//! 1. Fetch the desired tree and snapshot live state (concurrent reads)
//! 2. Diff them
//! 3. Sync if anything changed
//! 4. Record the cycle, cool down, go idle
//!
//! Self-healing falls out of the cadence: a periodic re-snapshot that finds
//! live drift re-enters diffing even when the source revision is unchanged.
//! Ticks and change signals arriving mid-cycle coalesce into a single
//! follow-up cycle, so cycles for one namespace never overlap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod control;
pub mod r#loop;
pub mod state;

pub use control::LoopControl;
pub use r#loop::{LoopConfig, ReconciliationLoop};
pub use state::LoopState;
