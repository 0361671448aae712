//! Drift monitor state machine.

use serde::{Deserialize, Serialize};

/// States of the reconciliation loop for one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    /// Waiting for a timer tick or change signal.
    Idle,
    /// Fetching the desired tree and snapshotting live state.
    Fetching,
    /// Computing the diff.
    Diffing,
    /// Applying the plan.
    Syncing,
    /// The last cycle converged (or had nothing to do).
    Settled,
    /// The last cycle failed; retried after cooldown.
    Failed,
}

impl LoopState {
    /// Whether a transition to `next` is legal.
    ///
    /// Fetch failures jump straight to Failed; a clean diff skips Syncing
    /// and settles. Both terminal states return to Idle after cooldown.
    pub fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Fetching)
                | (Self::Fetching, Self::Diffing | Self::Failed)
                | (Self::Diffing, Self::Syncing | Self::Settled)
                | (Self::Syncing, Self::Settled | Self::Failed)
                | (Self::Settled | Self::Failed, Self::Idle)
        )
    }

    /// Whether the loop is mid-cycle (new ticks are deferred).
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Fetching | Self::Diffing | Self::Syncing)
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Diffing => "diffing",
            Self::Syncing => "syncing",
            Self::Settled => "settled",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}
