//! Shared control handle for a running reconciliation loop.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{watch, Notify, RwLock};
use tracing::{debug, warn};

use crate::state::LoopState;

/// Handle for observing and steering one namespace's loop.
///
/// Cloned freely via `Arc`; the loop holds one end, operators (CLI, signal
/// handlers, tests) the other. Pausing keeps the loop alive but inert;
/// shutdown cancels the in-flight cycle at the next entry boundary and ends
/// the loop.
pub struct LoopControl {
    paused: AtomicBool,
    stopping: AtomicBool,
    cancel_tx: watch::Sender<bool>,
    tick: Notify,
    state: RwLock<LoopState>,
}

impl Default for LoopControl {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopControl {
    /// Create a new control handle in the Idle state.
    pub fn new() -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            paused: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            cancel_tx,
            tick: Notify::new(),
            state: RwLock::new(LoopState::Idle),
        }
    }

    /// Pause the loop: ticks and change signals are ignored until resumed.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
        debug!("Loop paused");
    }

    /// Resume a paused loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
        self.tick.notify_one();
        debug!("Loop resumed");
    }

    /// Whether the loop is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Request an out-of-cadence cycle (e.g. on a source change signal).
    /// Signals arriving mid-cycle coalesce into one follow-up cycle.
    pub fn trigger(&self) {
        self.tick.notify_one();
    }

    /// Wait for the next trigger.
    pub(crate) async fn triggered(&self) {
        self.tick.notified().await;
    }

    /// Stop the loop: cancels the in-flight cycle at the next entry
    /// boundary and ends the run loop.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::Relaxed);
        let _ = self.cancel_tx.send(true);
        self.tick.notify_one();
        debug!("Loop shutdown requested");
    }

    /// Whether shutdown was requested.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Relaxed)
    }

    /// Cancellation signal consumed by the sync executor.
    pub fn cancel_receiver(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    /// Current loop state.
    pub async fn state(&self) -> LoopState {
        *self.state.read().await
    }

    /// Move to a new state, warning on (but not blocking) an illegal
    /// transition so a bug surfaces in logs instead of wedging the loop.
    pub(crate) async fn set_state(&self, next: LoopState) {
        let mut state = self.state.write().await;
        if !state.can_transition(next) && *state != next {
            warn!(from = %state, to = %next, "Unexpected loop state transition");
        }
        *state = next;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn test_pause_resume() {
        let control = LoopControl::new();
        assert!(!control.is_paused());
        control.pause();
        assert!(control.is_paused());
        control.resume();
        assert!(!control.is_paused());
    }

    #[tokio::test]
    async fn test_shutdown_cancels() {
        let control = LoopControl::new();
        let cancel = control.cancel_receiver();
        assert!(!*cancel.borrow());

        control.shutdown();
        assert!(control.is_stopping());
        assert!(*cancel.borrow());
    }

    #[tokio::test]
    async fn test_trigger_coalesces() {
        let control = LoopControl::new();
        control.trigger();
        control.trigger();
        control.trigger();

        // One stored permit: the first wait returns immediately...
        control.triggered().await;

        // ...and the permits did not stack beyond it.
        let immediate = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            control.triggered(),
        )
        .await;
        assert!(immediate.is_err(), "repeated triggers must coalesce");
    }

    #[tokio::test]
    async fn test_state_tracking() {
        let control = LoopControl::new();
        assert_eq!(control.state().await, LoopState::Idle);
        control.set_state(LoopState::Fetching).await;
        assert_eq!(control.state().await, LoopState::Fetching);
    }
}
