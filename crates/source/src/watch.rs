//! Manifest-directory change signals.

use std::path::Path;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use varuna_core::{Error, Result};

/// Watches a manifest root and surfaces change signals.
///
/// The signal carries no payload: the drift monitor reacts by fetching the
/// tree again, so several rapid edits naturally coalesce into one cycle.
#[derive(Debug)]
pub struct SourceWatcher {
    // Held so the notify thread keeps running for the watcher's lifetime.
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<()>,
}

impl SourceWatcher {
    /// Start watching a manifest root recursively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceUnavailable`] when the watch cannot be
    /// established.
    pub fn watch(root: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            match event {
                Ok(event) if is_relevant(&event) => {
                    debug!(paths = ?event.paths, "Manifest change detected");
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Manifest watcher error"),
            }
        })
        .map_err(|e| Error::source_unavailable(format!("cannot create watcher: {e}")))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| {
                Error::source_unavailable(format!("cannot watch '{}': {e}", root.display()))
            })?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Wait for the next change signal. Returns `None` when the watcher has
    /// shut down.
    pub async fn changed(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

/// Only mutations of manifest files matter; access events and editor noise
/// on other extensions are dropped at the source.
fn is_relevant(event: &Event) -> bool {
    let mutation = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    mutation
        && event.paths.iter().any(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yaml" | "yml")
            )
        })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_write_produces_change_signal() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = SourceWatcher::watch(dir.path()).unwrap();

        std::fs::write(dir.path().join("cm.yaml"), "kind: ConfigMap\n").unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(5), watcher.changed()).await;
        assert!(signal.is_ok(), "expected a change signal within 5s");
    }

    #[tokio::test]
    async fn test_unwatchable_root_errors() {
        let err = SourceWatcher::watch(Path::new("/nonexistent/varuna-watch")).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }
}
