//! Durable run store backed by an append-only JSON-lines file.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use varuna_core::{Error, Result};

use crate::store::{RunQuery, RunStore};
use crate::types::{ReconciliationRun, RunId};

/// Run store that appends one JSON document per line.
///
/// Survives process restarts, so `varuna history` can inspect runs recorded
/// by an earlier `varuna run`. The file is the source of truth; queries
/// re-read it rather than holding state in memory.
pub struct JsonlRunStore {
    path: PathBuf,
    // Serializes appends so concurrent namespace loops never interleave lines.
    write_lock: Mutex<()>,
}

impl JsonlRunStore {
    /// Create a store appending to the given file, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HistoryError`] when the parent directory cannot be
    /// created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::history_error(format!("cannot create '{}': {e}", parent.display()))
                })?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<ReconciliationRun>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::history_error(format!(
                    "cannot read '{}': {e}",
                    self.path.display()
                )))
            }
        };

        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    Error::history_error(format!("corrupt run record in '{}': {e}", self.path.display()))
                })
            })
            .collect()
    }
}

#[async_trait]
impl RunStore for JsonlRunStore {
    async fn record(&self, run: ReconciliationRun) -> Result<RunId> {
        let run_id = run.id;
        let line = serde_json::to_string(&run)
            .map_err(|e| Error::history_error(format!("cannot encode run: {e}")))?;

        let _guard = self.write_lock.lock().await;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                Error::history_error(format!("cannot open '{}': {e}", self.path.display()))
            })?;
        writeln!(file, "{line}").map_err(|e| {
            Error::history_error(format!("cannot append to '{}': {e}", self.path.display()))
        })?;

        debug!(run = %run_id, path = %self.path.display(), "Run recorded");
        Ok(run_id)
    }

    async fn query(&self, query: &RunQuery) -> Result<Vec<ReconciliationRun>> {
        let runs = self.read_all()?;
        Ok(query.filter_runs(runs.iter()).cloned().collect())
    }

    async fn latest(&self, namespace: &str) -> Result<Option<ReconciliationRun>> {
        let runs = self.read_all()?;
        Ok(runs
            .into_iter()
            .rev()
            .find(|run| run.namespace == namespace))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read_all()?.len())
    }
}
