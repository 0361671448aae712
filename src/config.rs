//! Configuration file loading.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use varuna_core::{Error, Result};
use varuna_monitor::LoopConfig;
use varuna_reconciler::{DiffOptions, ExecutorConfig};

/// Top-level configuration, read from `varuna.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Namespaces to reconcile; each gets an independent loop.
    pub namespaces: Vec<String>,
    pub source: SourceConfig,
    pub sync: SyncConfig,
    pub monitor: MonitorConfig,
    pub history: HistoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespaces: vec!["default".to_string()],
            source: SourceConfig::default(),
            sync: SyncConfig::default(),
            monitor: MonitorConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

/// Manifest source settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding the manifest tree.
    pub root: PathBuf,
    /// Revision reference recorded on fetched trees.
    pub reference: String,
    /// Namespace assumed for documents without `metadata.namespace`.
    pub default_namespace: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("manifests"),
            reference: "main".to_string(),
            default_namespace: "default".to_string(),
        }
    }
}

/// Sync policy settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delete live resources absent from the desired tree.
    pub prune: bool,
    /// Total apply attempts per entry, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt, milliseconds.
    pub base_backoff_ms: u64,
    /// Ceiling on a single backoff sleep, milliseconds.
    pub max_backoff_ms: u64,
    /// Concurrent applies within one dependency rank.
    pub workers: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let defaults = ExecutorConfig::default();
        Self {
            prune: false,
            max_attempts: defaults.max_attempts,
            base_backoff_ms: defaults.base_backoff.as_millis() as u64,
            max_backoff_ms: defaults.max_backoff.as_millis() as u64,
            workers: defaults.workers,
        }
    }
}

/// Loop cadence settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Periodic resync interval (the self-heal cadence), seconds.
    pub resync_secs: u64,
    /// Cooldown after a settled or failed cycle, seconds.
    pub cooldown_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            resync_secs: 30,
            cooldown_secs: 1,
        }
    }
}

/// Audit history settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// JSON-lines file for run records; unset keeps history in memory only.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the file is missing, malformed
    /// or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!("cannot read '{}': {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| {
            Error::invalid_config(format!("cannot parse '{}': {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.namespaces.is_empty() {
            return Err(Error::invalid_config("at least one namespace is required"));
        }
        if self.sync.max_attempts == 0 {
            return Err(Error::invalid_config("sync.max_attempts must be >= 1"));
        }
        if self.sync.workers == 0 {
            return Err(Error::invalid_config("sync.workers must be >= 1"));
        }
        Ok(())
    }

    /// Executor settings derived from the sync section.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_attempts: self.sync.max_attempts,
            base_backoff: Duration::from_millis(self.sync.base_backoff_ms),
            max_backoff: Duration::from_millis(self.sync.max_backoff_ms),
            workers: self.sync.workers,
        }
    }

    /// Diff policy derived from the sync section.
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            prune: self.sync.prune,
        }
    }

    /// Loop settings for one managed namespace.
    pub fn loop_config(&self, namespace: &str) -> LoopConfig {
        LoopConfig {
            namespace: namespace.to_string(),
            reference: self.source.reference.clone(),
            kinds: Vec::new(),
            diff: self.diff_options(),
            executor: self.executor_config(),
            resync_interval: Duration::from_secs(self.monitor.resync_secs),
            cooldown: Duration::from_secs(self.monitor.cooldown_secs),
        }
    }
}
