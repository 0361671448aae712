//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Varuna - GitOps reconciler
#[derive(Parser, Debug)]
#[command(name = "varuna")]
#[command(version)]
#[command(about = "Keeper of declared order - converges live platform state to a manifest source")]
#[command(
    long_about = "Varuna watches a version-controlled manifest tree, snapshots the live state of \
each managed namespace, and applies rank-ordered diffs until the platform matches the declaration."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "varuna.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start reconciliation loops for every managed namespace
    Run,

    /// One-shot fetch-diff-apply cycle
    Sync {
        /// Namespace to sync (default: every configured namespace)
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Compute and print the diff without mutating anything
    Plan {
        /// Namespace to plan (default: every configured namespace)
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Fetch and parse the manifest tree, reporting any errors
    Validate,

    /// List recorded reconciliation runs
    History {
        /// Filter by namespace
        #[arg(short, long)]
        namespace: Option<String>,

        /// Filter by observed revision
        #[arg(short, long)]
        revision: Option<String>,

        /// Maximum number of runs to list
        #[arg(short, long)]
        limit: Option<usize>,
    },
}
