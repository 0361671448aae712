//! Varuna binary crate: CLI surface, configuration and subcommand wiring.
//!
//! The reconciliation machinery itself lives in the workspace crates
//! (`varuna-source`, `varuna-cluster`, `varuna-reconciler`,
//! `varuna-monitor`, `varuna-history`); this crate only assembles them.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
