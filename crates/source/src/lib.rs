//! Manifest fetching for Varuna.
//!
//! A [`ManifestSource`] hands back the complete desired-state tree at a
//! revision. Fetching is idempotent per revision: the same revision always
//! yields a byte-identical tree, which [`DirSource`] enforces by keying its
//! cache on a sha256 digest of the manifest files.
//!
//! [`SourceWatcher`] turns filesystem changes under the manifest root into
//! change signals for the drift monitor.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod dir;
pub mod parse;
pub mod source;
pub mod types;
pub mod watch;

pub use dir::DirSource;
pub use parse::parse_documents;
pub use source::{InMemorySource, ManifestSource};
pub use types::{ManifestTree, Revision};
pub use watch::SourceWatcher;
