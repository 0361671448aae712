//! Shared error taxonomy and result combinators for Varuna.
//!
//! Every fallible operation in the workspace returns [`Result`], and the
//! failure classes that cross crate boundaries live in [`Error`]. The
//! reconciliation pipeline uses [`Error::is_transient`] to decide whether an
//! apply failure is worth retrying or is fatal for its entry.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod result;

pub use error::Error;
pub use result::{Result, ResultExt};
