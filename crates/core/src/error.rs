//! Core error types shared across the reconciliation pipeline.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use thiserror::Error;

/// Core error type for Varuna operations.
#[derive(Debug, Error)]
pub enum Error {
    // Manifest source errors
    #[error("manifest source unavailable: {reason}")]
    SourceUnavailable { reason: String },

    #[error("failed to parse manifest '{origin}': {reason}")]
    ParseError { origin: String, reason: String },

    // Platform errors
    #[error("platform unreachable: {reason}")]
    PlatformUnreachable { reason: String },

    #[error("conflicting write to '{resource}': {reason}")]
    ApplyConflict { resource: String, reason: String },

    #[error("permission denied for '{resource}': {reason}")]
    PermissionDenied { resource: String, reason: String },

    #[error("resource '{resource}' not found")]
    ResourceNotFound { resource: String },

    // Configuration and audit errors
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("history store error: {reason}")]
    HistoryError { reason: String },

    // Generic I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a source unavailable error.
    pub fn source_unavailable(reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a parse error for a document origin (file path or document index).
    pub fn parse_error(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseError {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Create a platform unreachable error.
    pub fn platform_unreachable(reason: impl Into<String>) -> Self {
        Self::PlatformUnreachable {
            reason: reason.into(),
        }
    }

    /// Create an apply conflict error.
    pub fn apply_conflict(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ApplyConflict {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create a permission denied error.
    pub fn permission_denied(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create a resource not found error.
    pub fn resource_not_found(resource: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            resource: resource.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a history store error.
    pub fn history_error(reason: impl Into<String>) -> Self {
        Self::HistoryError {
            reason: reason.into(),
        }
    }

    /// Whether an apply failure with this error is worth retrying.
    ///
    /// Transient failures (platform flakes, concurrent writers, I/O) are
    /// retried with backoff; structural failures (bad documents, missing
    /// permissions) are fatal for their entry and must not be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::PlatformUnreachable { .. } | Self::ApplyConflict { .. } | Self::Io(_)
        )
    }
}
