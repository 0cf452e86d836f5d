//! Permission error types.
//!
//! Every failure in this subsystem is a local, synchronous contract
//! violation returned at the call that caused it. Unknown permission names
//! and dangling child references are not errors; they resolve to safe
//! defaults.

use permit_types::{AttachmentId, ErrorCode};
use thiserror::Error;

/// Error produced by a removal callback.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by registry, attachment and subject operations.
///
/// # Example
///
/// ```
/// use permit_auth::{ErrorKind, PermissionError};
/// use permit_types::ErrorCode;
///
/// let err = PermissionError::DuplicateName { name: "cmd.fly".to_string() };
/// assert_eq!(err.kind(), ErrorKind::DuplicateName);
/// assert_eq!(err.code(), "PERM_DUPLICATE_NAME");
/// assert!(err.to_string().contains("cmd.fly"));
/// ```
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The attachment is not active on the subject (foreign or already removed).
    #[error("{attachment} is not attached to this subject")]
    NotAttached {
        /// The attachment that was targeted.
        attachment: AttachmentId,
    },

    /// A node with the same (case-insensitive) name is already registered.
    #[error("permission '{name}' is already registered")]
    DuplicateName {
        /// Normalized name of the colliding node.
        name: String,
    },

    /// A removal callback tried to remove its own attachment.
    #[error("removal callback of {attachment} attempted to remove its own attachment")]
    ReentrantRemoval {
        /// The attachment whose callback re-entered removal.
        attachment: AttachmentId,
    },

    /// The removal callback failed. The attachment is removed regardless.
    #[error("removal callback of {attachment} failed: {source}")]
    RemovalCallback {
        /// The attachment that was removed.
        attachment: AttachmentId,
        /// Error returned by the callback.
        #[source]
        source: CallbackError,
    },

    /// Text could not be parsed as a [`PermissionDefault`](crate::PermissionDefault).
    #[error("invalid permission default '{value}'")]
    InvalidDefault {
        /// The rejected input.
        value: String,
    },
}

/// Discriminant of [`PermissionError`], for matching without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`PermissionError::NotAttached`].
    NotAttached,
    /// See [`PermissionError::DuplicateName`].
    DuplicateName,
    /// See [`PermissionError::ReentrantRemoval`].
    ReentrantRemoval,
    /// See [`PermissionError::RemovalCallback`].
    RemovalCallback,
    /// See [`PermissionError::InvalidDefault`].
    InvalidDefault,
}

impl PermissionError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAttached { .. } => ErrorKind::NotAttached,
            Self::DuplicateName { .. } => ErrorKind::DuplicateName,
            Self::ReentrantRemoval { .. } => ErrorKind::ReentrantRemoval,
            Self::RemovalCallback { .. } => ErrorKind::RemovalCallback,
            Self::InvalidDefault { .. } => ErrorKind::InvalidDefault,
        }
    }
}

impl ErrorCode for PermissionError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotAttached { .. } => "PERM_NOT_ATTACHED",
            Self::DuplicateName { .. } => "PERM_DUPLICATE_NAME",
            Self::ReentrantRemoval { .. } => "PERM_REENTRANT_REMOVAL",
            Self::RemovalCallback { .. } => "PERM_REMOVAL_CALLBACK",
            Self::InvalidDefault { .. } => "PERM_INVALID_DEFAULT",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
