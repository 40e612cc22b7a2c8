//! Error types for inksync.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for local operations (scan, diff).
///
/// Same error type as [`SyncResult`]; the alias marks functions that never
/// touch the device.
pub type CoreResult<T> = Result<T, SyncError>;

/// Errors that can occur while synchronizing a device.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No HTTP connectivity after the retry budget was spent.
    #[error("device unreachable at {host}: {reason}")]
    DeviceUnreachable {
        /// Host that was contacted.
        host: String,
        /// Last transport failure.
        reason: String,
    },

    /// The device refused the request (4xx).
    #[error("request rejected ({status}): {reason}")]
    RequestRejected {
        /// HTTP status code.
        status: u16,
        /// Reason reported by the device.
        reason: String,
    },

    /// The device kept failing internally (5xx) after retries.
    #[error("device error ({status}): {reason}")]
    DeviceError {
        /// HTTP status code.
        status: u16,
        /// Reason reported by the device.
        reason: String,
    },

    /// The local source root is missing or unreadable.
    #[error("source not found: {}: {reason}", path.display())]
    SourceNotFound {
        /// Root that was requested.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Two local files map to the same gallery and file name.
    #[error(
        "duplicate asset key {gallery}/{filename}: {} and {}",
        first.display(),
        second.display()
    )]
    DuplicateAssetKey {
        /// Gallery of the key.
        gallery: String,
        /// File name of the key.
        filename: String,
        /// First local file.
        first: PathBuf,
        /// Second local file.
        second: PathBuf,
    },

    /// The device answered with a payload that could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The run was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a `DeviceUnreachable` error.
    pub fn unreachable(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeviceUnreachable {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `RequestRejected` error.
    pub fn rejected(status: u16, reason: impl Into<String>) -> Self {
        Self::RequestRejected {
            status,
            reason: reason.into(),
        }
    }

    /// Creates a `SourceNotFound` error.
    pub fn source_not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceNotFound {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the operation can be retried.
    ///
    /// Connection-level failures and device-side 5xx errors are transient;
    /// explicit rejections are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::DeviceUnreachable { .. } | SyncError::DeviceError { .. }
        )
    }

    /// Returns true if the error comes from the local source tree.
    ///
    /// Such errors are raised before the device is touched and end a run
    /// with `Err` rather than a failed report.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SyncError::SourceNotFound { .. } | SyncError::DuplicateAssetKey { .. }
        )
    }

    /// Returns the serializable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::DeviceUnreachable { .. } => ErrorKind::DeviceUnreachable,
            SyncError::RequestRejected { .. } => ErrorKind::RequestRejected,
            SyncError::DeviceError { .. } => ErrorKind::DeviceError,
            SyncError::SourceNotFound { .. } => ErrorKind::SourceNotFound,
            SyncError::DuplicateAssetKey { .. } => ErrorKind::DuplicateAssetKey,
            SyncError::Protocol(_) => ErrorKind::Protocol,
            SyncError::Io(_) => ErrorKind::Io,
            SyncError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Kind of a [`SyncError`], without its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`SyncError::DeviceUnreachable`].
    DeviceUnreachable,
    /// See [`SyncError::RequestRejected`].
    RequestRejected,
    /// See [`SyncError::DeviceError`].
    DeviceError,
    /// See [`SyncError::SourceNotFound`].
    SourceNotFound,
    /// See [`SyncError::DuplicateAssetKey`].
    DuplicateAssetKey,
    /// See [`SyncError::Protocol`].
    Protocol,
    /// See [`SyncError::Io`].
    Io,
    /// See [`SyncError::Cancelled`].
    Cancelled,
}
