//! Sync error types.

use thiserror::Error;

/// Errors surfaced by sync operations.
///
/// Nothing here is retried internally; every failure aborts the requested
/// operation and is surfaced to the caller, which owns retry policy.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] modelvault_core::Error),

    #[error(transparent)]
    Metadata(#[from] modelvault_metadata::MetadataError),

    #[error(transparent)]
    Storage(#[from] modelvault_storage::StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("archive integrity mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("inconsistent metadata: {0}")]
    Inconsistent(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
