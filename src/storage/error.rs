//! Storage layer error types
//!
//! All errors that can occur during storage operations are defined here
//! We use `thiserror` for ergonomic error definition and better error messages

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::{BlobId, CommitId, InvalidDigestError};

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// a source file given to `add` could not be read
    #[error("cannot read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// the requested blob is not in the object store
    #[error("blob not found: {0}")]
    BlobNotFound(BlobId),

    /// the requested commit is not in the object store
    #[error("commit not found: {0}")]
    CommitNotFound(CommitId),

    /// commit attempted with nothing staged
    #[error("nothing to commit: staging index is empty")]
    EmptyStaging,

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// a digest string failed validation
    #[error("invalid digest: {0}")]
    InvalidDigest(#[from] InvalidDigestError),

    /// data integrity check failed
    #[error("corrupted data at {path}: {reason}")]
    CorruptedData { path: PathBuf, reason: String },

    /// the commit object and HEAD were written but the index still holds entries
    #[error("commit {commit} recorded but the staging index was not cleared: {reason}")]
    IndexNotCleared { commit: CommitId, reason: String },

    /// HEAD moved between reading it and writing the new commit
    #[error("concurrent modification: HEAD expected {}, found {}", display_head(.expected), display_head(.found))]
    ConcurrentModification {
        expected: Option<CommitId>,
        found: Option<CommitId>,
    },

    /// store is not initialized
    #[error("store not initialized: {0}")]
    NotInitialized(PathBuf),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// check if this error indicates the object doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::BlobNotFound(_) | StorageError::CommitNotFound(_)
        )
    }

    /// check if this error means the store itself is damaged or unusable
    ///
    /// structural errors halt the whole operation; the others only affect
    /// the item being processed
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            StorageError::Serialization(_)
                | StorageError::CorruptedData { .. }
                | StorageError::IndexNotCleared { .. }
                | StorageError::NotInitialized(_)
                | StorageError::Io(_)
        )
    }

    /// check if this error is recoverable by retry
    pub fn is_retriable(&self) -> bool {
        matches!(self, StorageError::ConcurrentModification { .. })
    }

    pub(crate) fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StorageError::CorruptedData {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

fn display_head(head: &Option<CommitId>) -> String {
    match head {
        Some(id) => id.short().to_string(),
        None => "(empty)".to_string(),
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
