//! # File Storage Errors

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// File storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    // Object errors
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    // Validation errors
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // I/O errors
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    // Image re-encoding
    #[error("Image processing failed: {0}")]
    Image(String),

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::ObjectNotFound(_) => 404,
            StorageError::InvalidPath(_) => 400,
            StorageError::WriteFailed(_) => 500,
            StorageError::ReadFailed(_) => 500,
            StorageError::DeleteFailed(_) => 500,
            StorageError::Image(_) => 500,
            StorageError::Internal(_) => 500,
        }
    }
}
