//! # Storage Backend Trait

use super::errors::{StorageError, StorageResult};

/// Backend trait for attachment storage.
///
/// Paths are relative, `/`-separated locations built from a model's
/// upload template.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Write data to path, creating intermediate directories
    fn write(&self, path: &str, data: &[u8]) -> StorageResult<()>;

    /// Read data from path
    fn read(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Delete file at path
    fn delete(&self, path: &str) -> StorageResult<()>;

    /// Check if path exists
    fn exists(&self, path: &str) -> StorageResult<bool>;
}

/// Reject absolute paths and parent-directory segments
pub fn validate_path(path: &str) -> StorageResult<()> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.starts_with('\\')
        || path.contains(':')
        || path.split(['/', '\\']).any(|seg| seg == "..");

    if invalid {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("products/p1/a.png").is_ok());
        assert!(validate_path("").is_err());
        assert!(validate_path("/etc/passwd").is_err());
        assert!(validate_path("products/../../etc").is_err());
        assert!(validate_path("C:\\x").is_err());
    }
}
