//! # Local Filesystem Backend

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::backend::{validate_path, StorageBackend};
use super::errors::{StorageError, StorageResult};

/// Local filesystem storage backend rooted at a directory
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new local backend
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> StorageResult<PathBuf> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }
}

impl StorageBackend for LocalBackend {
    fn write(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let full_path = self.full_path(path)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        }

        fs::write(&full_path, data).map_err(|e| StorageError::WriteFailed(e.to_string()))
    }

    fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let full_path = self.full_path(path)?;

        fs::read(&full_path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound(path.to_string())
            } else {
                StorageError::ReadFailed(e.to_string())
            }
        })
    }

    fn delete(&self, path: &str) -> StorageResult<()> {
        let full_path = self.full_path(path)?;

        fs::remove_file(&full_path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound(path.to_string())
            } else {
                StorageError::DeleteFailed(e.to_string())
            }
        })
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(self.full_path(path)?.is_file())
    }
}
