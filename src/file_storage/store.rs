//! # Async File Store
//!
//! Runs blocking backend calls on tokio's blocking pool so attachment I/O
//! is a suspension point for the engine rather than a stall.

use std::sync::Arc;

use tokio::task;

use super::backend::StorageBackend;
use super::errors::{StorageError, StorageResult};

/// Shared, clonable handle to a storage backend
#[derive(Debug, Clone)]
pub struct FileStore {
    backend: Arc<dyn StorageBackend>,
}

impl FileStore {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_arc(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub async fn write(&self, path: &str, data: Vec<u8>) -> StorageResult<()> {
        let path = path.to_string();
        self.blocking(move |b| b.write(&path, &data)).await
    }

    pub async fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let path = path.to_string();
        self.blocking(move |b| b.read(&path)).await
    }

    pub async fn delete(&self, path: &str) -> StorageResult<()> {
        let path = path.to_string();
        self.blocking(move |b| b.delete(&path)).await
    }

    pub async fn exists(&self, path: &str) -> StorageResult<bool> {
        let path = path.to_string();
        self.blocking(move |b| b.exists(&path)).await
    }

    async fn blocking<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn StorageBackend) -> StorageResult<T> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        task::spawn_blocking(move || f(backend.as_ref()))
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_storage::LocalBackend;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_through_blocking_pool() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(LocalBackend::new(temp.path()));

        store.write("a/b.txt", b"hi".to_vec()).await.unwrap();
        assert!(store.exists("a/b.txt").await.unwrap());
        assert_eq!(store.read("a/b.txt").await.unwrap(), b"hi");

        store.delete("a/b.txt").await.unwrap();
        assert!(!store.exists("a/b.txt").await.unwrap());
    }
}
