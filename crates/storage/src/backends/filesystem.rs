//! Local filesystem storage backend.
//!
//! Backs onto a rooted directory, typically a shared mount in production
//! and a tempdir in tests.

use crate::error::{StorageError, StorageResult};
use crate::traits::ObjectStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Local filesystem object store.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Get the full path for a key, with path traversal protection.
    ///
    /// Returns an error if the key would escape the storage root.
    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "path traversal not allowed: {key}"
            )));
        }

        // All path components must be normal (no .., ., root prefixes).
        for component in Path::new(key).components() {
            match component {
                std::path::Component::Normal(_) => {}
                _ => {
                    return Err(StorageError::InvalidKey(format!(
                        "contains unsafe path component: {key}"
                    )));
                }
            }
        }

        Ok(self.root.join(key))
    }

    /// Ensure parent directory exists.
    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_path(key)?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_path(key)?;
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.key_path(key)?;
        self.ensure_parent(&path).await?;

        // Write to a uniquely named temp file, fsync, then rename: a failed
        // transfer never leaves a partial object at the final path.
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        let temp_path = path.with_file_name(
            path.file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        );
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &path).await?;

        Ok(())
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put_if_not_exists(&self, key: &str, data: Bytes) -> StorageResult<bool> {
        let path = self.key_path(key)?;

        // Check-then-write race: concurrent writers of the same key are
        // already serialized by the sync lock at the orchestration layer,
        // and archives are content-addressed by the recorded hash, so a
        // redundant write is the worst case.
        if fs::try_exists(&path).await.map_err(StorageError::Io)? {
            return Ok(false);
        }
        self.put(key, data).await?;
        Ok(true)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_get_exists_delete() {
        let temp = tempdir().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();

        assert!(!backend.exists("models/a/v1.zip").await.unwrap());
        backend
            .put("models/a/v1.zip", Bytes::from_static(b"archive"))
            .await
            .unwrap();
        assert!(backend.exists("models/a/v1.zip").await.unwrap());
        assert_eq!(
            backend.get("models/a/v1.zip").await.unwrap(),
            Bytes::from_static(b"archive")
        );

        backend.delete("models/a/v1.zip").await.unwrap();
        assert!(!backend.exists("models/a/v1.zip").await.unwrap());
        // Deleting again is not an error.
        backend.delete("models/a/v1.zip").await.unwrap();
    }

    #[tokio::test]
    async fn test_put_if_not_exists() {
        let temp = tempdir().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();

        assert!(backend
            .put_if_not_exists("k", Bytes::from_static(b"first"))
            .await
            .unwrap());
        assert!(!backend
            .put_if_not_exists("k", Bytes::from_static(b"second"))
            .await
            .unwrap());
        assert_eq!(backend.get("k").await.unwrap(), Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let temp = tempdir().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();

        for key in ["../escape", "/abs", "a/../../b", ""] {
            match backend.get(key).await {
                Err(StorageError::InvalidKey(_)) => {}
                other => panic!("expected InvalidKey for {key:?}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let temp = tempdir().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();

        match backend.get("missing").await {
            Err(StorageError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
