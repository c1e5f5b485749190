use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use super::BlobStorage;
use crate::errors::StorageError;

/// Blobs as files under a single root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalBlobStorage { root: root.into() }
    }

    /// Creates the root directory if it is missing.
    pub async fn init(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let storage = Self::new(root);
        fs::create_dir_all(&storage.root)
            .await
            .map_err(|e| StorageError::Io(format!("{}: {}", storage.root.display(), e)))?;
        Ok(storage)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let is_plain = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !is_plain {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(path: &str, err: std::io::Error) -> StorageError {
    match err.kind() {
        std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
        _ => StorageError::Io(format!("{}: {}", path, err)),
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        let parent = target.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent).await.map_err(|e| io_error(path, e))?;

        // Write beside the target, then rename into place.
        let staging = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        if let Err(e) = fs::write(&staging, bytes).await {
            let _ = fs::remove_file(&staging).await;
            return Err(io_error(path, e));
        }
        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(io_error(path, e));
        }

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.resolve(path)?;
        fs::read(&target).await.map_err(|e| io_error(path, e))
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let target = self.resolve(path)?;
        fs::try_exists(&target).await.map_err(|e| io_error(path, e))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalBlobStorage::new(dir.path());

        storage.write("a.png", b"bytes").await.unwrap();

        assert!(storage.exists("a.png").await.unwrap());
        assert_eq!(storage.read("a.png").await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn overwrite_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalBlobStorage::new(dir.path());

        storage.write("a.png", b"one").await.unwrap();
        storage.write("a.png", b"two").await.unwrap();

        assert_eq!(storage.read("a.png").await.unwrap(), b"two");
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalBlobStorage::new(dir.path());

        assert!(!storage.exists("nope.png").await.unwrap());
        assert!(matches!(storage.read("nope.png").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_removes_blob_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalBlobStorage::new(dir.path());

        storage.write("a.png", b"bytes").await.unwrap();
        storage.delete("a.png").await.unwrap();

        assert!(!storage.exists("a.png").await.unwrap());
        storage.delete("a.png").await.unwrap();
        assert!(matches!(storage.delete("../a.png").await, Err(StorageError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn escaping_paths_are_rejected() {
        let storage = LocalBlobStorage::new("/tmp/unused");

        for path in ["../etc/passwd", "/etc/passwd", "", "a/../../b", "./a.png"] {
            assert!(
                matches!(storage.read(path).await, Err(StorageError::InvalidPath(_))),
                "{path} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn init_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested/blobs");

        let storage = LocalBlobStorage::init(&root).await.unwrap();

        assert!(root.is_dir());
        assert_eq!(storage.root(), root.as_path());
    }
}
