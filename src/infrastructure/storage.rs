//! Blob storage for image bytes. Paths are opaque relative keys
//! (`<uuid>.<ext>`) shared by the API and the worker.

mod local;

use async_trait::async_trait;

use crate::errors::StorageError;

pub use self::local::LocalBlobStorage;

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Readers never observe a partially written blob.
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Removing a blob that is already gone is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}
