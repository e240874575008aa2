//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;

/// A remote object store holding whole model/component archives.
///
/// Archives are moved as single objects, so the contract is deliberately
/// small: existence, whole-object get/put, delete. Integrity is not this
/// layer's job — callers verify fetched bytes against the hash recorded in
/// the metadata store.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object atomically, overwriting any existing object.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Put an object only if it doesn't exist.
    ///
    /// Returns `true` if the object was written, `false` if it already
    /// existed.
    async fn put_if_not_exists(&self, key: &str, data: Bytes) -> StorageResult<bool>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Static identifier for the backend type (e.g. "s3", "filesystem").
    /// Used for logging.
    fn backend_name(&self) -> &'static str;
}
