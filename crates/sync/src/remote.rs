//! Remote store adapter: moves whole model and component archives between
//! the local cache and an object store.
//!
//! Every restore path verifies the fetched bytes against the hash recorded
//! in the metadata store before anything touches the cache, force or not.
//! Bytes that fail verification are never staged.

use crate::archive;
use crate::cache::ModelCache;
use crate::error::{SyncError, SyncResult};
use bytes::Bytes;
use modelvault_core::{ContentHash, ModelIdentity};
use modelvault_storage::{ObjectStore, StorageError};
use std::sync::Arc;
use tracing::instrument;

/// Blob-store operations for one model version.
pub struct RemoteModelStore {
    identity: ModelIdentity,
    cache: ModelCache,
    objects: Arc<dyn ObjectStore>,
}

impl RemoteModelStore {
    pub fn new(cache: ModelCache, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            identity: cache.identity().clone(),
            cache,
            objects,
        }
    }

    fn model_key(&self) -> String {
        format!(
            "models/{}/{}.zip",
            self.identity.party_model_id(),
            self.identity.model_version()
        )
    }

    fn component_key(&self, component_name: &str) -> String {
        format!(
            "components/{}/{}/{component_name}.zip",
            self.identity.party_model_id(),
            self.identity.model_version()
        )
    }

    pub async fn exists_model(&self) -> SyncResult<bool> {
        Ok(self.objects.exists(&self.model_key()).await?)
    }

    pub async fn exists_component(&self, component_name: &str) -> SyncResult<bool> {
        Ok(self.objects.exists(&self.component_key(component_name)).await?)
    }

    /// Pack the whole model tree and upload it.
    ///
    /// Returns the SHA-256 of the packed bytes. Without `force_update`, an
    /// already-present remote object is left as is (the hash of the local
    /// pack is still returned).
    #[instrument(skip(self), fields(identity = %self.identity, backend = self.objects.backend_name()))]
    pub async fn store_model(&self, force_update: bool) -> SyncResult<ContentHash> {
        let (archive_path, hash) = archive::pack_model(&self.cache).await?;
        let data = Bytes::from(tokio::fs::read(&archive_path).await?);
        let key = self.model_key();

        if force_update {
            self.objects.put(&key, data).await?;
        } else {
            self.objects.put_if_not_exists(&key, data).await?;
        }

        tracing::info!(key, hash = %hash, "stored model archive");
        Ok(hash)
    }

    /// Download the model archive, verify it against `expected`, and extract
    /// it into the model root.
    #[instrument(skip(self), fields(identity = %self.identity, backend = self.objects.backend_name()))]
    pub async fn restore_model(&self, expected: &ContentHash, force_update: bool) -> SyncResult<()> {
        let key = self.model_key();
        let data = self.get_required(&key).await?;

        let actual = ContentHash::compute(&data);
        if actual != *expected {
            return Err(SyncError::IntegrityMismatch {
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            });
        }

        self.stage(&self.cache.model_archive_path(), &data).await?;
        archive::unpack_model(&self.cache, Some(expected)).await?;

        tracing::info!(key, hash = %expected, "restored model archive");
        Ok(())
    }

    /// Pack one component and upload its archive, returning the new hash.
    #[instrument(skip(self), fields(identity = %self.identity, backend = self.objects.backend_name()))]
    pub async fn upload_component(&self, component_name: &str) -> SyncResult<ContentHash> {
        let (archive_path, hash) = archive::pack_component(&self.cache, component_name).await?;
        let data = Bytes::from(tokio::fs::read(&archive_path).await?);
        let key = self.component_key(component_name);

        self.objects.put(&key, data).await?;

        tracing::info!(key, hash = %hash, "uploaded component archive");
        Ok(hash)
    }

    /// Download one component's archive, verify it against `expected`, and
    /// extract it.
    #[instrument(skip(self), fields(identity = %self.identity, backend = self.objects.backend_name()))]
    pub async fn download_component(
        &self,
        component_name: &str,
        expected: &ContentHash,
    ) -> SyncResult<()> {
        let key = self.component_key(component_name);
        let data = self.get_required(&key).await?;

        let actual = ContentHash::compute(&data);
        if actual != *expected {
            return Err(SyncError::IntegrityMismatch {
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            });
        }

        self.stage(&self.cache.component_archive_path(component_name), &data)
            .await?;
        archive::unpack_component(&self.cache, component_name, Some(expected)).await?;

        tracing::info!(key, hash = %expected, "downloaded component archive");
        Ok(())
    }

    async fn get_required(&self, key: &str) -> SyncResult<Bytes> {
        match self.objects.get(key).await {
            Ok(data) => Ok(data),
            Err(StorageError::NotFound(_)) => Err(SyncError::NotFound(format!(
                "remote archive {key} for {}",
                self.identity
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Write verified bytes to a staging path via temp file + rename.
    async fn stage(&self, path: &std::path::Path, data: &Bytes) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = path.with_extension("zip.partial");
        tokio::fs::write(&temp_path, data).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }
}
