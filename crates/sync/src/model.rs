//! Model-level sync orchestrator.

use crate::catalog::ComponentCatalog;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteModelStore;
use modelvault_core::{ContentHash, ModelIdentity, SyncConfig};
use modelvault_metadata::{MetadataStore, ModelRow, model_lock_key};
use modelvault_storage::ObjectStore;
use std::sync::Arc;
use tracing::instrument;

/// Decides whether a whole-model upload/download is needed and drives it to
/// completion under the model-level sync lock.
///
/// Existence pre-checks run before lock acquisition and are advisory; the
/// critical section re-reads the model record under the lock, so the final
/// decision is always made from fresh state.
pub struct SyncModel {
    identity: ModelIdentity,
    catalog: ComponentCatalog,
    remote: RemoteModelStore,
    store: Arc<dyn MetadataStore>,
    local_host: String,
}

impl SyncModel {
    /// Create an orchestrator for `party_model_id` + `model_version`.
    pub fn new(
        party_model_id: &str,
        model_version: &str,
        store: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        config: &SyncConfig,
    ) -> SyncResult<Self> {
        let identity = ModelIdentity::parse(party_model_id, model_version)?;
        let catalog = ComponentCatalog::new(identity.clone(), store.clone(), config);
        let remote = RemoteModelStore::new(catalog.cache().clone(), objects);
        Ok(Self {
            identity,
            catalog,
            remote,
            store,
            local_host: config.local_host.clone(),
        })
    }

    pub fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    pub fn catalog(&self) -> &ComponentCatalog {
        &self.catalog
    }

    /// Whether the local cache holds the full artifact.
    pub async fn local_exists(&self) -> SyncResult<bool> {
        self.catalog.exists_all().await
    }

    /// Whether the remote store holds the model archive.
    pub async fn remote_exists(&self) -> SyncResult<bool> {
        self.remote.exists_model().await
    }

    /// Whether a model record exists in the metadata store.
    pub async fn db_exists(&self) -> SyncResult<bool> {
        Ok(self.store.get_model(&self.identity).await?.is_some())
    }

    async fn get_model(&self) -> SyncResult<ModelRow> {
        self.store
            .get_model(&self.identity)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("model record for {}", self.identity)))
    }

    /// Upload the local artifact to the remote store.
    ///
    /// No-op returning `None` when the remote already has the archive and
    /// `force_update` is false, checked again under the model lock so a
    /// queued uploader that raced a winner backs off instead of recording
    /// its own hash over the winner's bytes. Otherwise stores the archive,
    /// records the new hash and this host as origin, and returns the
    /// updated record.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn upload(&self, force_update: bool) -> SyncResult<Option<ModelRow>> {
        if self.remote_exists().await? && !force_update {
            tracing::debug!("remote archive present, skipping upload");
            return Ok(None);
        }

        let _guard = self.store.acquire_lock(&model_lock_key(&self.identity)).await?;

        // The pre-lock check is advisory. An uploader that won the lock
        // first may have stored its archive while we were queued; recording
        // our hash now would decouple the record from the remote bytes.
        if !force_update && self.remote_exists().await? {
            tracing::debug!("remote archive appeared while queued, skipping upload");
            return Ok(None);
        }

        // Re-check under the lock that the record still exists.
        self.get_model().await?;

        let hash = self.remote.store_model(force_update).await?;
        let row = self
            .store
            .update_model_archive(&self.identity, &hash.to_hex(), &self.local_host)
            .await?;

        tracing::info!(hash = %hash, "model upload complete");
        Ok(Some(row))
    }

    /// Download the artifact from the remote store into the local cache.
    ///
    /// No-op returning `None` when the cache is already complete and
    /// `force_update` is false. Under the lock, the archive is restored only
    /// when `force_update` is set or the record's origin host differs from
    /// this host; the restore verifies the recorded hash before extracting.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn download(&self, force_update: bool) -> SyncResult<Option<ModelRow>> {
        if self.local_exists().await? && !force_update {
            tracing::debug!("local cache complete, skipping download");
            return Ok(None);
        }

        let _guard = self.store.acquire_lock(&model_lock_key(&self.identity)).await?;

        let row = self.get_model().await?;

        if force_update || row.archive_from_host.as_deref() != Some(self.local_host.as_str()) {
            let hash_hex = row.archive_sha256.as_deref().ok_or_else(|| {
                SyncError::NotFound(format!("no archive recorded for {}", self.identity))
            })?;
            let hash = ContentHash::from_hex(hash_hex)?;
            self.remote.restore_model(&hash, force_update).await?;
            tracing::info!(hash = %hash, "model download complete");
        } else {
            // This host produced the authoritative copy; nothing to fetch.
            tracing::debug!("local host is archive origin, skipping restore");
        }

        Ok(Some(row))
    }
}
