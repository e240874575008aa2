//! Component-level sync orchestrator.

use crate::catalog::ComponentCatalog;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteModelStore;
use modelvault_core::{ContentHash, ModelIdentity, SyncConfig};
use modelvault_metadata::{ComponentFilter, MetadataStore, component_lock_key};
use modelvault_storage::ObjectStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::instrument;

/// Drives upload/download of a single component's archive under the
/// component-level sync lock.
///
/// Unlike whole-model sync there is no existence short-circuit: component
/// transfers always take the lock and always move bytes, so repeated uploads
/// of unchanged trees converge on the same recorded hash.
pub struct SyncComponent {
    identity: ModelIdentity,
    component_name: String,
    catalog: ComponentCatalog,
    remote: RemoteModelStore,
    store: Arc<dyn MetadataStore>,
    local_host: String,
}

impl SyncComponent {
    /// Create an orchestrator for one component of `party_model_id` +
    /// `model_version`.
    pub fn new(
        party_model_id: &str,
        model_version: &str,
        component_name: &str,
        store: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        config: &SyncConfig,
    ) -> SyncResult<Self> {
        let identity = ModelIdentity::parse(party_model_id, model_version)?;
        let catalog = ComponentCatalog::new(identity.clone(), store.clone(), config);
        let remote = RemoteModelStore::new(catalog.cache().clone(), objects);
        Ok(Self {
            identity,
            component_name: component_name.to_string(),
            catalog,
            remote,
            store,
            local_host: config.local_host.clone(),
        })
    }

    pub fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    pub fn catalog(&self) -> &ComponentCatalog {
        &self.catalog
    }

    fn filter(&self) -> ComponentFilter {
        self.catalog.filter().with_component(&self.component_name)
    }

    fn lock_key(&self) -> String {
        component_lock_key(&self.identity, &self.component_name)
    }

    /// Whether every artifact file the metadata names for this component is
    /// on disk.
    pub async fn local_exists(&self) -> SyncResult<bool> {
        self.catalog.exists(&self.component_name).await
    }

    /// Whether the remote store holds this component's archive.
    pub async fn remote_exists(&self) -> SyncResult<bool> {
        self.remote.exists_component(&self.component_name).await
    }

    /// The single archive hash recorded for this component.
    ///
    /// All rows for the component must agree on (hash, origin host):
    /// `NotFound` when no rows exist, `Inconsistent` when they disagree.
    /// `None` means rows exist but no archive has been uploaded yet.
    pub async fn get_archive_hash(&self) -> SyncResult<Option<ContentHash>> {
        let rows = self.store.find_components(&self.filter()).await?;
        if rows.is_empty() {
            return Err(SyncError::NotFound(format!(
                "define_meta rows for component {} of {}",
                self.component_name, self.identity
            )));
        }

        let groups: BTreeSet<(Option<String>, Option<String>)> = rows
            .iter()
            .map(|row| (row.archive_sha256.clone(), row.archive_from_host.clone()))
            .collect();
        if groups.len() != 1 {
            return Err(SyncError::Inconsistent(format!(
                "component {} of {} has {} distinct (hash, host) archive records",
                self.component_name,
                self.identity,
                groups.len()
            )));
        }

        match rows[0].archive_sha256.as_deref() {
            Some(hex) => Ok(Some(ContentHash::from_hex(hex)?)),
            None => Ok(None),
        }
    }

    /// Record a new archive hash, with this host as origin, on every row of
    /// this component.
    pub async fn update_archive_hash(&self, hash: &ContentHash) -> SyncResult<u64> {
        let updated = self
            .store
            .update_component_archive(&self.filter(), &hash.to_hex(), &self.local_host)
            .await?;
        if updated == 0 {
            return Err(SyncError::NotFound(format!(
                "define_meta rows for component {} of {}",
                self.component_name, self.identity
            )));
        }
        Ok(updated)
    }

    /// Pack and upload this component's archive, then record its hash.
    ///
    /// Reads the current hash first so a metadata inconsistency aborts
    /// before any bytes move.
    #[instrument(skip(self), fields(identity = %self.identity, component = %self.component_name))]
    pub async fn upload(&self) -> SyncResult<ContentHash> {
        let _guard = self.store.acquire_lock(&self.lock_key()).await?;

        self.get_archive_hash().await?;

        let hash = self.remote.upload_component(&self.component_name).await?;
        self.update_archive_hash(&hash).await?;

        tracing::info!(hash = %hash, "component upload complete");
        Ok(hash)
    }

    /// Download this component's archive, verify it against the recorded
    /// hash, and extract it into the cache.
    #[instrument(skip(self), fields(identity = %self.identity, component = %self.component_name))]
    pub async fn download(&self) -> SyncResult<ContentHash> {
        let _guard = self.store.acquire_lock(&self.lock_key()).await?;

        let hash = self.get_archive_hash().await?.ok_or_else(|| {
            SyncError::NotFound(format!(
                "no archive recorded for component {} of {}",
                self.component_name, self.identity
            ))
        })?;

        self.remote
            .download_component(&self.component_name, &hash)
            .await?;

        tracing::info!(hash = %hash, "component download complete");
        Ok(hash)
    }
}
