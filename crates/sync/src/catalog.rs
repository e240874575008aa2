//! Component catalog: reconciles per-component metadata between the
//! database rows and the file-based snapshot, and packs/unpacks component
//! archives.
//!
//! The database is authoritative whenever rows exist for the identity; the
//! YAML snapshot is the fallback for imported packages that were never
//! published to the metadata store. The two representations are
//! interchangeable.

use crate::archive;
use crate::cache::ModelCache;
use crate::error::{SyncError, SyncResult};
use modelvault_core::{ContentHash, DefineMeta, ModelIdentity, ProtoIndex, SyncConfig};
use modelvault_metadata::{ComponentFilter, ComponentMetaRow, IdentityPatch, MetadataStore};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Per-component metadata manager for one model version.
pub struct ComponentCatalog {
    identity: ModelIdentity,
    cache: ModelCache,
    store: Arc<dyn MetadataStore>,
}

impl ComponentCatalog {
    pub fn new(
        identity: ModelIdentity,
        store: Arc<dyn MetadataStore>,
        config: &SyncConfig,
    ) -> Self {
        let cache = ModelCache::new(identity.clone(), config);
        Self {
            identity,
            cache,
            store,
        }
    }

    pub fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Filter scoped to this catalog's identity; narrow with
    /// [`ComponentFilter::with_component`] / [`with_alias`](ComponentFilter::with_alias).
    pub fn filter(&self) -> ComponentFilter {
        ComponentFilter::new(self.identity.clone())
    }

    /// Whether every artifact file the metadata names for `component_name`
    /// is present on disk.
    ///
    /// Fails with `NotFound` when the metadata store has no rows for the
    /// component — absence of metadata is an error, not "false".
    pub async fn exists(&self, component_name: &str) -> SyncResult<bool> {
        let rows = self
            .store
            .find_components(&self.filter().with_component(component_name))
            .await?;
        if rows.is_empty() {
            return Err(SyncError::NotFound(format!(
                "define_meta rows for component {component_name} of {}",
                self.identity
            )));
        }

        for row in &rows {
            let dir = self
                .cache
                .component_variables_path(&row.component_name, &row.model_alias);
            for file_name in row.model_proto_index.0.keys() {
                if !dir.join(file_name).is_file() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Whether every component the define-meta names is present on disk.
    ///
    /// Resolves define-meta from the database or the snapshot; returns
    /// `false` when neither exists.
    pub async fn exists_all(&self) -> SyncResult<bool> {
        let meta = match self.get_define_meta().await {
            Ok(meta) => meta,
            Err(SyncError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        if meta.is_empty() {
            return Ok(false);
        }

        for (component_name, aliases) in &meta.model_proto {
            for (model_alias, proto_index) in aliases {
                let dir = self.cache.component_variables_path(component_name, model_alias);
                for file_name in proto_index.keys() {
                    if !dir.join(file_name).is_file() {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// The define-meta document: database view when rows exist, snapshot
    /// otherwise.
    pub async fn get_define_meta(&self) -> SyncResult<DefineMeta> {
        let rows = self.store.find_components(&self.filter()).await?;
        if rows.is_empty() {
            return self.cache.read_define_meta().await;
        }
        Ok(Self::rearrange(&rows))
    }

    fn rearrange(rows: &[ComponentMetaRow]) -> DefineMeta {
        DefineMeta::from_rows(rows.iter().map(|row| {
            (
                row.component_name.clone(),
                row.component_module_name.clone(),
                row.model_alias.clone(),
                row.model_proto_index.0.clone(),
            )
        }))
    }

    /// Record one (component, alias) in the metadata store.
    pub async fn save_define_meta(
        &self,
        component_name: &str,
        component_module_name: &str,
        model_alias: &str,
        model_proto_index: ProtoIndex,
        run_parameters: serde_json::Value,
    ) -> SyncResult<()> {
        let row = ComponentMetaRow::new(
            &self.identity,
            component_name,
            component_module_name,
            model_alias,
            model_proto_index,
            run_parameters,
        );
        self.store.insert_components(&[row]).await?;
        Ok(())
    }

    /// One-way migration: database rows -> file snapshot.
    ///
    /// Fails with `NotFound` when there is nothing to export, and with
    /// `AlreadyExists` when the snapshot or any run-parameters file is
    /// already on disk — never a silent merge.
    pub async fn export_define_meta_to_file(&self) -> SyncResult<()> {
        let rows = self.store.find_components(&self.filter()).await?;
        if rows.is_empty() {
            return Err(SyncError::NotFound(format!(
                "no define_meta rows for {} to export",
                self.identity
            )));
        }

        for row in &rows {
            self.cache
                .write_run_parameters(&row.component_name, &row.run_parameters.0)
                .await?;
        }
        self.cache.write_define_meta(&Self::rearrange(&rows)).await?;

        tracing::info!(identity = %self.identity, rows = rows.len(), "exported define_meta to snapshot");
        Ok(())
    }

    /// One-way migration: file snapshot -> database rows.
    ///
    /// Refuses with `AlreadyExists` when any row already exists for the
    /// identity.
    pub async fn import_define_meta_from_file(&self) -> SyncResult<()> {
        let count = self.store.count_components(&self.filter()).await?;
        if count > 0 {
            return Err(SyncError::AlreadyExists(format!(
                "define_meta rows for {} already in database",
                self.identity
            )));
        }

        let meta = self.cache.read_define_meta().await?;
        let run_parameters = self.cache.read_run_parameters().await?;

        let rows: Vec<ComponentMetaRow> = meta
            .to_rows()
            .into_iter()
            .map(|(component_name, module_name, model_alias, proto_index)| {
                let parameters = run_parameters
                    .get(&component_name)
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({}));
                ComponentMetaRow::new(
                    &self.identity,
                    component_name,
                    module_name,
                    model_alias,
                    proto_index,
                    parameters,
                )
            })
            .collect();

        self.store.insert_components(&rows).await?;
        tracing::info!(identity = %self.identity, rows = rows.len(), "imported define_meta from snapshot");
        Ok(())
    }

    /// Fork metadata rows for a new identity.
    ///
    /// Reads rows matching `filter` (fails with `NotFound` when none match)
    /// and inserts copies with the identity fields overwritten by `patch`.
    /// Source rows are untouched.
    pub async fn replicate_define_meta(
        &self,
        patch: &IdentityPatch,
        filter: &ComponentFilter,
    ) -> SyncResult<()> {
        let rows = self.store.find_components(filter).await?;
        if rows.is_empty() {
            return Err(SyncError::NotFound(format!(
                "no define_meta rows matching filter for {}",
                self.identity
            )));
        }

        let copies: Vec<ComponentMetaRow> =
            rows.iter().map(|row| row.replicated(patch)).collect();
        self.store.insert_components(&copies).await?;

        tracing::info!(
            identity = %self.identity,
            rows = copies.len(),
            "replicated define_meta rows"
        );
        Ok(())
    }

    /// Run parameters per component: database view when rows exist, files
    /// otherwise.
    pub async fn run_parameters(&self) -> SyncResult<BTreeMap<String, serde_json::Value>> {
        let rows = self.store.find_components(&self.filter()).await?;
        if rows.is_empty() {
            return self.cache.read_run_parameters().await;
        }
        Ok(rows
            .into_iter()
            .map(|row| (row.component_name, row.run_parameters.0))
            .collect())
    }

    /// Pack a component's file tree into a staged archive.
    pub async fn pack_component(
        &self,
        component_name: &str,
    ) -> SyncResult<(PathBuf, ContentHash)> {
        archive::pack_component(&self.cache, component_name).await
    }

    /// Unpack a component's staged archive, verifying `expected` first when
    /// given.
    pub async fn unpack_component(
        &self,
        component_name: &str,
        expected: Option<&ContentHash>,
    ) -> SyncResult<()> {
        archive::unpack_component(&self.cache, component_name, expected).await
    }
}
