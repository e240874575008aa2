#![allow(dead_code)]

// Shared harness: one SQLite metadata store, one filesystem object store,
// and per-host cache/staging roots so tests can simulate multiple hosts
// syncing through the same backend.

use modelvault_core::{ModelIdentity, ProtoIndex, StoreAddress, SyncConfig};
use modelvault_metadata::{ComponentMetaRow, MetadataStore, ModelRow, SqliteStore};
use modelvault_storage::ObjectStore;
use modelvault_sync::ModelCache;
use std::sync::Arc;
use tempfile::TempDir;

pub const PARTY_MODEL_ID: &str = "guest#9999#model-a";
pub const MODEL_VERSION: &str = "v1";

pub struct Harness {
    pub temp: TempDir,
    pub store: Arc<dyn MetadataStore>,
    pub objects: Arc<dyn ObjectStore>,
}

impl Harness {
    pub async fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("metadata.db"), Some(10))
            .await
            .unwrap();
        let objects = modelvault_storage::from_address(&StoreAddress::Filesystem {
            path: temp.path().join("objects"),
        })
        .await
        .unwrap();
        Self {
            temp,
            store: Arc::new(store),
            objects,
        }
    }

    /// Sync config scoped to one simulated host, with its own cache and
    /// staging roots.
    pub fn config_for_host(&self, host: &str) -> SyncConfig {
        SyncConfig::new(self.temp.path().join("cache").join(host))
            .with_temp_dir(self.temp.path().join("staging").join(host))
            .with_local_host(host)
    }

    pub async fn seed_model_record(&self) {
        self.store
            .create_model(&ModelRow::new(&identity()))
            .await
            .unwrap();
    }

    pub async fn seed_component_rows(&self, component: &str, aliases: &[&str]) {
        let rows: Vec<ComponentMetaRow> = aliases
            .iter()
            .map(|alias| component_row(component, alias))
            .collect();
        self.store.insert_components(&rows).await.unwrap();
    }

    /// Write the artifact files the seeded rows name, plus a checkpoint
    /// file, into `host`'s cache.
    pub fn write_component_files(&self, host: &str, component: &str, aliases: &[&str]) {
        let cache = self.cache_for_host(host);
        for alias in aliases {
            let dir = cache.component_variables_path(component, alias);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("param.pb"), format!("{component}/{alias} weights"))
                .unwrap();
        }
        let checkpoint = cache.checkpoint_path().join(component).join("epoch_5");
        std::fs::create_dir_all(checkpoint.parent().unwrap()).unwrap();
        std::fs::write(checkpoint, "checkpoint state").unwrap();
    }

    pub fn cache_for_host(&self, host: &str) -> ModelCache {
        ModelCache::new(identity(), &self.config_for_host(host))
    }
}

pub fn identity() -> ModelIdentity {
    ModelIdentity::new("guest", "9999", "model-a", MODEL_VERSION).unwrap()
}

pub fn component_row(component: &str, alias: &str) -> ComponentMetaRow {
    ComponentMetaRow::new(
        &identity(),
        component,
        "HeteroLR",
        alias,
        ProtoIndex::from([("param.pb".to_string(), "LRParam".to_string())]),
        serde_json::json!({"max_iter": 100}),
    )
}
