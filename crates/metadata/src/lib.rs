//! Metadata store abstraction and implementation for modelvault.
//!
//! This crate provides the control-plane data model:
//! - Model records (archive hash and origin host per version)
//! - Per-component define-meta rows
//! - Cluster-wide sync locks
//!
//! The metadata store is the single source of truth: blob store and local
//! cache contents are only trusted when they match a hash recorded here.

pub mod error;
pub mod lock;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use lock::{LockGuard, LockProvider, component_lock_key, model_lock_key};
pub use models::{ComponentFilter, ComponentMetaRow, IdentityPatch, ModelRow};
pub use repos::{ComponentRepo, ModelRepo};
pub use store::{MetadataStore, SqliteStore};

use modelvault_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite { path, lock_poll_ms } => {
            let store = SqliteStore::new(path, Some(*lock_poll_ms)).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelvault_core::config::MetadataConfig;

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("metadata.db");
        let config = MetadataConfig::Sqlite {
            path: db_path.clone(),
            lock_poll_ms: 10,
        };

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
        assert!(db_path.exists());
    }
}
