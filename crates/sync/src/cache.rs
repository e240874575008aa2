//! Local model cache layout.
//!
//! Everything for one model version lives under
//! `<cache_root>/<party_model_id>/<model_version>/`:
//!
//! ```text
//! define/define_meta.yaml
//! variables/data/<component>/<alias>/<file>
//! run_parameters/<component>/run_parameters.json
//! checkpoint/<component>/...
//! ```

use crate::error::{SyncError, SyncResult};
use modelvault_core::{DefineMeta, DocumentFormat, ModelIdentity, SyncConfig};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Paths of one model version's local cache.
#[derive(Clone, Debug)]
pub struct ModelCache {
    identity: ModelIdentity,
    model_path: PathBuf,
    temp_dir: PathBuf,
}

impl ModelCache {
    pub fn new(identity: ModelIdentity, config: &SyncConfig) -> Self {
        let model_path = config
            .cache_root
            .join(identity.party_model_id())
            .join(identity.model_version());
        Self {
            identity,
            model_path,
            temp_dir: config.temp_dir.clone(),
        }
    }

    pub fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    /// Root of this model version's cache.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn define_meta_path(&self) -> PathBuf {
        self.model_path
            .join("define")
            .join(format!("define_meta.{}", DocumentFormat::Yaml.extension()))
    }

    pub fn variables_data_path(&self) -> PathBuf {
        self.model_path.join("variables").join("data")
    }

    /// Directory holding one component/alias pair's artifact files.
    pub fn component_variables_path(&self, component_name: &str, model_alias: &str) -> PathBuf {
        self.variables_data_path().join(component_name).join(model_alias)
    }

    pub fn run_parameters_path(&self) -> PathBuf {
        self.model_path.join("run_parameters")
    }

    pub fn component_run_parameters_path(&self, component_name: &str) -> PathBuf {
        self.run_parameters_path()
            .join(component_name)
            .join(format!("run_parameters.{}", DocumentFormat::Json.extension()))
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.model_path.join("checkpoint")
    }

    /// Staging path for a packed component archive.
    pub fn component_archive_path(&self, component_name: &str) -> PathBuf {
        self.temp_dir
            .join(format!("{}_{component_name}.zip", self.identity.flat_key()))
    }

    /// Staging path for the whole-model archive.
    pub fn model_archive_path(&self) -> PathBuf {
        self.temp_dir.join(format!("{}.zip", self.identity.flat_key()))
    }

    /// Read the define-meta snapshot.
    pub async fn read_define_meta(&self) -> SyncResult<DefineMeta> {
        let path = self.define_meta_path();
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SyncError::NotFound(format!("define_meta snapshot at {}", path.display()))
            } else {
                SyncError::Io(e)
            }
        })?;
        Ok(DocumentFormat::Yaml.decode(&text)?)
    }

    /// Write the define-meta snapshot.
    ///
    /// Exclusive-create: refuses to overwrite an existing snapshot so a
    /// migration can never silently merge two sources.
    pub async fn write_define_meta(&self, meta: &DefineMeta) -> SyncResult<()> {
        let text = DocumentFormat::Yaml.encode(meta)?;
        self.write_new(&self.define_meta_path(), text.as_bytes()).await
    }

    /// Read per-component run-parameter files. Missing directory is an
    /// empty map, not an error.
    pub async fn read_run_parameters(&self) -> SyncResult<BTreeMap<String, serde_json::Value>> {
        let root = self.run_parameters_path();
        let mut entries = match tokio::fs::read_dir(&root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(SyncError::Io(e)),
        };

        let mut parameters = BTreeMap::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let component_name = entry.file_name().to_string_lossy().into_owned();
            let path = self.component_run_parameters_path(&component_name);
            let text = tokio::fs::read_to_string(&path).await?;
            parameters.insert(component_name, DocumentFormat::Json.decode(&text)?);
        }
        Ok(parameters)
    }

    /// Write one component's run parameters, exclusive-create.
    pub async fn write_run_parameters(
        &self,
        component_name: &str,
        parameters: &serde_json::Value,
    ) -> SyncResult<()> {
        let text = DocumentFormat::Json.encode(parameters)?;
        self.write_new(&self.component_run_parameters_path(component_name), text.as_bytes())
            .await
    }

    async fn write_new(&self, path: &Path, data: &[u8]) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    SyncError::AlreadyExists(path.display().to_string())
                } else {
                    SyncError::Io(e)
                }
            })?;
        file.write_all(data).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelvault_core::ProtoIndex;
    use tempfile::tempdir;

    fn cache(root: &Path) -> ModelCache {
        let identity = ModelIdentity::new("guest", "9999", "model-a", "v1").unwrap();
        ModelCache::new(identity, &SyncConfig::new(root).with_temp_dir(root.join("tmp")))
    }

    #[test]
    fn test_layout() {
        let cache = cache(Path::new("/cache"));
        assert_eq!(
            cache.model_path(),
            Path::new("/cache/guest#9999#model-a/v1")
        );
        assert_eq!(
            cache.define_meta_path(),
            Path::new("/cache/guest#9999#model-a/v1/define/define_meta.yaml")
        );
        assert_eq!(
            cache.component_variables_path("trainer", "lr"),
            Path::new("/cache/guest#9999#model-a/v1/variables/data/trainer/lr")
        );
        assert_eq!(
            cache.component_run_parameters_path("trainer"),
            Path::new("/cache/guest#9999#model-a/v1/run_parameters/trainer/run_parameters.json")
        );
    }

    #[tokio::test]
    async fn test_define_meta_snapshot_is_exclusive() {
        let temp = tempdir().unwrap();
        let cache = cache(temp.path());

        let meta = DefineMeta::from_rows([(
            "trainer".to_string(),
            "HeteroLR".to_string(),
            "lr".to_string(),
            ProtoIndex::from([("param.pb".to_string(), "LRParam".to_string())]),
        )]);

        cache.write_define_meta(&meta).await.unwrap();
        assert_eq!(cache.read_define_meta().await.unwrap(), meta);

        match cache.write_define_meta(&meta).await {
            Err(SyncError::AlreadyExists(_)) => {}
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_parameters_roundtrip() {
        let temp = tempdir().unwrap();
        let cache = cache(temp.path());

        assert!(cache.read_run_parameters().await.unwrap().is_empty());

        cache
            .write_run_parameters("trainer", &serde_json::json!({"max_iter": 100}))
            .await
            .unwrap();
        let parameters = cache.read_run_parameters().await.unwrap();
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters["trainer"]["max_iter"], 100);
    }
}
