//! Backend registry: storage backend name -> factory.
//!
//! Built at startup and injected into whatever opens remote stores, instead
//! of living in global state. Selecting a name with no registered factory is
//! a configuration error raised before any transfer.

use crate::backends::{filesystem::FilesystemBackend, s3::S3Backend};
use crate::error::{StorageError, StorageResult};
use crate::traits::ObjectStore;
use futures::future::BoxFuture;
use modelvault_core::StoreAddress;
use std::collections::HashMap;
use std::sync::Arc;

/// Factory constructing a backend from a store address.
///
/// The factory receives its own clone of the address, so a factory that
/// consumes or rewrites fields cannot affect other callers.
pub type BackendFactory =
    Arc<dyn Fn(StoreAddress) -> BoxFuture<'static, StorageResult<Arc<dyn ObjectStore>>> + Send + Sync>;

/// Registry of storage backend factories keyed by backend name.
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in backends ("filesystem", "s3") registered.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register("filesystem", |address| {
            Box::pin(async move {
                match address {
                    StoreAddress::Filesystem { path } => {
                        let backend = FilesystemBackend::new(path).await?;
                        Ok(Arc::new(backend) as Arc<dyn ObjectStore>)
                    }
                    other => Err(StorageError::Config(format!(
                        "filesystem factory got a {} address",
                        other.backend_name()
                    ))),
                }
            })
        });

        registry.register("s3", |address| {
            Box::pin(async move {
                match address {
                    StoreAddress::S3 {
                        bucket,
                        endpoint,
                        region,
                        prefix,
                        access_key_id,
                        secret_access_key,
                        force_path_style,
                    } => {
                        let backend = S3Backend::new(
                            &bucket,
                            endpoint,
                            region,
                            prefix,
                            access_key_id,
                            secret_access_key,
                            force_path_style,
                        )
                        .await?;
                        Ok(Arc::new(backend) as Arc<dyn ObjectStore>)
                    }
                    other => Err(StorageError::Config(format!(
                        "s3 factory got a {} address",
                        other.backend_name()
                    ))),
                }
            })
        });

        registry
    }

    /// Register a factory under a backend name, replacing any existing one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(StoreAddress) -> BoxFuture<'static, StorageResult<Arc<dyn ObjectStore>>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Registered backend names.
    pub fn backend_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Open a store for the address.
    ///
    /// Validates the address, then hands a clone of it to the registered
    /// factory. Fails with `UnsupportedBackend` when no factory is
    /// registered for the address's backend name.
    pub async fn open(&self, address: &StoreAddress) -> StorageResult<Arc<dyn ObjectStore>> {
        address
            .validate()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let factory = self
            .factories
            .get(address.backend_name())
            .ok_or_else(|| StorageError::UnsupportedBackend(address.backend_name().to_string()))?;

        factory(address.clone()).await
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_filesystem() {
        let temp = tempdir().unwrap();
        let registry = BackendRegistry::builtin();
        let address = StoreAddress::Filesystem {
            path: temp.path().join("store"),
        };

        let store = registry.open(&address).await.unwrap();
        store.put("hello.txt", Bytes::from_static(b"hi")).await.unwrap();
        assert!(store.exists("hello.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_unregistered_backend_is_unsupported() {
        let registry = BackendRegistry::new();
        let address = StoreAddress::Filesystem {
            path: "/tmp/store".into(),
        };

        match registry.open(&address).await {
            Err(StorageError::UnsupportedBackend(name)) => assert_eq!(name, "filesystem"),
            Err(other) => panic!("expected UnsupportedBackend, got {other:?}"),
            Ok(_) => panic!("expected UnsupportedBackend, got a store"),
        }
    }

    #[tokio::test]
    async fn test_invalid_address_rejected_before_factory() {
        let registry = BackendRegistry::builtin();
        let address = StoreAddress::Filesystem { path: "".into() };

        match registry.open(&address).await {
            Err(StorageError::Config(_)) => {}
            Err(other) => panic!("expected Config error, got {other:?}"),
            Ok(_) => panic!("expected Config error, got a store"),
        }
    }
}
