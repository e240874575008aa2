//! Remote blob storage for modelvault.
//!
//! This crate provides:
//! - The `ObjectStore` contract archives move through
//! - Backends: local filesystem and S3-compatible
//! - A backend registry mapping configured backend names to factories

pub mod backends;
pub mod error;
pub mod registry;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, s3::S3Backend};
pub use error::{StorageError, StorageResult};
pub use registry::{BackendFactory, BackendRegistry};
pub use traits::ObjectStore;

use modelvault_core::StoreAddress;
use std::sync::Arc;

/// Open an object store for an address using the built-in backends.
pub async fn from_address(address: &StoreAddress) -> StorageResult<Arc<dyn ObjectStore>> {
    BackendRegistry::builtin().open(address).await
}
