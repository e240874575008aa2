//! Model record repository.

use crate::error::MetadataResult;
use crate::models::ModelRow;
use async_trait::async_trait;
use modelvault_core::ModelIdentity;

/// Repository for model records.
///
/// Every call leases a connection from the pool for the duration of that
/// call only; no lease spans a lock acquisition or a byte transfer.
#[async_trait]
pub trait ModelRepo: Send + Sync {
    /// Get the record for an identity, if any.
    async fn get_model(&self, identity: &ModelIdentity) -> MetadataResult<Option<ModelRow>>;

    /// Create a record.
    ///
    /// Fails with `AlreadyExists` if a record for the identity is present.
    async fn create_model(&self, row: &ModelRow) -> MetadataResult<()>;

    /// Record a successful archive store: set the hash and origin host.
    ///
    /// Returns the updated row; fails with `NotFound` if the record is
    /// absent.
    async fn update_model_archive(
        &self,
        identity: &ModelIdentity,
        archive_sha256: &str,
        archive_from_host: &str,
    ) -> MetadataResult<ModelRow>;
}
