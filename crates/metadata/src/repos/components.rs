//! Component metadata repository.

use crate::error::MetadataResult;
use crate::models::{ComponentFilter, ComponentMetaRow};
use async_trait::async_trait;

/// Repository for per-component metadata rows.
#[async_trait]
pub trait ComponentRepo: Send + Sync {
    /// Rows matching the filter, ordered by (component_name, model_alias).
    async fn find_components(
        &self,
        filter: &ComponentFilter,
    ) -> MetadataResult<Vec<ComponentMetaRow>>;

    /// Number of rows matching the filter.
    async fn count_components(&self, filter: &ComponentFilter) -> MetadataResult<u64>;

    /// Insert rows. The surrogate `id` field of each row is ignored.
    async fn insert_components(&self, rows: &[ComponentMetaRow]) -> MetadataResult<()>;

    /// Bulk-update the archive hash and origin host of all matching rows.
    ///
    /// Returns the number of rows updated.
    async fn update_component_archive(
        &self,
        filter: &ComponentFilter,
        archive_sha256: &str,
        archive_from_host: &str,
    ) -> MetadataResult<u64>;
}
