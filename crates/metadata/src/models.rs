//! Database models mapping to the metadata schema.

use modelvault_core::{ModelIdentity, ProtoIndex};
use sqlx::FromRow;
use sqlx::types::Json;
use time::OffsetDateTime;

/// One row per model version: who last produced the authoritative archive,
/// and the hash of its bytes.
///
/// Invariant: `archive_sha256` always equals the SHA-256 of the bytes last
/// successfully stored under this identity.
#[derive(Debug, Clone, FromRow)]
pub struct ModelRow {
    pub role: String,
    pub party_id: String,
    pub model_id: String,
    pub model_version: String,
    /// Hex SHA-256 of the last successfully stored archive.
    pub archive_sha256: Option<String>,
    /// Host that produced the authoritative copy.
    pub archive_from_host: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ModelRow {
    /// Create a fresh row for an identity, with no archive recorded yet.
    pub fn new(identity: &ModelIdentity) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            role: identity.role().to_string(),
            party_id: identity.party_id().to_string(),
            model_id: identity.model_id().to_string(),
            model_version: identity.model_version().to_string(),
            archive_sha256: None,
            archive_from_host: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn identity(&self) -> modelvault_core::Result<ModelIdentity> {
        ModelIdentity::new(
            &self.role,
            &self.party_id,
            &self.model_id,
            &self.model_version,
        )
    }
}

/// One row per (identity, component, alias): the component's define-meta
/// plus archive provenance.
///
/// Invariant: all rows sharing the same (identity, component_name) carry an
/// identical (archive_sha256, archive_from_host) pair. A read that finds
/// more than one distinct pair indicates corrupted metadata.
#[derive(Debug, Clone, FromRow)]
pub struct ComponentMetaRow {
    /// Surrogate key; ignored on insert.
    pub id: i64,
    pub model_id: String,
    pub model_version: String,
    pub role: String,
    pub party_id: String,
    pub component_name: String,
    pub component_module_name: String,
    pub model_alias: String,
    /// Artifact file name -> serialized-structure descriptor.
    pub model_proto_index: Json<ProtoIndex>,
    /// Opaque run parameters for the component.
    pub run_parameters: Json<serde_json::Value>,
    pub archive_sha256: Option<String>,
    pub archive_from_host: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ComponentMetaRow {
    /// Create a fresh row for an identity, with no archive recorded yet.
    pub fn new(
        identity: &ModelIdentity,
        component_name: impl Into<String>,
        component_module_name: impl Into<String>,
        model_alias: impl Into<String>,
        model_proto_index: ProtoIndex,
        run_parameters: serde_json::Value,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: 0,
            model_id: identity.model_id().to_string(),
            model_version: identity.model_version().to_string(),
            role: identity.role().to_string(),
            party_id: identity.party_id().to_string(),
            component_name: component_name.into(),
            component_module_name: component_module_name.into(),
            model_alias: model_alias.into(),
            model_proto_index: Json(model_proto_index),
            run_parameters: Json(run_parameters),
            archive_sha256: None,
            archive_from_host: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn identity(&self) -> modelvault_core::Result<ModelIdentity> {
        ModelIdentity::new(
            &self.role,
            &self.party_id,
            &self.model_id,
            &self.model_version,
        )
    }

    /// Copy of this row with identity fields overwritten by `patch` and the
    /// surrogate key cleared. All other fields, archive provenance included,
    /// are carried over. Used when forking metadata for a new version or
    /// party without recomputing artifacts.
    pub fn replicated(&self, patch: &IdentityPatch) -> Self {
        let now = OffsetDateTime::now_utc();
        let mut row = self.clone();
        row.id = 0;
        if let Some(role) = &patch.role {
            row.role = role.clone();
        }
        if let Some(party_id) = &patch.party_id {
            row.party_id = party_id.clone();
        }
        if let Some(model_id) = &patch.model_id {
            row.model_id = model_id.clone();
        }
        if let Some(model_version) = &patch.model_version {
            row.model_version = model_version.clone();
        }
        row.created_at = now;
        row.updated_at = now;
        row
    }
}

/// Identity-field overrides applied when replicating component metadata.
#[derive(Debug, Clone, Default)]
pub struct IdentityPatch {
    pub role: Option<String>,
    pub party_id: Option<String>,
    pub model_id: Option<String>,
    pub model_version: Option<String>,
}

impl IdentityPatch {
    pub fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.party_id.is_none()
            && self.model_id.is_none()
            && self.model_version.is_none()
    }
}

/// Filter for component metadata queries.
///
/// Always carries the full identity tuple; queries never scan across
/// identities. Component name and alias are optional narrowings.
#[derive(Debug, Clone)]
pub struct ComponentFilter {
    identity: ModelIdentity,
    component_name: Option<String>,
    model_alias: Option<String>,
}

impl ComponentFilter {
    pub fn new(identity: ModelIdentity) -> Self {
        Self {
            identity,
            component_name: None,
            model_alias: None,
        }
    }

    pub fn with_component(mut self, component_name: impl Into<String>) -> Self {
        self.component_name = Some(component_name.into());
        self
    }

    pub fn with_alias(mut self, model_alias: impl Into<String>) -> Self {
        self.model_alias = Some(model_alias.into());
        self
    }

    pub fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    pub fn component_name(&self) -> Option<&str> {
        self.component_name.as_deref()
    }

    pub fn model_alias(&self) -> Option<&str> {
        self.model_alias.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ModelIdentity {
        ModelIdentity::new("guest", "9999", "model-a", "v1").unwrap()
    }

    #[test]
    fn test_replicated_patches_identity_only() {
        let row = ComponentMetaRow::new(
            &identity(),
            "trainer",
            "HeteroLR",
            "lr",
            ProtoIndex::from([("param.pb".to_string(), "LRParam".to_string())]),
            serde_json::json!({"max_iter": 100}),
        );

        let patch = IdentityPatch {
            party_id: Some("10000".to_string()),
            ..Default::default()
        };
        let copy = row.replicated(&patch);

        assert_eq!(copy.party_id, "10000");
        assert_eq!(copy.role, row.role);
        assert_eq!(copy.component_name, row.component_name);
        assert_eq!(copy.model_proto_index.0, row.model_proto_index.0);
        assert_eq!(copy.id, 0);
    }
}
