//! Model identity types.
//!
//! A trained artifact is uniquely named by `(role, party_id, model_id,
//! model_version)`. The first three fields combine into a single
//! *party-scoped model id* string (`role#party_id#model_id`); the version is
//! always carried separately.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Delimiter joining role, party id and model id.
pub const PARTY_MODEL_ID_DELIMITER: char = '#';

/// Identity of one version of a trained model.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelIdentity {
    role: String,
    party_id: String,
    model_id: String,
    model_version: String,
}

impl ModelIdentity {
    /// Create an identity from its four fields.
    pub fn new(
        role: impl Into<String>,
        party_id: impl Into<String>,
        model_id: impl Into<String>,
        model_version: impl Into<String>,
    ) -> crate::Result<Self> {
        let identity = Self {
            role: role.into(),
            party_id: party_id.into(),
            model_id: model_id.into(),
            model_version: model_version.into(),
        };
        identity.validate()?;
        Ok(identity)
    }

    /// Parse a party-scoped model id (`role#party_id#model_id`) plus version.
    ///
    /// The model id may itself contain the delimiter, so the string is split
    /// at most twice from the left.
    pub fn parse(party_model_id: &str, model_version: impl Into<String>) -> crate::Result<Self> {
        let mut parts = party_model_id.splitn(3, PARTY_MODEL_ID_DELIMITER);
        let (role, party_id, model_id) = match (parts.next(), parts.next(), parts.next()) {
            (Some(role), Some(party_id), Some(model_id)) => (role, party_id, model_id),
            _ => {
                return Err(crate::Error::InvalidIdentity(format!(
                    "expected role{d}party_id{d}model_id, got: {party_model_id}",
                    d = PARTY_MODEL_ID_DELIMITER
                )));
            }
        };
        Self::new(role, party_id, model_id, model_version)
    }

    fn validate(&self) -> crate::Result<()> {
        for (name, value) in [
            ("role", &self.role),
            ("party_id", &self.party_id),
            ("model_id", &self.model_id),
            ("model_version", &self.model_version),
        ] {
            if value.is_empty() {
                return Err(crate::Error::InvalidIdentity(format!("{name} is empty")));
            }
        }
        // Role and party id must not contain the delimiter, or the
        // party-scoped id would not parse back to the same identity.
        for (name, value) in [("role", &self.role), ("party_id", &self.party_id)] {
            if value.contains(PARTY_MODEL_ID_DELIMITER) {
                return Err(crate::Error::InvalidIdentity(format!(
                    "{name} contains '{PARTY_MODEL_ID_DELIMITER}': {value}"
                )));
            }
        }
        // Identity fields become path components of the local cache and
        // object keys of the remote store.
        for (name, value) in [
            ("role", &self.role),
            ("party_id", &self.party_id),
            ("model_id", &self.model_id),
            ("model_version", &self.model_version),
        ] {
            if value.contains('/') || value.contains('\\') || value.contains("..") {
                return Err(crate::Error::InvalidIdentity(format!(
                    "{name} contains path separators: {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn party_id(&self) -> &str {
        &self.party_id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// The party-scoped model id: `role#party_id#model_id`.
    pub fn party_model_id(&self) -> String {
        format!(
            "{role}{d}{party_id}{d}{model_id}",
            role = self.role,
            party_id = self.party_id,
            model_id = self.model_id,
            d = PARTY_MODEL_ID_DELIMITER
        )
    }

    /// A flat `party_model_id_version` key, used for lock keys and staging
    /// file names.
    pub fn flat_key(&self) -> String {
        format!("{}_{}", self.party_model_id(), self.model_version)
    }
}

impl fmt::Debug for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModelIdentity({} v{})",
            self.party_model_id(),
            self.model_version
        )
    }
}

impl fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.party_model_id(), self.model_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let identity = ModelIdentity::parse("guest#9999#arbiter-10000#model", "202401011200").unwrap();
        assert_eq!(identity.role(), "guest");
        assert_eq!(identity.party_id(), "9999");
        // model_id keeps its embedded delimiter
        assert_eq!(identity.model_id(), "arbiter-10000#model");
        assert_eq!(identity.party_model_id(), "guest#9999#arbiter-10000#model");
        assert_eq!(identity.model_version(), "202401011200");
    }

    #[test]
    fn test_parse_rejects_short_id() {
        assert!(ModelIdentity::parse("guest#9999", "v1").is_err());
        assert!(ModelIdentity::parse("", "v1").is_err());
    }

    #[test]
    fn test_rejects_path_separators() {
        assert!(ModelIdentity::new("guest", "9999", "../evil", "v1").is_err());
        assert!(ModelIdentity::new("guest", "99/99", "model", "v1").is_err());
    }
}
