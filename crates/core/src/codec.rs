//! Structured document codec.
//!
//! The file-based metadata snapshots are plain serde documents; the concrete
//! text format is an implementation detail behind this seam. YAML is used
//! for the define-meta snapshot, JSON for run-parameter files.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Text format for structured documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// File extension for this format (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }

    /// Encode a value to text.
    pub fn encode<T: Serialize>(&self, value: &T) -> crate::Result<String> {
        match self {
            Self::Yaml => serde_yaml::to_string(value).map_err(|e| crate::Error::Codec(e.to_string())),
            Self::Json => {
                serde_json::to_string_pretty(value).map_err(|e| crate::Error::Codec(e.to_string()))
            }
        }
    }

    /// Decode a value from text.
    pub fn decode<T: DeserializeOwned>(&self, text: &str) -> crate::Result<T> {
        match self {
            Self::Yaml => serde_yaml::from_str(text).map_err(|e| crate::Error::Codec(e.to_string())),
            Self::Json => serde_json::from_str(text).map_err(|e| crate::Error::Codec(e.to_string())),
        }
    }
}
