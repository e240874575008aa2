//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Remote store address: which backend to use and how to reach it.
///
/// The `storage` tag selects a registered backend; an unrecognized name is a
/// configuration error raised when the store is opened, before any transfer
/// is attempted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "storage", rename_all = "lowercase")]
pub enum StoreAddress {
    /// Local filesystem storage (shared mount or test fixture).
    Filesystem {
        /// Root directory for stored archives.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Key prefix inside the bucket.
        prefix: Option<String>,
        /// Static access key id; falls back to the ambient chain if unset.
        access_key_id: Option<String>,
        /// Static secret access key.
        secret_access_key: Option<String>,
        /// Use path-style addressing (required by MinIO).
        #[serde(default)]
        force_path_style: bool,
    },
}

impl StoreAddress {
    /// The backend name this address selects.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Filesystem { .. } => "filesystem",
            Self::S3 { .. } => "s3",
        }
    }

    /// Validate address fields.
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Self::Filesystem { path } => {
                if path.as_os_str().is_empty() {
                    return Err(crate::Error::Config(
                        "filesystem storage requires a non-empty path".to_string(),
                    ));
                }
            }
            Self::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.is_empty() {
                    return Err(crate::Error::Config(
                        "s3 storage requires a bucket".to_string(),
                    ));
                }
                if access_key_id.is_some() != secret_access_key.is_some() {
                    return Err(crate::Error::Config(
                        "s3 credentials must provide both access_key_id and secret_access_key"
                            .to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database file.
    Sqlite {
        path: PathBuf,
        /// Lock acquisition poll interval in milliseconds.
        #[serde(default = "default_lock_poll_ms")]
        lock_poll_ms: u64,
    },
}

fn default_lock_poll_ms() -> u64 {
    100
}

/// Synchronization configuration: where the local cache lives and who we
/// are in origin-host terms.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Root of the local model cache.
    pub cache_root: PathBuf,
    /// Staging directory for packed archives.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    /// Host name recorded as archive origin. Defaults to the system
    /// hostname.
    #[serde(default = "default_local_host")]
    pub local_host: String,
}

impl SyncConfig {
    /// Create a config rooted at `cache_root` with defaults for the rest.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            temp_dir: default_temp_dir(),
            local_host: default_local_host(),
        }
    }

    pub fn with_local_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = host.into();
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("modelvault")
}

fn default_local_host() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_address_tag_roundtrip() {
        let text = r#"{"storage": "filesystem", "path": "/var/lib/modelvault"}"#;
        let address: StoreAddress = serde_json::from_str(text).unwrap();
        assert_eq!(address.backend_name(), "filesystem");
        address.validate().unwrap();
    }

    #[test]
    fn test_unknown_backend_tag_rejected() {
        let text = r#"{"storage": "tencent_cos", "bucket": "b"}"#;
        assert!(serde_json::from_str::<StoreAddress>(text).is_err());
    }

    #[test]
    fn test_s3_partial_credentials_rejected() {
        let address = StoreAddress::S3 {
            bucket: "models".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("key".to_string()),
            secret_access_key: None,
            force_path_style: false,
        };
        assert!(address.validate().is_err());
    }

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::new("/tmp/cache").with_local_host("host-a");
        assert_eq!(config.local_host, "host-a");
        assert!(config.temp_dir.ends_with("modelvault"));
    }
}
