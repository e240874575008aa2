//! Core domain types and shared logic for modelvault.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Model identities and party-scoped model ids
//! - Content hashes for archive integrity
//! - The define-meta document and its row/document rearrangement
//! - Structured document codecs (YAML/JSON snapshots)
//! - Configuration for storage backends, metadata store and sync

pub mod codec;
pub mod config;
pub mod define_meta;
pub mod error;
pub mod hash;
pub mod identity;

pub use codec::DocumentFormat;
pub use config::{MetadataConfig, StoreAddress, SyncConfig};
pub use define_meta::{ComponentDefine, DefineMeta, ProtoIndex};
pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher};
pub use identity::{ModelIdentity, PARTY_MODEL_ID_DELIMITER};
