//! Model artifact synchronization.
//!
//! Keeps three representations of a model version consistent:
//! the local file cache, the remote object store, and the metadata store.
//! The metadata store is authoritative; archives are only trusted when they
//! match a hash recorded there.
//!
//! [`SyncModel`] moves whole model versions; [`SyncComponent`] moves a
//! single component's archive. Both run their critical sections under
//! cluster-wide locks from the metadata store.

pub mod archive;
pub mod cache;
pub mod catalog;
pub mod component;
pub mod error;
pub mod model;
pub mod remote;

pub use cache::ModelCache;
pub use catalog::ComponentCatalog;
pub use component::SyncComponent;
pub use error::{SyncError, SyncResult};
pub use model::SyncModel;
pub use remote::RemoteModelStore;
