//! Repository traits for metadata operations.

pub mod components;
pub mod models;

pub use components::ComponentRepo;
pub use models::ModelRepo;
