//! Mesh instances and their build phase.

pub mod builder;
pub mod instance;

pub use builder::MeshBuilder;
pub use instance::MeshInstance;
