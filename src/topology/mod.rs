//! Top-level module for mesh topology abstractions.
//!
//! This module provides the element vocabulary and the adjacency structures
//! relations are stored in:
//! - Element kinds, topologies, identities and slots
//! - Compressed sparse row adjacency
//! - Shared mesh metadata and its plain serde form
//! - Per-instance relation tables over physical slots

pub mod csr;
pub mod element;
pub mod metadata;
pub mod relation;

pub use csr::CsrAdjacency;
pub use element::{ElementId, ElementKind, MeshTopology, RelationKey, Slot};
pub use metadata::{MeshMetadata, MetadataBuilder, RawMeshMetadata, RawRelation};
pub use relation::{LocalizeMode, Neighbors, RelationTable};
