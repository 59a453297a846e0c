#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-relations
//!
//! mesh-relations compiles traversals over the topological relations of an
//! unstructured mesh (vertices, edges, faces, cells and the adjacency between
//! them) and controls where their data lives in memory. Physical storage may
//! be reordered for locality without changing the stable logical identity of
//! any element.
//!
//! ## Features
//! - Shared, validated mesh metadata: element counts, CSR adjacency, patch ids
//! - Per-instance identity/slot permutations, optionally grouped by patch
//! - Relation tables remapped into slot space with selectable localization
//! - Typed field storage with identity-ordered bulk import/export
//! - Data-parallel kernels (rayon) with relation hops, atomic accumulation and
//!   a semantically transparent local cache
//!
//! ## Identity and slot
//!
//! Every element has a logical identity (`0..count`, stable, shared by all
//! instances built from the same metadata) and a physical slot (`0..count`,
//! indexes field storage). Everything observable from outside an instance is
//! expressed in identities.
//!
//! ## Usage
//!
//! ```
//! use mesh_relations::prelude::*;
//!
//! # fn main() -> Result<(), MeshError> {
//! let meta = MeshMetadata::builder()
//!     .count(ElementKind::Vertex, 3)
//!     .count(ElementKind::Face, 1)
//!     .relation_lists(ElementKind::Face, ElementKind::Vertex, &[vec![0u32, 1, 2]])
//!     .build()?;
//!
//! let mut builder = MeshBuilder::new(MeshTopology::Tri);
//! builder
//!     .place(ElementKind::Vertex, &[("deg", FieldType::of::<i32>())], true)?
//!     .link(ElementKind::Face, ElementKind::Vertex)?;
//! let mesh = builder.build(meta)?;
//!
//! let mut k = KernelBuilder::new("degree", &mesh, ElementKind::Face)?;
//! let fv = k.relation(ElementKind::Face, ElementKind::Vertex)?;
//! let deg = k.field::<i32>(ElementKind::Vertex, "deg", Access::Accumulate)?;
//! k.local_cache(deg);
//! let kernel = k.compile(mesh.config())?;
//! kernel.run(|ctx, face| {
//!     for v in ctx.neighbors(fv, face).iter() {
//!         ctx.accumulate(deg, v, 1);
//!     }
//! })?;
//!
//! let out: Vec<i32> = mesh.elements(ElementKind::Vertex)?.export("deg")?;
//! assert_eq!(out, vec![1, 1, 1]);
//! # Ok(())
//! # }
//! ```

pub mod algs;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod kernel;
pub mod mesh;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use mesh_error::MeshError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::patch::{PatchIndexer, PatchInfo};
    pub use crate::algs::renumber::{OrderingAssigner, Permutation};
    pub use crate::config::MeshConfig;
    pub use crate::data::element_set::ElementSet;
    pub use crate::data::external::ExternalField;
    pub use crate::data::field::{FieldDecl, FieldType};
    pub use crate::data::scalar::{Scalar, ScalarType};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::kernel::access::{
        CompiledTraversal, Element, RelationAccessCompiler, RelationHandle, compile_traversal,
    };
    pub use crate::kernel::cache::{Access, CacheMode, LocalCacheOptimizer};
    pub use crate::kernel::region::{At, FieldHandle, Kernel, KernelBuilder, KernelCtx};
    pub use crate::mesh::builder::MeshBuilder;
    pub use crate::mesh::instance::MeshInstance;
    pub use crate::mesh_error::MeshError;
    pub use crate::topology::csr::CsrAdjacency;
    pub use crate::topology::element::{ElementId, ElementKind, MeshTopology, RelationKey, Slot};
    pub use crate::topology::metadata::{MeshMetadata, RawMeshMetadata, RawRelation};
    pub use crate::topology::relation::{LocalizeMode, Neighbors, RelationTable};
}
