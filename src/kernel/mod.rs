//! Kernel compilation: relation access, local caching and parallel regions.

pub mod access;
pub mod cache;
pub mod region;

pub use access::{
    CompiledTraversal, Element, Elements, RelationAccessCompiler, RelationHandle,
    compile_traversal,
};
pub use cache::{Access, CacheMode, CachePlan, LocalCacheOptimizer};
pub use region::{At, FieldHandle, Kernel, KernelBuilder, KernelCtx};
