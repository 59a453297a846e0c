//! MeshError: Unified error type for mesh-relations public APIs
//!
//! Structural problems (bad metadata, undeclared relations, unknown fields,
//! illegal cache requests, mutation after build) are reported here at load,
//! build or compile time, before any parallel region runs.

use thiserror::Error;

use crate::data::scalar::ScalarType;
use crate::topology::element::ElementKind;

/// Unified error type for mesh-relations operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// Mesh metadata is internally inconsistent (bad offsets, out-of-range ids, ...).
    #[error("Schema error: {0}")]
    Schema(String),
    /// Build-time declaration refers to something the topology or metadata lacks.
    #[error("Configuration error: {0}")]
    Config(String),
    /// A traversal uses a relation that was not linked when the instance was built.
    #[error("Relation {from}->{to} was not linked at build time")]
    UnlinkedRelation { from: ElementKind, to: ElementKind },
    /// Access to a field that was never declared.
    #[error("Unknown field `{field}` on {owner}")]
    UnknownField { owner: String, field: String },
    /// A local-cache declaration that cannot be honoured without changing results.
    #[error("Field `{field}` cannot be locally cached: {reason}")]
    UnsupportedCache { field: String, reason: &'static str },
    /// Structural mutation after the builder has produced an instance.
    #[error("Mesh builder is frozen: cannot {0} after build")]
    FrozenInstance(&'static str),
    /// Typed access with a scalar type different from the declared one.
    #[error("Field `{field}` holds {expected} values, accessed as {found}")]
    FieldTypeMismatch {
        field: String,
        expected: ScalarType,
        found: ScalarType,
    },
    /// A bulk buffer or component slice has the wrong number of values.
    #[error("Field `{field}` expects {expected} values, got {found}")]
    BufferLength {
        field: String,
        expected: usize,
        found: usize,
    },
    /// Slot, identity or component index outside the element set.
    #[error("Index {index} out of range for {what} (len {len})")]
    IndexOutOfRange {
        what: String,
        index: usize,
        len: usize,
    },
    /// A permutation is not a bijection over `0..count`.
    #[error("Invalid permutation: {0}")]
    InvalidPermutation(String),
    /// Patch slot ranges requested without patch-contiguous storage.
    #[error("Patch layout error: {0}")]
    PatchLayout(String),
}
