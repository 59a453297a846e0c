//! Standalone fields that belong to no mesh instance.
//!
//! An [`ExternalField`] is indexed by logical identity of some element kind.
//! Kernels bind it like any other field; it is eligible for local caching.

use crate::data::field::{Field, FieldDecl, FieldType};
use crate::data::scalar::Scalar;
use crate::mesh_error::MeshError;
use crate::topology::element::{ElementId, ElementKind};

/// Identity-indexed field of `len` elements of `kind`.
#[derive(Clone, Debug)]
pub struct ExternalField {
    kind: ElementKind,
    field: Field,
}

impl ExternalField {
    pub fn new(name: impl Into<String>, kind: ElementKind, ty: FieldType, len: usize) -> Self {
        Self {
            kind,
            field: Field::zeroed(&FieldDecl::new(name, ty), len),
        }
    }

    /// Scalar field of `T`.
    pub fn scalar<T: Scalar>(name: impl Into<String>, kind: ElementKind, len: usize) -> Self {
        Self::new(name, kind, FieldType::of::<T>(), len)
    }

    pub fn name(&self) -> &str {
        self.field.name()
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.field.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field.is_empty()
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn get<T: Scalar>(&self, id: ElementId) -> Result<T, MeshError> {
        self.field.get(id.index(), 0)
    }

    pub fn set<T: Scalar>(&self, id: ElementId, value: &[T]) -> Result<(), MeshError> {
        self.field.set(id.index(), value)
    }

    pub fn import<T: Scalar>(&self, buf: &[T]) -> Result<(), MeshError> {
        self.field.load(buf)
    }

    pub fn export<T: Scalar>(&self) -> Result<Vec<T>, MeshError> {
        self.field.snapshot()
    }

    pub fn fill<T: Scalar>(&self, value: T) -> Result<(), MeshError> {
        self.field.fill(value)
    }
}
