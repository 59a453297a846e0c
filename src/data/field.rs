//! Typed fields: a name, a value type and a fixed-size column.

use std::fmt;

use crate::data::scalar::{AtomicCell, Scalar, ScalarType};
use crate::data::storage::{ColumnData, Storage, VecStorage};
use crate::mesh_error::MeshError;

/// Value type of a field: a scalar or a fixed-size vector of scalars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldType {
    pub scalar: ScalarType,
    /// Values per element; `1` for scalars.
    pub components: usize,
}

impl FieldType {
    pub const fn scalar(scalar: ScalarType) -> Self {
        Self {
            scalar,
            components: 1,
        }
    }

    pub const fn vector(scalar: ScalarType, components: usize) -> Self {
        Self { scalar, components }
    }

    /// Scalar field of `T`.
    pub fn of<T: Scalar>() -> Self {
        Self::scalar(T::TYPE)
    }

    /// `N`-component vector field of `T`.
    pub fn vector_of<T: Scalar>(components: usize) -> Self {
        Self::vector(T::TYPE, components)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components == 1 {
            write!(f, "{}", self.scalar)
        } else {
            write!(f, "{}x{}", self.scalar, self.components)
        }
    }
}

/// Build-time field declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: FieldType,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Storage for one field: `len` elements of `ty.components` cells each,
/// addressed by a dense element index.
#[derive(Clone, Debug)]
pub struct Field {
    name: String,
    ty: FieldType,
    len: usize,
    data: ColumnData,
}

impl Field {
    /// Zero-initialised field of `len` elements.
    pub fn zeroed(decl: &FieldDecl, len: usize) -> Self {
        Self {
            name: decl.name.clone(),
            ty: decl.ty,
            len,
            data: ColumnData::zeroed(decl.ty.scalar, len * decl.ty.components),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> FieldType {
        self.ty
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn components(&self) -> usize {
        self.ty.components
    }

    pub(crate) fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Typed storage, or [`MeshError::FieldTypeMismatch`].
    pub fn typed<T: Scalar>(&self) -> Result<&VecStorage<T::Cell>, MeshError> {
        T::column(&self.data).ok_or_else(|| MeshError::FieldTypeMismatch {
            field: self.name.clone(),
            expected: self.ty.scalar,
            found: T::TYPE,
        })
    }

    fn check_index(&self, index: usize) -> Result<(), MeshError> {
        if index >= self.len {
            return Err(MeshError::IndexOutOfRange {
                what: format!("field `{}`", self.name),
                index,
                len: self.len,
            });
        }
        Ok(())
    }

    fn check_values(&self, found: usize) -> Result<(), MeshError> {
        if found != self.ty.components {
            return Err(MeshError::BufferLength {
                field: self.name.clone(),
                expected: self.ty.components,
                found,
            });
        }
        Ok(())
    }

    /// Component `comp` of element `index`.
    pub fn get<T: Scalar>(&self, index: usize, comp: usize) -> Result<T, MeshError> {
        let cells = self.typed::<T>()?;
        self.check_index(index)?;
        if comp >= self.ty.components {
            return Err(MeshError::IndexOutOfRange {
                what: format!("component of `{}`", self.name),
                index: comp,
                len: self.ty.components,
            });
        }
        Ok(cells.cells()[index * self.ty.components + comp].load())
    }

    /// All components of element `index`.
    pub fn values<T: Scalar>(&self, index: usize) -> Result<Vec<T>, MeshError> {
        let cells = self.typed::<T>()?;
        self.check_index(index)?;
        let mut out = vec![T::zero(); self.ty.components];
        cells.read_into(index * self.ty.components, &mut out)?;
        Ok(out)
    }

    /// Overwrite all components of element `index`.
    pub fn set<T: Scalar>(&self, index: usize, values: &[T]) -> Result<(), MeshError> {
        let cells = self.typed::<T>()?;
        self.check_index(index)?;
        self.check_values(values.len())?;
        cells.write_at(index * self.ty.components, values)
    }

    /// Set every component of every element to `value`.
    pub fn fill<T: Scalar>(&self, value: T) -> Result<(), MeshError> {
        self.typed::<T>()?.fill(value);
        Ok(())
    }

    /// Whole buffer in storage order.
    pub fn snapshot<T: Scalar>(&self) -> Result<Vec<T>, MeshError> {
        Ok(self.typed::<T>()?.snapshot())
    }

    /// Replace the whole buffer (storage order).
    pub fn load<T: Scalar>(&self, buf: &[T]) -> Result<(), MeshError> {
        let cells = self.typed::<T>()?;
        if buf.len() != cells.len() {
            return Err(MeshError::BufferLength {
                field: self.name.clone(),
                expected: cells.len(),
                found: buf.len(),
            });
        }
        cells.write_at(0, buf)
    }
}
