//! Pluggable storage for field columns.
//!
//! A column is a flat buffer of atomic cells, `components` cells per element,
//! indexed by physical slot. The [`Storage`] trait keeps the cell container
//! abstract; [`VecStorage`] is the default. [`ColumnData`] erases the scalar
//! type so element sets can keep heterogeneous fields in one map.

use core::fmt::{self, Debug};
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, AtomicU64};

use crate::data::scalar::{AtomicCell, AtomicF32, AtomicF64, ScalarType};
use crate::mesh_error::MeshError;

/// Contiguous, indexable storage of atomic cells.
pub trait Storage<C: AtomicCell>: Debug + Send + Sync {
    /// Construct a buffer holding `values`.
    fn from_values<I: IntoIterator<Item = C::Value>>(values: I) -> Self
    where
        Self: Sized;

    /// Current length in cells.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entire buffer.
    fn cells(&self) -> &[C];

    /// Store `src` into the range `[offset .. offset + src.len())`.
    fn write_at(&self, offset: usize, src: &[C::Value]) -> Result<(), MeshError> {
        let cells = checked_range(self.cells(), offset, src.len())?;
        for (cell, &v) in cells.iter().zip(src) {
            cell.store(v);
        }
        Ok(())
    }

    /// Load the range `[offset .. offset + dst.len())` into `dst`.
    fn read_into(&self, offset: usize, dst: &mut [C::Value]) -> Result<(), MeshError> {
        let cells = checked_range(self.cells(), offset, dst.len())?;
        for (d, cell) in dst.iter_mut().zip(cells) {
            *d = cell.load();
        }
        Ok(())
    }

    /// Store `v` into every cell.
    fn fill(&self, v: C::Value) {
        for cell in self.cells() {
            cell.store(v);
        }
    }

    /// Copy of every value, in cell order.
    fn snapshot(&self) -> Vec<C::Value> {
        self.cells().iter().map(AtomicCell::load).collect()
    }
}

fn checked_range<C>(cells: &[C], offset: usize, len: usize) -> Result<&[C], MeshError> {
    let total = cells.len();
    offset
        .checked_add(len)
        .and_then(|end| cells.get(offset..end))
        .ok_or(MeshError::IndexOutOfRange {
            what: "column range end".into(),
            index: offset.saturating_add(len),
            len: total,
        })
}

/// `Vec`-backed storage (default).
pub struct VecStorage<C>(pub(crate) Vec<C>);

impl<C> Debug for VecStorage<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VecStorage")
            .field("len", &self.0.len())
            .finish()
    }
}

impl<C: AtomicCell> Storage<C> for VecStorage<C> {
    fn from_values<I: IntoIterator<Item = C::Value>>(values: I) -> Self {
        Self(values.into_iter().map(C::new).collect())
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn cells(&self) -> &[C] {
        &self.0
    }
}

impl<C: AtomicCell> Clone for VecStorage<C> {
    /// Snapshot copy; concurrent writers are not observed atomically as a whole.
    fn clone(&self) -> Self {
        Self::from_values(self.snapshot())
    }
}

/// Type-erased column storage.
#[derive(Clone, Debug)]
pub enum ColumnData {
    I32(VecStorage<AtomicI32>),
    I64(VecStorage<AtomicI64>),
    U32(VecStorage<AtomicU32>),
    U64(VecStorage<AtomicU64>),
    F32(VecStorage<AtomicF32>),
    F64(VecStorage<AtomicF64>),
}

/// Run `$body` with `$s` bound to the typed storage of any column variant.
macro_rules! with_column {
    ($data:expr, $s:ident => $body:expr) => {
        match $data {
            ColumnData::I32($s) => $body,
            ColumnData::I64($s) => $body,
            ColumnData::U32($s) => $body,
            ColumnData::U64($s) => $body,
            ColumnData::F32($s) => $body,
            ColumnData::F64($s) => $body,
        }
    };
}

impl ColumnData {
    /// Zero-filled column of `len` cells.
    pub fn zeroed(scalar: ScalarType, len: usize) -> Self {
        match scalar {
            ScalarType::I32 => ColumnData::I32(VecStorage::from_values(vec![0; len])),
            ScalarType::I64 => ColumnData::I64(VecStorage::from_values(vec![0; len])),
            ScalarType::U32 => ColumnData::U32(VecStorage::from_values(vec![0; len])),
            ScalarType::U64 => ColumnData::U64(VecStorage::from_values(vec![0; len])),
            ScalarType::F32 => ColumnData::F32(VecStorage::from_values(vec![0.0; len])),
            ScalarType::F64 => ColumnData::F64(VecStorage::from_values(vec![0.0; len])),
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ColumnData::I32(_) => ScalarType::I32,
            ColumnData::I64(_) => ScalarType::I64,
            ColumnData::U32(_) => ScalarType::U32,
            ColumnData::U64(_) => ScalarType::U64,
            ColumnData::F32(_) => ScalarType::F32,
            ColumnData::F64(_) => ScalarType::F64,
        }
    }

    /// Length in cells.
    pub fn len(&self) -> usize {
        with_column!(self, s => s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store every cell of `other` (same type and length) into `self`.
    pub fn store_from(&self, other: &ColumnData) -> Result<(), MeshError> {
        match (self, other) {
            (ColumnData::I32(a), ColumnData::I32(b)) => a.write_at(0, &b.snapshot()),
            (ColumnData::I64(a), ColumnData::I64(b)) => a.write_at(0, &b.snapshot()),
            (ColumnData::U32(a), ColumnData::U32(b)) => a.write_at(0, &b.snapshot()),
            (ColumnData::U64(a), ColumnData::U64(b)) => a.write_at(0, &b.snapshot()),
            (ColumnData::F32(a), ColumnData::F32(b)) => a.write_at(0, &b.snapshot()),
            (ColumnData::F64(a), ColumnData::F64(b)) => a.write_at(0, &b.snapshot()),
            (a, b) => Err(MeshError::FieldTypeMismatch {
                field: "column".into(),
                expected: a.scalar_type(),
                found: b.scalar_type(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read_ranges() {
        let s: VecStorage<AtomicI32> = VecStorage::from_values(vec![0; 4]);
        s.write_at(1, &[5, 6]).unwrap();
        let mut out = [0; 3];
        s.read_into(1, &mut out).unwrap();
        assert_eq!(out, [5, 6, 0]);
        assert!(s.write_at(3, &[1, 2]).is_err());
        assert!(s.read_into(usize::MAX, &mut out).is_err());
    }

    #[test]
    fn fill_and_snapshot() {
        let s: VecStorage<AtomicF64> = VecStorage::from_values(vec![1.0, 2.0]);
        s.fill(0.25);
        assert_eq!(s.snapshot(), vec![0.25, 0.25]);
        let c = s.clone();
        s.fill(1.0);
        assert_eq!(c.snapshot(), vec![0.25, 0.25]);
    }

    #[test]
    fn column_copy_checks_types() {
        let a = ColumnData::zeroed(ScalarType::U32, 2);
        let b = ColumnData::U32(VecStorage::from_values(vec![3, 4]));
        a.store_from(&b).unwrap();
        match &a {
            ColumnData::U32(s) => assert_eq!(s.snapshot(), vec![3, 4]),
            other => panic!("unexpected column {other:?}"),
        }
        let f = ColumnData::zeroed(ScalarType::F32, 2);
        assert!(matches!(
            f.store_from(&b),
            Err(MeshError::FieldTypeMismatch { .. })
        ));
        assert_eq!(f.len(), 2);
    }
}
