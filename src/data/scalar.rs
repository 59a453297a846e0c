//! Scalar value types for fields and their atomic storage cells.
//!
//! Field storage is made of atomic cells so a built mesh instance can be
//! shared by reference across a data-parallel region: an element's own
//! fields are written with plain (relaxed) stores, fields reached through a
//! relation with atomic read-modify-write. Floats have no native atomic add;
//! [`AtomicF32`]/[`AtomicF64`] implement it with a compare-exchange loop on
//! the bit pattern.

use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, AtomicU64, Ordering};

use hashbrown::HashMap;
use num_traits::Zero;

use crate::data::storage::{ColumnData, VecStorage};
use crate::kernel::cache::DeltaMap;

/// Scalar type tag for fields.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ScalarType {
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
}

impl ScalarType {
    /// Returns a stable string label for the scalar type.
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::U32 => "u32",
            ScalarType::U64 => "u64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }

    /// Parse a scalar type from a string label.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "i32" => Some(ScalarType::I32),
            "i64" => Some(ScalarType::I64),
            "u32" => Some(ScalarType::U32),
            "u64" => Some(ScalarType::U64),
            "f32" => Some(ScalarType::F32),
            "f64" => Some(ScalarType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shareable storage cell holding one scalar.
pub trait AtomicCell: Send + Sync + fmt::Debug + 'static {
    type Value: Copy;
    fn new(v: Self::Value) -> Self;
    fn load(&self) -> Self::Value;
    fn store(&self, v: Self::Value);
    /// Atomically add `v`, returning the previous value. Integers wrap.
    fn fetch_add(&self, v: Self::Value) -> Self::Value;
}

macro_rules! int_cell {
    ($atomic:ty, $value:ty) => {
        impl AtomicCell for $atomic {
            type Value = $value;
            #[inline]
            fn new(v: $value) -> Self {
                <$atomic>::new(v)
            }
            #[inline]
            fn load(&self) -> $value {
                <$atomic>::load(self, Ordering::Relaxed)
            }
            #[inline]
            fn store(&self, v: $value) {
                <$atomic>::store(self, v, Ordering::Relaxed)
            }
            #[inline]
            fn fetch_add(&self, v: $value) -> $value {
                <$atomic>::fetch_add(self, v, Ordering::Relaxed)
            }
        }
    };
}

int_cell!(AtomicI32, i32);
int_cell!(AtomicI64, i64);
int_cell!(AtomicU32, u32);
int_cell!(AtomicU64, u64);

macro_rules! float_cell {
    ($name:ident, $bits:ty, $value:ty) => {
        /// Float cell stored as its bit pattern.
        #[derive(Debug, Default)]
        #[repr(transparent)]
        pub struct $name($bits);

        impl AtomicCell for $name {
            type Value = $value;
            #[inline]
            fn new(v: $value) -> Self {
                $name(<$bits>::new(v.to_bits()))
            }
            #[inline]
            fn load(&self) -> $value {
                <$value>::from_bits(self.0.load(Ordering::Relaxed))
            }
            #[inline]
            fn store(&self, v: $value) {
                self.0.store(v.to_bits(), Ordering::Relaxed)
            }
            fn fetch_add(&self, v: $value) -> $value {
                let mut cur = self.0.load(Ordering::Relaxed);
                loop {
                    let next = (<$value>::from_bits(cur) + v).to_bits();
                    match self
                        .0
                        .compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed)
                    {
                        Ok(prev) => return <$value>::from_bits(prev),
                        Err(actual) => cur = actual,
                    }
                }
            }
        }
    };
}

float_cell!(AtomicF32, AtomicU32, f32);
float_cell!(AtomicF64, AtomicU64, f64);

/// Value types a field can hold.
pub trait Scalar:
    Copy + Send + Sync + PartialEq + fmt::Debug + Default + Zero + 'static
{
    const TYPE: ScalarType;
    type Cell: AtomicCell<Value = Self>;

    /// Typed view of a column, `None` if it holds another scalar type.
    fn column(data: &ColumnData) -> Option<&VecStorage<Self::Cell>>;
    /// Mutable typed view of a column.
    fn column_mut(data: &mut ColumnData) -> Option<&mut VecStorage<Self::Cell>>;
    /// Wrap typed storage into a column.
    fn into_column(storage: VecStorage<Self::Cell>) -> ColumnData;
    /// Typed view of a per-patch delta map.
    fn deltas(map: &mut DeltaMap) -> Option<&mut HashMap<usize, Self>>;
    /// Commutative, associative accumulation; wrapping for integers so it
    /// agrees with the atomic `fetch_add`.
    fn accumulate(self, rhs: Self) -> Self;
}

macro_rules! scalar_impl {
    ($ty:ty, $cell:ty, $tag:ident, $add:expr) => {
        impl Scalar for $ty {
            const TYPE: ScalarType = ScalarType::$tag;
            type Cell = $cell;

            #[inline]
            fn column(data: &ColumnData) -> Option<&VecStorage<$cell>> {
                match data {
                    ColumnData::$tag(s) => Some(s),
                    _ => None,
                }
            }

            #[inline]
            fn column_mut(data: &mut ColumnData) -> Option<&mut VecStorage<$cell>> {
                match data {
                    ColumnData::$tag(s) => Some(s),
                    _ => None,
                }
            }

            fn into_column(storage: VecStorage<$cell>) -> ColumnData {
                ColumnData::$tag(storage)
            }

            #[inline]
            fn deltas(map: &mut DeltaMap) -> Option<&mut HashMap<usize, $ty>> {
                match map {
                    DeltaMap::$tag(m) => Some(m),
                    _ => None,
                }
            }

            #[inline]
            fn accumulate(self, rhs: $ty) -> $ty {
                let add: fn($ty, $ty) -> $ty = $add;
                add(self, rhs)
            }
        }
    };
}

scalar_impl!(i32, AtomicI32, I32, |a, b| a.wrapping_add(b));
scalar_impl!(i64, AtomicI64, I64, |a, b| a.wrapping_add(b));
scalar_impl!(u32, AtomicU32, U32, |a, b| a.wrapping_add(b));
scalar_impl!(u64, AtomicU64, U64, |a, b| a.wrapping_add(b));
scalar_impl!(f32, AtomicF32, F32, |a, b| a + b);
scalar_impl!(f64, AtomicF64, F64, |a, b| a + b);
