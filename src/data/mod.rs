//! Data module: scalar cells, column storage, fields and element sets.

pub mod element_set;
pub mod external;
pub mod field;
pub mod scalar;
pub mod storage;

pub use element_set::ElementSet;
pub use external::ExternalField;
pub use field::{Field, FieldDecl, FieldType};
pub use scalar::{AtomicCell, AtomicF32, AtomicF64, Scalar, ScalarType};
pub use storage::{ColumnData, Storage, VecStorage};
