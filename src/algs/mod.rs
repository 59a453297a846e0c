//! Re-export public algorithms.

pub mod patch;
pub mod renumber;

pub use patch::{PatchIndexer, PatchInfo};
pub use renumber::{OrderingAssigner, Permutation, StorageOrdering};
