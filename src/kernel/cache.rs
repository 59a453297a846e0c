//! Local cache planning and scratch storage for parallel regions.
//!
//! A cached binding is staged through scratch storage for the duration of one
//! region and reconciled afterwards:
//!
//! - [`CacheMode::Whole`]: one scratch column the size of the whole field,
//!   initialised from the field, accumulated into atomically, stored back
//!   when the region ends.
//! - [`CacheMode::PerPatch`]: every patch of the iterated kind runs as one
//!   unit of work with an exclusive sparse delta map; reads see the
//!   region-start values plus the patch's own deltas, and each patch merges
//!   its deltas with atomic adds when it finishes.
//!
//! Only accumulation (commutative, associative) and plain reads are eligible.
//! A cached binding with write access is rejected when the kernel is
//! compiled.

use hashbrown::HashMap;

use crate::data::field::Field;
use crate::data::scalar::{AtomicCell, Scalar, ScalarType};
use crate::data::storage::{ColumnData, Storage};
use crate::mesh_error::MeshError;

/// How a kernel uses a bound field.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    /// Plain overwrite; only for fields of the element bound to an iteration.
    Write,
    /// Read-modify-write by addition; safe from any element.
    Accumulate,
}

impl Access {
    pub fn writes(self) -> bool {
        !matches!(self, Access::Read)
    }
}

/// Scratch layout chosen for a region.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CacheMode {
    Whole,
    PerPatch,
}

/// Sparse per-patch accumulation buffer, keyed by storage index.
#[derive(Clone, Debug)]
pub enum DeltaMap {
    I32(HashMap<usize, i32>),
    I64(HashMap<usize, i64>),
    U32(HashMap<usize, u32>),
    U64(HashMap<usize, u64>),
    F32(HashMap<usize, f32>),
    F64(HashMap<usize, f64>),
}

impl DeltaMap {
    pub fn empty(scalar: ScalarType) -> Self {
        match scalar {
            ScalarType::I32 => DeltaMap::I32(HashMap::new()),
            ScalarType::I64 => DeltaMap::I64(HashMap::new()),
            ScalarType::U32 => DeltaMap::U32(HashMap::new()),
            ScalarType::U64 => DeltaMap::U64(HashMap::new()),
            ScalarType::F32 => DeltaMap::F32(HashMap::new()),
            ScalarType::F64 => DeltaMap::F64(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DeltaMap::I32(m) => m.len(),
            DeltaMap::I64(m) => m.len(),
            DeltaMap::U32(m) => m.len(),
            DeltaMap::U64(m) => m.len(),
            DeltaMap::F32(m) => m.len(),
            DeltaMap::F64(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add `v` to the delta at `index`.
    pub(crate) fn add<T: Scalar>(&mut self, index: usize, v: T) {
        if let Some(map) = T::deltas(self) {
            let d = map.entry(index).or_insert_with(T::zero);
            *d = d.accumulate(v);
        }
    }

    /// Delta recorded at `index`, zero if untouched.
    pub(crate) fn get<T: Scalar>(&mut self, index: usize) -> T {
        T::deltas(self)
            .and_then(|m| m.get(&index).copied())
            .unwrap_or_else(T::zero)
    }

    /// Atomically add every delta into `target`.
    pub(crate) fn merge_into(&self, target: &ColumnData) -> Result<(), MeshError> {
        macro_rules! merge {
            ($map:expr, $cells:expr) => {{
                let cells = $cells.cells();
                for (&i, &d) in $map {
                    AtomicCell::fetch_add(&cells[i], d);
                }
                Ok(())
            }};
        }
        match (self, target) {
            (DeltaMap::I32(m), ColumnData::I32(c)) => merge!(m, c),
            (DeltaMap::I64(m), ColumnData::I64(c)) => merge!(m, c),
            (DeltaMap::U32(m), ColumnData::U32(c)) => merge!(m, c),
            (DeltaMap::U64(m), ColumnData::U64(c)) => merge!(m, c),
            (DeltaMap::F32(m), ColumnData::F32(c)) => merge!(m, c),
            (DeltaMap::F64(m), ColumnData::F64(c)) => merge!(m, c),
            (_, c) => Err(MeshError::FieldTypeMismatch {
                field: "local cache delta".into(),
                expected: c.scalar_type(),
                found: self.scalar_type(),
            }),
        }
    }

    fn scalar_type(&self) -> ScalarType {
        match self {
            DeltaMap::I32(_) => ScalarType::I32,
            DeltaMap::I64(_) => ScalarType::I64,
            DeltaMap::U32(_) => ScalarType::U32,
            DeltaMap::U64(_) => ScalarType::U64,
            DeltaMap::F32(_) => ScalarType::F32,
            DeltaMap::F64(_) => ScalarType::F64,
        }
    }
}

/// What the optimizer needs to know about one field binding.
#[derive(Copy, Clone, Debug)]
pub struct BindingSummary<'m> {
    pub field: &'m Field,
    pub access: Access,
}

/// One staged binding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub binding: usize,
    pub access: Access,
}

/// Result of planning: which bindings are staged and how.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachePlan {
    pub mode: CacheMode,
    pub entries: Vec<CacheEntry>,
}

impl CachePlan {
    pub fn direct() -> Self {
        Self {
            mode: CacheMode::Whole,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_for(&self, binding: usize) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| e.binding == binding)
    }
}

/// Rewrites cached bindings of a region into scratch-staged accesses.
#[derive(Copy, Clone, Debug)]
pub struct LocalCacheOptimizer {
    /// Honour cache declarations at all.
    pub enabled: bool,
    /// The iterated kind is patch-contiguous, so patches can run as units.
    pub per_patch: bool,
}

impl LocalCacheOptimizer {
    pub fn new(enabled: bool, per_patch: bool) -> Self {
        Self { enabled, per_patch }
    }

    /// Check every requested binding and choose the scratch layout.
    pub fn plan(
        &self,
        region: &str,
        bindings: &[BindingSummary<'_>],
        requested: &[usize],
    ) -> Result<CachePlan, MeshError> {
        let mut entries: Vec<CacheEntry> = Vec::with_capacity(requested.len());
        for &b in requested {
            let Some(binding) = bindings.get(b) else {
                return Err(MeshError::Config(format!(
                    "{region}: local cache names unknown binding {b}"
                )));
            };
            let name = binding.field.name();
            if binding.access == Access::Write {
                return Err(MeshError::UnsupportedCache {
                    field: name.to_string(),
                    reason: "overwrites are not accumulations",
                });
            }
            // a staged copy diverges from any other binding of the same field
            // as soon as either side modifies it
            let aliased = bindings.iter().enumerate().any(|(i, other)| {
                i != b
                    && std::ptr::eq(other.field, binding.field)
                    && (other.access.writes() || binding.access.writes())
            });
            if aliased {
                return Err(MeshError::UnsupportedCache {
                    field: name.to_string(),
                    reason: "field is also bound through another access",
                });
            }
            if entries.iter().any(|e| e.binding == b) {
                continue;
            }
            entries.push(CacheEntry {
                binding: b,
                access: binding.access,
            });
        }

        if entries.is_empty() {
            return Ok(CachePlan::direct());
        }
        if !self.enabled {
            log::warn!(
                "{region}: local cache disabled by configuration; {} binding(s) use direct access",
                entries.len()
            );
            return Ok(CachePlan::direct());
        }
        let mode = if self.per_patch {
            CacheMode::PerPatch
        } else {
            CacheMode::Whole
        };
        log::debug!(
            "{region}: caching {} binding(s) in {mode:?} mode",
            entries.len()
        );
        Ok(CachePlan { mode, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::field::{FieldDecl, FieldType};

    fn field(name: &str) -> Field {
        Field::zeroed(&FieldDecl::new(name, FieldType::of::<i32>()), 4)
    }

    #[test]
    fn write_access_is_rejected() {
        let f = field("a");
        let opt = LocalCacheOptimizer::new(true, false);
        let err = opt
            .plan(
                "k",
                &[BindingSummary {
                    field: &f,
                    access: Access::Write,
                }],
                &[0],
            )
            .unwrap_err();
        assert!(matches!(err, MeshError::UnsupportedCache { .. }));
    }

    #[test]
    fn rejected_even_when_disabled() {
        let f = field("a");
        let opt = LocalCacheOptimizer::new(false, false);
        assert!(opt
            .plan(
                "k",
                &[BindingSummary {
                    field: &f,
                    access: Access::Write,
                }],
                &[0],
            )
            .is_err());
    }

    #[test]
    fn aliased_accumulation_is_rejected() {
        let f = field("a");
        let b = [
            BindingSummary {
                field: &f,
                access: Access::Accumulate,
            },
            BindingSummary {
                field: &f,
                access: Access::Write,
            },
        ];
        let opt = LocalCacheOptimizer::new(true, false);
        assert!(matches!(
            opt.plan("k", &b, &[0]),
            Err(MeshError::UnsupportedCache { .. })
        ));
    }

    #[test]
    fn staged_copies_must_not_alias_modifications() {
        let f = field("a");
        let opt = LocalCacheOptimizer::new(true, false);
        let pair = |cached: Access, other: Access| {
            [
                BindingSummary {
                    field: &f,
                    access: cached,
                },
                BindingSummary {
                    field: &f,
                    access: other,
                },
            ]
        };
        // cached read, overwritten elsewhere
        assert!(opt.plan("k", &pair(Access::Read, Access::Write), &[0]).is_err());
        // cached accumulation, read elsewhere
        assert!(opt.plan("k", &pair(Access::Accumulate, Access::Read), &[0]).is_err());
        // two reads may share a field
        assert!(opt.plan("k", &pair(Access::Read, Access::Read), &[0]).is_ok());
        assert!(opt.plan("k", &pair(Access::Read, Access::Read), &[0, 1]).is_ok());
    }

    #[test]
    fn modes() {
        let f = field("a");
        let g = field("b");
        let b = [
            BindingSummary {
                field: &f,
                access: Access::Accumulate,
            },
            BindingSummary {
                field: &g,
                access: Access::Read,
            },
        ];
        let whole = LocalCacheOptimizer::new(true, false).plan("k", &b, &[0, 1, 0]).unwrap();
        assert_eq!(whole.mode, CacheMode::Whole);
        assert_eq!(whole.entries.len(), 2);
        let patch = LocalCacheOptimizer::new(true, true).plan("k", &b, &[0]).unwrap();
        assert_eq!(patch.mode, CacheMode::PerPatch);
        assert!(patch.entry_for(0).is_some() && patch.entry_for(1).is_none());
        let off = LocalCacheOptimizer::new(false, true).plan("k", &b, &[0]).unwrap();
        assert!(off.is_empty());
    }

    #[test]
    fn deltas_merge_atomically() {
        let f = field("a");
        f.load(&[1, 1, 1, 1]).unwrap();
        let mut d = DeltaMap::empty(ScalarType::I32);
        d.add(2, 5i32);
        d.add(2, 1i32);
        d.add(0, -1i32);
        assert_eq!(d.get::<i32>(2), 6);
        assert_eq!(d.get::<i32>(3), 0);
        assert_eq!(d.len(), 2);
        d.merge_into(f.data()).unwrap();
        assert_eq!(f.snapshot::<i32>().unwrap(), vec![0, 1, 7, 1]);
        let wrong = DeltaMap::empty(ScalarType::F32);
        assert!(wrong.merge_into(f.data()).is_err());
    }
}
